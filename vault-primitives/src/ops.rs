#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]

//! Scalar and point operations behind the signing-device contract.
//!
//! This module is the adapter to the curve backend; all
//! `curve25519-dalek` arithmetic for key derivation, key images and the
//! proof systems lives here. Every operation is deterministic for
//! identical inputs (randomness is always an explicit fresh scalar), and
//! malformed inputs fail instead of producing a silently wrong result.

use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use rand::rngs::OsRng;

use crate::error::{Error, Result};
use crate::hash::{hash_to_point, hash_to_scalar, write_varint};
use crate::keys::{
    EcPoint, EcScalar, Hash, KeyDerivation, KeyImage, KeyPair, PublicKey, SecretKey, Signature,
};

/// Domain tag for key-image ownership proofs.
const KEY_IMAGE_PROOF_TAG: &[u8] = b"RingVault.KeyImageProof";
/// Domain tag for key-possession (unlock) proofs.
const UNLOCK_PROOF_TAG: &[u8] = b"RingVault.UnlockProof";
/// Domain tag for transaction payment proofs.
const TX_PROOF_TAG: &[u8] = b"RingVault.TxProof.v2";
/// Prefix mixed into subaddress secret derivation.
const SUBADDRESS_TAG: &[u8] = b"SubAddr\0";

/// Generates a fresh uniformly random scalar.
#[must_use]
pub fn random_scalar() -> SecretKey {
    SecretKey::from_scalar(&Scalar::random(&mut OsRng))
}

/// Generates a keypair.
///
/// With a recovery seed the result is fully deterministic (the seed is
/// reduced into the group order); without one a fresh random secret is
/// drawn.
///
/// # Errors
/// Infallible today; returns `Result` so backends can surface transport
/// failures through the same signature.
pub fn generate_keys(recovery: Option<&SecretKey>) -> Result<KeyPair> {
    let secret_scalar = match recovery {
        Some(seed) => Scalar::from_bytes_mod_order(*seed.as_bytes()),
        None => Scalar::random(&mut OsRng),
    };
    let public = PublicKey::from_point(&EdwardsPoint::mul_base(&secret_scalar));
    Ok(KeyPair { public, secret: SecretKey::from_scalar(&secret_scalar) })
}

/// Computes the public key for a secret key.
///
/// # Errors
/// Fails if the secret key is not a canonical scalar.
pub fn secret_key_to_public_key(sec: &SecretKey) -> Result<PublicKey> {
    let scalar = sec.to_scalar()?;
    Ok(PublicKey::from_point(&EdwardsPoint::mul_base(&scalar)))
}

/// Checks that `sec` is the secret key for `public`.
///
/// # Errors
/// Fails if either key is malformed.
pub fn verify_keys(sec: &SecretKey, public: &PublicKey) -> Result<bool> {
    let computed = secret_key_to_public_key(sec)?;
    public.decompress()?;
    Ok(computed == *public)
}

/// Computes `a * P`.
///
/// # Errors
/// Fails if `p` is not a curve point or `a` is not canonical.
pub fn scalarmult_key(p: &EcPoint, a: &EcScalar) -> Result<EcPoint> {
    let point = p.decompress()?;
    let scalar = a.to_scalar()?;
    Ok(EcPoint::from_point(&(point * scalar)))
}

/// Computes `a * G`.
///
/// # Errors
/// Fails if `a` is not a canonical scalar.
pub fn scalarmult_base(a: &EcScalar) -> Result<EcPoint> {
    let scalar = a.to_scalar()?;
    Ok(EcPoint::from_point(&EdwardsPoint::mul_base(&scalar)))
}

/// Adds two scalars.
///
/// # Errors
/// Fails if either operand is not canonical.
pub fn sc_add(a: &EcScalar, b: &EcScalar) -> Result<EcScalar> {
    Ok(EcScalar::from_scalar(&(a.to_scalar()? + b.to_scalar()?)))
}

/// Subtracts `b` from `a`.
///
/// # Errors
/// Fails if either operand is not canonical.
pub fn sc_sub(a: &EcScalar, b: &EcScalar) -> Result<EcScalar> {
    Ok(EcScalar::from_scalar(&(a.to_scalar()? - b.to_scalar()?)))
}

/// Multiplies two scalars.
///
/// # Errors
/// Fails if either operand is not canonical.
pub fn sc_mul(a: &EcScalar, b: &EcScalar) -> Result<EcScalar> {
    Ok(EcScalar::from_scalar(&(a.to_scalar()? * b.to_scalar()?)))
}

/// Adds two secret scalars.
///
/// # Errors
/// Fails if either operand is not canonical.
pub fn sc_secret_add(a: &SecretKey, b: &SecretKey) -> Result<SecretKey> {
    Ok(SecretKey::from_scalar(&(a.to_scalar()? + b.to_scalar()?)))
}

/// Adds two curve points.
///
/// # Errors
/// Fails if either operand is not a curve point.
pub fn add_keys(a: &EcPoint, b: &EcPoint) -> Result<EcPoint> {
    Ok(EcPoint::from_point(&(a.decompress()? + b.decompress()?)))
}

/// Computes the shared-secret derivation `8 * (sec * pub)`.
///
/// # Errors
/// Fails if `public` is not a curve point or `sec` is not canonical.
pub fn generate_key_derivation(public: &PublicKey, sec: &SecretKey) -> Result<KeyDerivation> {
    let point = public.decompress()?;
    let scalar = sec.to_scalar()?;
    Ok(KeyDerivation::from_point(&(point * scalar).mul_by_cofactor()))
}

/// Hashes a derivation and output index into a scalar.
#[must_use]
pub fn derivation_to_scalar(derivation: &KeyDerivation, output_index: u64) -> EcScalar {
    let mut buf = Vec::with_capacity(32 + 10);
    buf.extend_from_slice(derivation.as_bytes());
    write_varint(&mut buf, output_index);
    hash_to_scalar(&buf)
}

/// Derives the per-output secret key `Hs(derivation, i) + sec`.
///
/// # Errors
/// Fails if `sec` is not a canonical scalar.
pub fn derive_secret_key(
    derivation: &KeyDerivation,
    output_index: u64,
    sec: &SecretKey,
) -> Result<SecretKey> {
    let hs = derivation_to_scalar(derivation, output_index).to_scalar()?;
    Ok(SecretKey::from_scalar(&(hs + sec.to_scalar()?)))
}

/// Derives the per-output public key `Hs(derivation, i) * G + pub`.
///
/// # Errors
/// Fails if `public` is not a curve point.
pub fn derive_public_key(
    derivation: &KeyDerivation,
    output_index: u64,
    public: &PublicKey,
) -> Result<PublicKey> {
    let hs = derivation_to_scalar(derivation, output_index).to_scalar()?;
    let base = public.decompress()?;
    Ok(PublicKey::from_point(&(EdwardsPoint::mul_base(&hs) + base)))
}

/// Recovers the subaddress spend key an output was sent to:
/// `pub - Hs(derivation, i) * G`.
///
/// # Errors
/// Fails if `output_key` is not a curve point.
pub fn derive_subaddress_public_key(
    output_key: &PublicKey,
    derivation: &KeyDerivation,
    output_index: u64,
) -> Result<PublicKey> {
    let hs = derivation_to_scalar(derivation, output_index).to_scalar()?;
    let out = output_key.decompress()?;
    Ok(PublicKey::from_point(&(out - EdwardsPoint::mul_base(&hs))))
}

/// Derives the additive secret for subaddress `(major, minor)` from the
/// view secret key.
#[must_use]
pub fn subaddress_secret_key(view_sec: &SecretKey, major: u32, minor: u32) -> SecretKey {
    let mut buf = Vec::with_capacity(SUBADDRESS_TAG.len() + 32 + 8);
    buf.extend_from_slice(SUBADDRESS_TAG);
    buf.extend_from_slice(view_sec.as_bytes());
    buf.extend_from_slice(&major.to_le_bytes());
    buf.extend_from_slice(&minor.to_le_bytes());
    SecretKey::from_bytes(hash_to_scalar(&buf).to_bytes())
}

/// Computes the key image `sec * Hp(pub)`.
///
/// # Errors
/// Fails if `sec` is not a canonical scalar or `public` is off curve.
pub fn generate_key_image(public: &PublicKey, sec: &SecretKey) -> Result<KeyImage> {
    public.decompress()?;
    let scalar = sec.to_scalar()?;
    let hp = hash_to_point(public.as_bytes());
    Ok(KeyImage::from_point(&(hp * scalar)))
}

fn key_image_challenge(
    image: &KeyImage,
    public: &PublicKey,
    a1: &EdwardsPoint,
    a2: &EdwardsPoint,
) -> Result<Scalar> {
    let mut buf = Vec::with_capacity(KEY_IMAGE_PROOF_TAG.len() + 4 * 32);
    buf.extend_from_slice(KEY_IMAGE_PROOF_TAG);
    buf.extend_from_slice(public.as_bytes());
    buf.extend_from_slice(image.as_bytes());
    buf.extend_from_slice(EcPoint::from_point(a1).as_bytes());
    buf.extend_from_slice(EcPoint::from_point(a2).as_bytes());
    hash_to_scalar(&buf).to_scalar()
}

/// Proves that `image` was derived from `public` with the secret `sec`
/// (equal discrete logs over `G` and `Hp(pub)`).
///
/// # Errors
/// Fails on malformed keys.
pub fn generate_key_image_signature(
    image: &KeyImage,
    public: &PublicKey,
    sec: &SecretKey,
) -> Result<Signature> {
    let x = sec.to_scalar()?;
    let hp = hash_to_point(public.as_bytes());
    let k = Scalar::random(&mut OsRng);
    let a1 = EdwardsPoint::mul_base(&k);
    let a2 = hp * k;
    let c = key_image_challenge(image, public, &a1, &a2)?;
    Ok(Signature { c: EcScalar::from_scalar(&c), r: EcScalar::from_scalar(&(k - c * x)) })
}

/// Verifies a key-image ownership proof.
///
/// # Errors
/// Returns [`Error::InvalidSignature`] when the proof does not verify,
/// or a decoding error for malformed inputs.
pub fn check_key_image_signature(
    image: &KeyImage,
    public: &PublicKey,
    sig: &Signature,
) -> Result<()> {
    let p = public.decompress()?;
    let i = image.decompress()?;
    let c = sig.c.to_scalar()?;
    let r = sig.r.to_scalar()?;
    let hp = hash_to_point(public.as_bytes());
    let a1 = EdwardsPoint::mul_base(&r) + p * c;
    let a2 = hp * r + i * c;
    if key_image_challenge(image, public, &a1, &a2)? == c {
        Ok(())
    } else {
        Err(Error::InvalidSignature)
    }
}

fn unlock_challenge(public: &PublicKey, a: &EdwardsPoint) -> Result<Scalar> {
    let mut buf = Vec::with_capacity(UNLOCK_PROOF_TAG.len() + 2 * 32);
    buf.extend_from_slice(UNLOCK_PROOF_TAG);
    buf.extend_from_slice(public.as_bytes());
    buf.extend_from_slice(EcPoint::from_point(a).as_bytes());
    hash_to_scalar(&buf).to_scalar()
}

/// Produces a Schnorr proof of possession for `public`.
///
/// # Errors
/// Fails on malformed keys.
pub fn generate_unlock_signature(public: &PublicKey, sec: &SecretKey) -> Result<Signature> {
    let x = sec.to_scalar()?;
    let k = Scalar::random(&mut OsRng);
    let a = EdwardsPoint::mul_base(&k);
    let c = unlock_challenge(public, &a)?;
    Ok(Signature { c: EcScalar::from_scalar(&c), r: EcScalar::from_scalar(&(k - c * x)) })
}

/// Verifies a proof of possession.
///
/// # Errors
/// Returns [`Error::InvalidSignature`] when the proof does not verify.
pub fn check_unlock_signature(public: &PublicKey, sig: &Signature) -> Result<()> {
    let p = public.decompress()?;
    let c = sig.c.to_scalar()?;
    let r = sig.r.to_scalar()?;
    let a = EdwardsPoint::mul_base(&r) + p * c;
    if unlock_challenge(public, &a)? == c {
        Ok(())
    } else {
        Err(Error::InvalidSignature)
    }
}

#[allow(clippy::too_many_arguments)]
fn tx_proof_challenge(
    prefix_hash: &Hash,
    r_pub: &PublicKey,
    a_pub: &PublicKey,
    b_pub: Option<&PublicKey>,
    d_pub: &PublicKey,
    x: &EdwardsPoint,
    y: &EdwardsPoint,
) -> Result<Scalar> {
    let mut buf = Vec::with_capacity(TX_PROOF_TAG.len() + 7 * 32);
    buf.extend_from_slice(TX_PROOF_TAG);
    buf.extend_from_slice(prefix_hash.as_bytes());
    buf.extend_from_slice(r_pub.as_bytes());
    buf.extend_from_slice(a_pub.as_bytes());
    buf.extend_from_slice(b_pub.map_or(&[0u8; 32][..], |b| b.as_bytes()));
    buf.extend_from_slice(d_pub.as_bytes());
    buf.extend_from_slice(EcPoint::from_point(x).as_bytes());
    buf.extend_from_slice(EcPoint::from_point(y).as_bytes());
    hash_to_scalar(&buf).to_scalar()
}

/// Proves that `d_pub = r * a_pub` for the transaction key `r_pub`
/// (`r * G`, or `r * b_pub` for a subaddress destination), binding the
/// proof to `prefix_hash`.
///
/// # Errors
/// Fails on malformed keys.
pub fn generate_tx_proof(
    prefix_hash: &Hash,
    r_pub: &PublicKey,
    a_pub: &PublicKey,
    b_pub: Option<&PublicKey>,
    d_pub: &PublicKey,
    r_sec: &SecretKey,
) -> Result<Signature> {
    let r = r_sec.to_scalar()?;
    let a_point = a_pub.decompress()?;
    let k = Scalar::random(&mut OsRng);
    let x = match b_pub {
        Some(b) => b.decompress()? * k,
        None => EdwardsPoint::mul_base(&k),
    };
    let y = a_point * k;
    let c = tx_proof_challenge(prefix_hash, r_pub, a_pub, b_pub, d_pub, &x, &y)?;
    Ok(Signature { c: EcScalar::from_scalar(&c), r: EcScalar::from_scalar(&(k - c * r)) })
}

/// Verifies a transaction payment proof.
///
/// # Errors
/// Returns [`Error::InvalidSignature`] when the proof does not verify.
pub fn check_tx_proof(
    prefix_hash: &Hash,
    r_pub: &PublicKey,
    a_pub: &PublicKey,
    b_pub: Option<&PublicKey>,
    d_pub: &PublicKey,
    sig: &Signature,
) -> Result<()> {
    let c = sig.c.to_scalar()?;
    let r = sig.r.to_scalar()?;
    let r_point = r_pub.decompress()?;
    let a_point = a_pub.decompress()?;
    let d_point = d_pub.decompress()?;
    let x = match b_pub {
        Some(b) => b.decompress()? * r + r_point * c,
        None => EdwardsPoint::mul_base(&r) + r_point * c,
    };
    let y = a_point * r + d_point * c;
    if tx_proof_challenge(prefix_hash, r_pub, a_pub, b_pub, d_pub, &x, &y)? == c {
        Ok(())
    } else {
        Err(Error::InvalidSignature)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::hash::keccak256;

    fn keypair() -> KeyPair {
        generate_keys(None).unwrap()
    }

    #[test]
    fn recovery_seed_makes_keygen_deterministic() {
        let seed = SecretKey::from_bytes([42u8; 32]);
        let a = generate_keys(Some(&seed)).unwrap();
        let b = generate_keys(Some(&seed)).unwrap();
        assert_eq!(a.public, b.public);
        assert_eq!(a.secret, b.secret);

        let fresh = keypair();
        assert_ne!(a.public, fresh.public);
    }

    #[test]
    fn verify_keys_accepts_own_pair_and_rejects_foreign() {
        let pair = keypair();
        assert!(verify_keys(&pair.secret, &pair.public).unwrap());
        let other = keypair();
        assert!(!verify_keys(&pair.secret, &other.public).unwrap());
    }

    #[test]
    fn derivation_is_deterministic_and_symmetric() {
        let alice = keypair();
        let bob = keypair();

        let d1 = generate_key_derivation(&bob.public, &alice.secret).unwrap();
        let d2 = generate_key_derivation(&bob.public, &alice.secret).unwrap();
        assert_eq!(d1, d2);

        // Diffie-Hellman symmetry: 8·(a·B) == 8·(b·A).
        let d3 = generate_key_derivation(&alice.public, &bob.secret).unwrap();
        assert_eq!(d1, d3);
    }

    #[test]
    fn derived_secret_matches_derived_public() {
        let sender_eph = keypair();
        let recipient = keypair();
        let derivation = generate_key_derivation(&recipient.public, &sender_eph.secret).unwrap();

        for index in [0u64, 1, 7, 500] {
            let derived_pub = derive_public_key(&derivation, index, &recipient.public).unwrap();
            let derived_sec = derive_secret_key(&derivation, index, &recipient.secret).unwrap();
            assert_eq!(secret_key_to_public_key(&derived_sec).unwrap(), derived_pub);
        }
    }

    #[test]
    fn subaddress_public_key_recovers_spend_key() {
        let sender_eph = keypair();
        let recipient = keypair();
        let derivation = generate_key_derivation(&recipient.public, &sender_eph.secret).unwrap();
        let one_time = derive_public_key(&derivation, 3, &recipient.public).unwrap();

        let recovered = derive_subaddress_public_key(&one_time, &derivation, 3).unwrap();
        assert_eq!(recovered, recipient.public);
    }

    #[test]
    fn key_image_is_stable_and_proof_verifies() {
        let pair = keypair();
        let ki1 = generate_key_image(&pair.public, &pair.secret).unwrap();
        let ki2 = generate_key_image(&pair.public, &pair.secret).unwrap();
        assert_eq!(ki1, ki2);

        let sig = generate_key_image_signature(&ki1, &pair.public, &pair.secret).unwrap();
        check_key_image_signature(&ki1, &pair.public, &sig).unwrap();

        // A proof over a foreign image must be rejected.
        let other = keypair();
        let foreign = generate_key_image(&other.public, &other.secret).unwrap();
        assert!(check_key_image_signature(&foreign, &pair.public, &sig).is_err());
    }

    #[test]
    fn unlock_signature_round_trip() {
        let pair = keypair();
        let sig = generate_unlock_signature(&pair.public, &pair.secret).unwrap();
        check_unlock_signature(&pair.public, &sig).unwrap();

        let other = keypair();
        assert!(check_unlock_signature(&other.public, &sig).is_err());
    }

    #[test]
    fn tx_proof_round_trip() {
        // r_pub = r·G, d_pub = r·a_pub: the relation a payment proof attests.
        let tx = keypair();
        let recipient_view = keypair();
        let prefix = keccak256(b"tx prefix");
        let d_point =
            recipient_view.public.decompress().unwrap() * tx.secret.to_scalar().unwrap();
        let d_pub = PublicKey::from_point(&d_point);

        let sig =
            generate_tx_proof(&prefix, &tx.public, &recipient_view.public, None, &d_pub, &tx.secret)
                .unwrap();
        check_tx_proof(&prefix, &tx.public, &recipient_view.public, None, &d_pub, &sig).unwrap();

        // Tampered context fails.
        let wrong_prefix = keccak256(b"different prefix");
        assert!(check_tx_proof(&wrong_prefix, &tx.public, &recipient_view.public, None, &d_pub, &sig)
            .is_err());
    }

    #[test]
    fn tx_proof_binds_subaddress_spend_key() {
        // Subaddress destination: r_pub = r·B and the spend key B enters
        // the challenge transcript.
        let tx = keypair();
        let spend = keypair();
        let view = keypair();
        let prefix = keccak256(b"subaddress tx prefix");

        let r_scalar = tx.secret.to_scalar().unwrap();
        let r_pub = PublicKey::from_point(&(spend.public.decompress().unwrap() * r_scalar));
        let d_pub = PublicKey::from_point(&(view.public.decompress().unwrap() * r_scalar));

        let sig = generate_tx_proof(
            &prefix,
            &r_pub,
            &view.public,
            Some(&spend.public),
            &d_pub,
            &tx.secret,
        )
        .unwrap();
        check_tx_proof(&prefix, &r_pub, &view.public, Some(&spend.public), &d_pub, &sig).unwrap();

        // Dropping the spend key changes the transcript and the
        // commitment reconstruction, so verification must fail.
        assert!(check_tx_proof(&prefix, &r_pub, &view.public, None, &d_pub, &sig).is_err());
    }

    #[test]
    fn scalar_ops_agree_with_dalek() {
        let a = hash_to_scalar(b"a");
        let b = hash_to_scalar(b"b");
        let sum = sc_add(&a, &b).unwrap();
        let diff = sc_sub(&sum, &b).unwrap();
        assert_eq!(diff, a);

        let base_a = scalarmult_base(&a).unwrap();
        let ab = sc_mul(&a, &b).unwrap();
        // (a·b)·G == b·(a·G)
        assert_eq!(scalarmult_base(&ab).unwrap(), scalarmult_key(&base_a, &b).unwrap());
    }
}
