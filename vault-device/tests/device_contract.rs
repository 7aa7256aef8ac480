//! Integration tests for the `Device` contract, driven through
//! `dyn Device` the way wallet code uses it.
//!
//! # Test Coverage
//!
//! 1. **Derivation & keys**
//!    - Determinism across repeated calls and recovery seeds
//!    - Secret/public derivation agreement
//!    - Key image stability and ownership proofs
//!
//! 2. **Proofs**
//!    - Unlock signatures and transaction payment proofs
//!
//! 3. **Ring-signature phases**
//!    - Prehash input validation and determinism
//!    - MLSAG and CLSAG prepare/hash/sign algebra
//!
//! 4. **Session & callback**
//!    - Derivation concealment validation
//!    - Live-refresh key image computation for subaddresses
//!    - Callback registration with a dropped host callback

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::redundant_clone
)]

use std::sync::Arc;

use vault_device::{
    AccountKeys, AccountPublicAddress, CtKey, Device, DeviceCallback, SoftwareDevice,
    SubaddressIndex,
};
use vault_primitives::{ops, EcPoint, EcScalar, Hash, SecretKey};

fn device() -> Arc<dyn Device> {
    Arc::new(SoftwareDevice::new())
}

fn account() -> AccountKeys {
    let spend = ops::generate_keys(None).unwrap();
    let view = ops::generate_keys(None).unwrap();
    AccountKeys {
        address: AccountPublicAddress {
            spend_public_key: spend.public,
            view_public_key: view.public,
        },
        spend_secret_key: spend.secret,
        view_secret_key: view.secret,
    }
}

#[test]
fn key_generation_is_deterministic_under_recovery_seed() {
    let dev = device();
    let seed = SecretKey::from_bytes([11u8; 32]);
    let a = dev.generate_keys(Some(&seed)).unwrap();
    let b = dev.generate_keys(Some(&seed)).unwrap();
    assert_eq!(a.public, b.public);
    assert!(dev.verify_keys(&a.secret, &a.public).unwrap());

    let fresh = dev.generate_keys(None).unwrap();
    assert_ne!(fresh.public, a.public);
}

#[test]
fn derivation_is_deterministic_and_consistent() {
    let dev = device();
    let recipient = dev.generate_keys(None).unwrap();
    let tx = dev.generate_keys(None).unwrap();

    let d1 = dev.generate_key_derivation(&recipient.public, &tx.secret).unwrap();
    let d2 = dev.generate_key_derivation(&recipient.public, &tx.secret).unwrap();
    assert_eq!(d1, d2);

    for index in [0u64, 1, 42] {
        let derived_pub = dev.derive_public_key(&d1, index, &recipient.public).unwrap();
        let derived_sec = dev.derive_secret_key(&d1, index, &recipient.secret).unwrap();
        assert_eq!(dev.secret_key_to_public_key(&derived_sec).unwrap(), derived_pub);

        let scalar = dev.derivation_to_scalar(&d1, index).unwrap();
        assert_eq!(scalar, ops::derivation_to_scalar(&d1, index));
    }
}

#[test]
fn key_image_is_stable_and_provable() {
    let dev = device();
    let pair = dev.generate_keys(None).unwrap();

    let image = dev.generate_key_image(&pair.public, &pair.secret).unwrap();
    assert_eq!(image, dev.generate_key_image(&pair.public, &pair.secret).unwrap());

    let sig = dev.generate_key_image_signature(&image, &pair.public, &pair.secret).unwrap();
    ops::check_key_image_signature(&image, &pair.public, &sig).unwrap();
}

#[test]
fn unlock_signature_verifies() {
    let dev = device();
    let pair = dev.generate_keys(None).unwrap();
    let sig = dev.generate_unlock_signature(&pair.public, &pair.secret).unwrap();
    ops::check_unlock_signature(&pair.public, &sig).unwrap();
}

#[test]
fn tx_proof_verifies_against_primitives_checker() {
    let dev = device();
    let tx = dev.generate_keys(None).unwrap();
    let view = dev.generate_keys(None).unwrap();
    let prefix = vault_primitives::keccak256(b"proof prefix");

    let d_point = ops::scalarmult_key(
        &EcPoint::from_bytes(view.public.to_bytes()),
        &EcScalar::from_bytes(*tx.secret.as_bytes()),
    )
    .unwrap();
    let d_pub = vault_primitives::PublicKey::from_bytes(d_point.to_bytes());

    let sig = dev
        .generate_tx_proof(&prefix, &tx.public, &view.public, None, &d_pub, &tx.secret)
        .unwrap();
    ops::check_tx_proof(&prefix, &tx.public, &view.public, None, &d_pub, &sig).unwrap();
}

#[test]
fn prehash_validates_output_count_and_is_deterministic() {
    let dev = device();
    let hashes =
        vec![vault_primitives::keccak256(b"message"), vault_primitives::keccak256(b"range proofs")];
    let out_pk = vec![CtKey {
        dest: ops::scalarmult_base(&vault_primitives::hash_to_scalar(b"dest")).unwrap(),
        mask: ops::scalarmult_base(&vault_primitives::hash_to_scalar(b"mask")).unwrap(),
    }];

    let a = dev.clsag_prehash(b"blob", 1, 1, &hashes, &out_pk).unwrap();
    let b = dev.clsag_prehash(b"blob", 1, 1, &hashes, &out_pk).unwrap();
    assert_eq!(a, b);

    // MLSAG and CLSAG commit to the same element list the same way.
    assert_eq!(a, dev.mlsag_prehash(b"blob", 1, 1, &hashes, &out_pk).unwrap());

    assert!(dev.clsag_prehash(b"blob", 1, 2, &hashes, &out_pk).is_err());
    let empty: Vec<Hash> = Vec::new();
    assert!(dev.clsag_prehash(b"blob", 1, 1, &empty, &out_pk).is_err());
}

#[test]
fn mlsag_sign_response_satisfies_ring_equation() {
    let dev = device();
    let h = ops::scalarmult_base(&vault_primitives::hash_to_scalar(b"ring point")).unwrap();
    let xx = dev.generate_keys(None).unwrap().secret;

    let prepared = dev.mlsag_prepare_ring(&h, &xx).unwrap();
    let alpha_hp = prepared.alpha_hp.expect("full form carries alpha * Hp");
    let image = prepared.key_image.expect("full form carries the key image row");

    let transcript = vec![*prepared.alpha_g.as_bytes(), *alpha_hp.as_bytes()];
    let c = dev.mlsag_hash(&transcript).unwrap();

    let ss = dev
        .mlsag_sign(&c, std::slice::from_ref(&xx), std::slice::from_ref(&prepared.alpha), 1, 1)
        .unwrap();
    assert_eq!(ss.len(), 1);

    // ss·G + c·(x·G) == alpha·G
    let x_g = dev.secret_key_to_public_key(&xx).unwrap();
    let lhs = ops::add_keys(
        &ops::scalarmult_base(&ss[0]).unwrap(),
        &ops::scalarmult_key(&EcPoint::from_bytes(x_g.to_bytes()), &c).unwrap(),
    )
    .unwrap();
    assert_eq!(lhs, prepared.alpha_g);

    // ss·Hp + c·I == alpha·Hp
    let lhs_hp = ops::add_keys(
        &ops::scalarmult_key(&h, &ss[0]).unwrap(),
        &ops::scalarmult_key(&EcPoint::from_bytes(image.to_bytes()), &c).unwrap(),
    )
    .unwrap();
    assert_eq!(lhs_hp, alpha_hp);
}

#[test]
fn decoy_prepare_omits_secret_dependent_parts() {
    let dev = device();
    let prepared = dev.mlsag_prepare().unwrap();
    assert!(prepared.alpha_hp.is_none());
    assert!(prepared.key_image.is_none());
    assert_eq!(
        prepared.alpha_g,
        ops::scalarmult_base(&EcScalar::from_bytes(*prepared.alpha.as_bytes())).unwrap()
    );
}

#[test]
fn clsag_prepare_derives_both_images() {
    let dev = device();
    let h = ops::scalarmult_base(&vault_primitives::hash_to_scalar(b"output hash point")).unwrap();
    let p = dev.generate_keys(None).unwrap().secret;
    let z = dev.generate_keys(None).unwrap().secret;

    let prepared = dev.clsag_prepare(&p, &z, &h).unwrap();
    let expected_image =
        ops::scalarmult_key(&h, &EcScalar::from_bytes(*p.as_bytes())).unwrap();
    assert_eq!(prepared.key_image.to_bytes(), expected_image.to_bytes());
    let expected_commitment =
        ops::scalarmult_key(&h, &EcScalar::from_bytes(*z.as_bytes())).unwrap();
    assert_eq!(prepared.commitment_image, expected_commitment);
}

#[test]
fn conceal_derivation_accepts_additional_derivations() {
    let dev = device();
    let tx = dev.generate_keys(None).unwrap();
    let extra_tx = dev.generate_keys(None).unwrap();
    let view = dev.generate_keys(None).unwrap();

    let main = dev.generate_key_derivation(&view.public, &tx.secret).unwrap();
    let extra = dev.generate_key_derivation(&view.public, &extra_tx.secret).unwrap();

    let resolved = dev
        .conceal_derivation(&extra, &tx.public, &[extra_tx.public], &main, &[extra])
        .unwrap();
    assert_eq!(resolved, extra);

    // Mismatched list lengths are refused outright.
    assert!(dev.conceal_derivation(&extra, &tx.public, &[], &main, &[extra]).is_err());
}

#[test]
fn compute_key_image_handles_subaddress_outputs() {
    let dev = device();
    let keys = account();
    let index = SubaddressIndex { major: 1, minor: 4 };

    // Build the one-time key the way a sender paying this subaddress
    // would: derive against the subaddress spend key.
    let sub_spend = dev.get_subaddress_spend_public_key(&keys, &index).unwrap();
    let tx = dev.generate_keys(None).unwrap();
    let derivation =
        dev.generate_key_derivation(&keys.address.view_public_key, &tx.secret).unwrap();
    let out_key = dev.derive_public_key(&derivation, 2, &sub_spend).unwrap();

    let (ephemeral, image) = dev
        .compute_key_image(&keys, &out_key, &derivation, 2, &index)
        .unwrap()
        .expect("software backend computes key images");
    assert_eq!(ephemeral.public, out_key);
    assert_eq!(image, dev.generate_key_image(&out_key, &ephemeral.secret).unwrap());
}

#[test]
fn callback_registration_survives_dropped_host_callback() {
    struct CountingCallback;
    impl DeviceCallback for CountingCallback {}

    let dev = device();
    let callback: Arc<dyn DeviceCallback> = Arc::new(CountingCallback);
    dev.set_callback(Arc::downgrade(&callback));
    drop(callback);

    // The reference is non-owning; device operations keep working after
    // the host side goes away.
    let pair = dev.generate_keys(None).unwrap();
    assert!(dev.verify_keys(&pair.secret, &pair.public).unwrap());
}
