#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]

//! Keccak-256 hashing and the hash-to-scalar / hash-to-point maps.

use curve25519_dalek::edwards::{CompressedEdwardsY, EdwardsPoint};
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::IsIdentity;
use sha3::{Digest, Keccak256};

use crate::keys::{EcScalar, Hash};

/// Computes the Keccak-256 digest of `data`.
#[must_use]
pub fn keccak256(data: &[u8]) -> Hash {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Keccak256::digest(data));
    Hash::from_bytes(out)
}

/// Hashes `data` to a canonically reduced scalar.
///
/// Deterministic: identical input always yields the identical scalar,
/// which is what keeps derivations reproducible across backends.
#[must_use]
pub fn hash_to_scalar(data: &[u8]) -> EcScalar {
    let digest = keccak256(data);
    EcScalar::from_scalar(&Scalar::from_bytes_mod_order(digest.to_bytes()))
}

/// Hashes `data` to a point in the prime-order subgroup.
///
/// Deterministic try-and-increment: re-hash until the digest decompresses
/// to a curve point, then clear the cofactor. The discrete log of the
/// result is unknown to everyone, which is the property key images need.
#[must_use]
pub fn hash_to_point(data: &[u8]) -> EdwardsPoint {
    let mut candidate = keccak256(data).to_bytes();
    loop {
        if let Some(point) = CompressedEdwardsY(candidate).decompress() {
            let cleared = point.mul_by_cofactor();
            if !cleared.is_identity() {
                return cleared;
            }
        }
        candidate = keccak256(&candidate).to_bytes();
    }
}

/// Appends the LEB128 varint encoding of `value` to `buf`.
///
/// Index encodings feed hash-to-scalar, so the byte layout is part of the
/// derivation contract and must stay stable.
pub fn write_varint(buf: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        buf.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn keccak256_matches_known_answer() {
        // Keccak-256("") from the original Keccak submission vectors.
        let digest = keccak256(b"");
        assert_eq!(
            digest.to_hex(),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn hash_to_scalar_is_deterministic_and_canonical() {
        let a = hash_to_scalar(b"derivation bytes");
        let b = hash_to_scalar(b"derivation bytes");
        assert_eq!(a, b);
        assert!(a.to_scalar().is_ok());
    }

    #[test]
    fn hash_to_point_lands_in_prime_subgroup() {
        let p = hash_to_point(b"an output key");
        assert!(p.is_torsion_free());
        assert!(!p.is_identity());
        // Deterministic for identical input.
        assert_eq!(p, hash_to_point(b"an output key"));
        assert_ne!(p, hash_to_point(b"a different output key"));
    }

    #[test]
    fn varint_encoding_matches_leb128() {
        let cases: &[(u64, &[u8])] = &[
            (0, &[0x00]),
            (1, &[0x01]),
            (127, &[0x7f]),
            (128, &[0x80, 0x01]),
            (300, &[0xac, 0x02]),
            (u64::MAX, &[0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01]),
        ];
        for (value, expected) in cases {
            let mut buf = Vec::new();
            write_varint(&mut buf, *value);
            assert_eq!(buf.as_slice(), *expected, "varint({value})");
        }
    }
}
