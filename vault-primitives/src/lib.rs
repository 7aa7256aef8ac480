#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]

//! # RingVault Primitives
//!
//! Curve25519 and Keccak-256 primitives underpinning the RingVault
//! signing-device abstraction.
//!
//! This crate holds the math; it knows nothing about devices, sessions
//! or transaction state. Everything here is deterministic for identical
//! inputs (randomness is always drawn explicitly), so software and
//! hardware backends derive identical keys from identical wallets.
//!
//! ## Modules
//!
//! - **keys**: opaque 32-byte value types ([`PublicKey`], [`SecretKey`],
//!   [`KeyDerivation`], [`KeyImage`], [`EcScalar`], [`EcPoint`],
//!   [`Hash`], [`Hash8`]) with zeroization and redacted `Debug` for
//!   secrets
//! - **hash**: Keccak-256, hash-to-scalar and hash-to-point maps
//! - **ops**: key derivation, key images, Schnorr-style proofs, scalar
//!   and point arithmetic
//! - **error**: shared error and result types

pub mod error;
pub mod hash;
pub mod keys;
pub mod ops;

pub use error::{Error, Result};
pub use hash::{hash_to_point, hash_to_scalar, keccak256, write_varint};
pub use keys::{
    EcPoint, EcScalar, Hash, Hash8, KeyDerivation, KeyImage, KeyPair, PublicKey, SecretKey,
    Signature,
};
pub use ops::*;
