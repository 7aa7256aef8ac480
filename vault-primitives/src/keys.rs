#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]

//! Opaque fixed-size value types crossing the device boundary.
//!
//! Every type here is a thin newtype over a fixed byte array. Secret
//! material zeroizes on drop and never appears in `Debug` output;
//! comparisons of secrets are constant time.

use curve25519_dalek::edwards::{CompressedEdwardsY, EdwardsPoint};
use curve25519_dalek::scalar::Scalar;
use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Error, Result};

macro_rules! impl_public_value {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name(pub(crate) [u8; 32]);

        impl $name {
            /// Wraps raw bytes without validation.
            #[must_use]
            pub const fn from_bytes(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            /// Parses from a slice, rejecting wrong lengths.
            ///
            /// # Errors
            /// Returns [`Error::InvalidLength`] if `bytes` is not 32 bytes.
            pub fn from_slice(bytes: &[u8]) -> Result<Self> {
                let arr: [u8; 32] = bytes
                    .try_into()
                    .map_err(|_| Error::InvalidLength { expected: 32, actual: bytes.len() })?;
                Ok(Self(arr))
            }

            /// Returns the raw byte encoding.
            #[must_use]
            pub const fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            /// Returns the raw byte encoding by value.
            #[must_use]
            pub const fn to_bytes(self) -> [u8; 32] {
                self.0
            }

            /// Hex encoding of the value.
            #[must_use]
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                // Truncated fingerprint keeps logs readable without dumping
                // full key material everywhere.
                write!(f, concat!(stringify!($name), "({}..)"), &self.to_hex()[..16])
            }
        }
    };
}

impl_public_value!(PublicKey, "A compressed Edwards curve point used as a public key.");
impl_public_value!(KeyDerivation, "A shared-secret point produced by `generate_key_derivation`.");
impl_public_value!(KeyImage, "A key image: the double-spend tag of a spent output.");
impl_public_value!(EcScalar, "A scalar in the Ed25519 group order.");
impl_public_value!(EcPoint, "A compressed Edwards curve point used in ring-signature rounds.");
impl_public_value!(Hash, "A 32-byte Keccak-256 digest.");

impl PublicKey {
    /// Decompresses to a curve point, failing for off-curve encodings.
    ///
    /// # Errors
    /// Returns [`Error::InvalidPoint`] if the bytes are not a canonical
    /// point encoding.
    pub fn decompress(&self) -> Result<EdwardsPoint> {
        CompressedEdwardsY(self.0).decompress().ok_or(Error::InvalidPoint)
    }

    /// Compresses a curve point into a public key.
    #[must_use]
    pub fn from_point(point: &EdwardsPoint) -> Self {
        Self(point.compress().to_bytes())
    }
}

impl KeyDerivation {
    /// Decompresses to a curve point, failing for off-curve encodings.
    ///
    /// # Errors
    /// Returns [`Error::InvalidPoint`] if the bytes are not a canonical
    /// point encoding.
    pub fn decompress(&self) -> Result<EdwardsPoint> {
        CompressedEdwardsY(self.0).decompress().ok_or(Error::InvalidPoint)
    }

    /// Compresses a curve point into a derivation.
    #[must_use]
    pub fn from_point(point: &EdwardsPoint) -> Self {
        Self(point.compress().to_bytes())
    }
}

impl KeyImage {
    /// Decompresses to a curve point, failing for off-curve encodings.
    ///
    /// # Errors
    /// Returns [`Error::InvalidPoint`] if the bytes are not a canonical
    /// point encoding.
    pub fn decompress(&self) -> Result<EdwardsPoint> {
        CompressedEdwardsY(self.0).decompress().ok_or(Error::InvalidPoint)
    }

    /// Compresses a curve point into a key image.
    #[must_use]
    pub fn from_point(point: &EdwardsPoint) -> Self {
        Self(point.compress().to_bytes())
    }
}

impl EcPoint {
    /// Decompresses to a curve point, failing for off-curve encodings.
    ///
    /// # Errors
    /// Returns [`Error::InvalidPoint`] if the bytes are not a canonical
    /// point encoding.
    pub fn decompress(&self) -> Result<EdwardsPoint> {
        CompressedEdwardsY(self.0).decompress().ok_or(Error::InvalidPoint)
    }

    /// Compresses a curve point.
    #[must_use]
    pub fn from_point(point: &EdwardsPoint) -> Self {
        Self(point.compress().to_bytes())
    }
}

impl EcScalar {
    /// Interprets the bytes as a canonical scalar.
    ///
    /// # Errors
    /// Returns [`Error::InvalidScalar`] if the bytes are not reduced.
    pub fn to_scalar(&self) -> Result<Scalar> {
        Option::<Scalar>::from(Scalar::from_canonical_bytes(self.0)).ok_or(Error::InvalidScalar)
    }

    /// Encodes a scalar.
    #[must_use]
    pub fn from_scalar(scalar: &Scalar) -> Self {
        Self(scalar.to_bytes())
    }
}

/// An 8-byte truncated hash carrying an encrypted payment ID.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Hash8(pub(crate) [u8; 8]);

impl Hash8 {
    /// Wraps raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    /// Returns the raw byte encoding.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    /// XORs the payment ID in place with an 8-byte pad.
    ///
    /// Payment-ID encryption is this XOR, so applying the same pad twice
    /// restores the original value.
    pub fn xor_with(&mut self, pad: &[u8]) {
        for (b, p) in self.0.iter_mut().zip(pad.iter()) {
            *b ^= p;
        }
    }
}

impl fmt::Debug for Hash8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash8({})", hex::encode(self.0))
    }
}

/// A secret scalar. Zeroized on drop; `Debug` never prints the bytes.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey(pub(crate) [u8; 32]);

impl SecretKey {
    /// Wraps raw bytes without validation.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parses from a slice, rejecting wrong lengths.
    ///
    /// # Errors
    /// Returns [`Error::InvalidLength`] if `bytes` is not 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| Error::InvalidLength { expected: 32, actual: bytes.len() })?;
        Ok(Self(arr))
    }

    /// Returns the raw byte encoding.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Interprets the bytes as a canonical scalar.
    ///
    /// # Errors
    /// Returns [`Error::InvalidScalar`] if the bytes are not reduced.
    pub fn to_scalar(&self) -> Result<Scalar> {
        Option::<Scalar>::from(Scalar::from_canonical_bytes(self.0)).ok_or(Error::InvalidScalar)
    }

    /// Encodes a scalar as a secret key.
    #[must_use]
    pub fn from_scalar(scalar: &Scalar) -> Self {
        Self(scalar.to_bytes())
    }
}

impl PartialEq for SecretKey {
    fn eq(&self, other: &Self) -> bool {
        // Constant-time comparison; secret keys must not leak through
        // early-exit equality.
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for SecretKey {}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey([REDACTED])")
    }
}

/// A Schnorr-style signature: challenge and response scalars.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Signature {
    /// Challenge scalar.
    pub c: EcScalar,
    /// Response scalar.
    pub r: EcScalar,
}

/// A public/secret keypair.
#[derive(Clone, Debug)]
pub struct KeyPair {
    /// The public half.
    pub public: PublicKey,
    /// The secret half (zeroized on drop).
    pub secret: SecretKey,
}
