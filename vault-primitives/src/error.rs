//! Error types for vault-primitives operations.

/// Errors that can occur in cryptographic primitive operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A byte buffer does not have the length the value type requires.
    #[error("Invalid length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Expected length in bytes.
        expected: usize,
        /// Actual length provided.
        actual: usize,
    },

    /// The bytes do not decode to a point on the curve.
    #[error("Invalid point: not a canonical curve point encoding")]
    InvalidPoint,

    /// The bytes are not a canonical scalar in the group order.
    #[error("Invalid scalar: not canonically reduced")]
    InvalidScalar,

    /// A signature failed verification or could not be interpreted.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Two values that the operation requires to agree do not agree.
    ///
    /// Raised when a key derivation does not reproduce the expected
    /// public key, so the caller never receives a silently wrong result.
    #[error("Derivation mismatch: {0}")]
    DerivationMismatch(String),

    /// Hex decoding of a value type failed.
    #[error("Hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),
}

/// Result type alias for vault-primitives operations.
pub type Result<T> = std::result::Result<T, Error>;
