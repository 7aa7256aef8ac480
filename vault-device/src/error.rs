//! Error types for device operations.
//!
//! Two failure tiers are kept distinct: operational failures (transport,
//! malformed input, crypto) and capability gaps
//! ([`DeviceError::Unsupported`]), so callers can probe features without
//! treating a missing capability like a broken device.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]

use thiserror::Error;

/// Errors that can occur during device operations.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The backend does not implement this operation.
    ///
    /// Not an operational failure: hardware families legitimately lack
    /// some operations (for example exporting secret keys).
    #[error("Operation not supported by this device: {operation}")]
    Unsupported {
        /// Name of the unimplemented operation.
        operation: &'static str,
    },

    /// No backend is registered under the requested name.
    #[error("Unknown device backend: {0}")]
    UnknownBackend(String),

    /// A backend with this name is already registered.
    #[error("Device backend already registered: {0}")]
    AlreadyRegistered(String),

    /// The device is not connected or not initialized.
    #[error("Device not connected")]
    NotConnected,

    /// A transaction-scoped operation was invoked with no open session.
    #[error("No open transaction session")]
    NoOpenTransaction,

    /// `open_tx` was called while a session is already open.
    #[error("A transaction session is already in progress")]
    TransactionInProgress,

    /// Invalid input provided to an operation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The user rejected a prompt on the device or via the callback.
    #[error("Denied by user")]
    UserDenied,

    /// Configuration validation error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A cryptographic primitive failed.
    #[error("Primitive error: {0}")]
    Primitives(#[from] vault_primitives::Error),
}

/// Result type alias for device operations.
pub type Result<T> = std::result::Result<T, DeviceError>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_names_the_operation() {
        let err = DeviceError::Unsupported { operation: "get_secret_keys" };
        assert!(err.to_string().contains("get_secret_keys"));
    }

    #[test]
    fn primitive_errors_convert() {
        let err: DeviceError = vault_primitives::Error::InvalidPoint.into();
        assert!(matches!(err, DeviceError::Primitives(_)));
    }
}
