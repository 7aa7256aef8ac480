//! Logging utilities for device operations.
//!
//! Structured logging via `tracing`, with sanitizers that keep key
//! material, derivations and transaction secrets out of log output.
//! Anything that crosses the device boundary is logged as a length plus
//! an optional fingerprint, never as raw bytes.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]

use std::fmt;

use sha3::{Digest, Keccak256};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing with security-conscious defaults.
///
/// Environment-based filtering (`RUST_LOG`, falling back to
/// `ringvault=info`) and a compact formatter. Call once per process.
///
/// # Errors
///
/// Returns an error if a global subscriber is already set.
pub fn init_tracing() -> Result<(), Box<dyn std::error::Error>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ringvault=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false)
                .compact(),
        )
        .try_init()?;

    tracing::info!("RingVault logging initialized");
    Ok(())
}

/// First 16 hex characters of the Keccak-256 digest of `data`.
///
/// A fingerprint for correlating values across log lines without
/// revealing content.
fn keccak_first_16_hex(data: &[u8]) -> String {
    let digest = Keccak256::digest(data);
    digest.get(..8).map_or_else(|| hex::encode(digest), hex::encode)
}

/// Sanitize byte data for logging.
///
/// Key-sized data (32 bytes and under) shows only its length; larger
/// blobs additionally carry a fingerprint for correlation.
///
/// # Example
///
/// ```rust
/// use vault_device::logging::sanitize_bytes;
///
/// assert_eq!(sanitize_bytes(&[1, 2, 3]), "[3 bytes]");
///
/// let blob = vec![0u8; 100];
/// assert!(sanitize_bytes(&blob).contains("fingerprint:"));
/// ```
#[must_use]
pub fn sanitize_bytes(data: &[u8]) -> String {
    if data.len() <= 32 {
        format!("[{} bytes]", data.len())
    } else {
        format!("[{} bytes, fingerprint: {}]", data.len(), keccak_first_16_hex(data))
    }
}

/// Wraps bytes in a lazily sanitized `Display`, for use directly inside
/// logging calls.
#[must_use]
pub fn sanitize_data(data: &[u8]) -> SanitizedData<'_> {
    SanitizedData(data)
}

/// Display wrapper produced by [`sanitize_data`].
pub struct SanitizedData<'a>(&'a [u8]);

impl fmt::Display for SanitizedData<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.len() <= 32 {
            write!(f, "[{} bytes]", self.0.len())
        } else {
            write!(f, "[{} bytes, fingerprint: {}]", self.0.len(), keccak_first_16_hex(self.0))
        }
    }
}

/// Log the start of a device operation at TRACE level.
#[macro_export]
macro_rules! log_device_operation {
    ($device:expr, $op:expr) => {
        tracing::trace!(target: "device::operation", device = %$device, operation = $op);
    };
    ($device:expr, $op:expr, $($field:tt)*) => {
        tracing::trace!(
            target: "device::operation",
            device = %$device,
            operation = $op,
            $($field)*
        );
    };
}

/// Log a device operation failure at ERROR level.
#[macro_export]
macro_rules! log_device_error {
    ($device:expr, $op:expr, $error:expr) => {
        tracing::error!(
            target: "device::operation",
            device = %$device,
            operation = $op,
            error = %$error,
            "device operation failed"
        );
    };
}
