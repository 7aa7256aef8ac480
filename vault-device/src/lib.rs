#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]

//! # RingVault Device
//!
//! The transaction-signing device abstraction: a backend-agnostic
//! [`Device`] contract, a process-wide [`registry`], a cooperative
//! exclusive lock, mode lifecycle management, and the in-process
//! [`SoftwareDevice`] backend registered as `"default"`.
//!
//! Wallet code talks to a `dyn Device` and never learns whether keys
//! live in process memory or on external hardware. Hardware families
//! implement the same trait out-of-tree and register themselves by
//! name.
//!
//! ## Quick start
//!
//! ```rust
//! use vault_device::{get_device, DeviceMode, ModeGuard, TxType, TxVersion};
//!
//! # fn main() -> vault_device::Result<()> {
//! let device = get_device("default")?;
//! device.init()?;
//!
//! device.lock();
//! let guard = ModeGuard::new(device.as_ref(), DeviceMode::TransactionReal)?;
//! let _tx_key = device.open_tx(TxVersion::V2, TxType::Standard)?;
//! // ... derive output keys, sign ...
//! device.close_tx()?;
//! drop(guard);
//! device.unlock();
//! # Ok(())
//! # }
//! ```

pub mod callback;
pub mod config;
pub mod device;
pub mod error;
pub mod logging;
pub mod registry;
pub mod software;
pub mod types;


use std::sync::atomic::{AtomicBool, Ordering};

use vault_primitives::ops;

pub use callback::{DeviceCallback, PassphraseResponse};
pub use config::DeviceConfig;
pub use device::{
    ClsagPrepared, Device, MlsagPrepared, ModeGuard, OutputEphemeralKeys, OutputKeyParams,
};
pub use error::{DeviceError, Result};
pub use registry::{
    get_device, register_device, setup_device, DeviceRegistry, DEFAULT_DEVICE_NAME,
};
pub use software::SoftwareDevice;
pub use types::{
    AccountKeys, AccountPublicAddress, CtKey, DeviceMode, DeviceProtocol, DeviceType, EcdhTuple,
    NetworkType, ProgressEvent, SubaddressIndex, TxDestinationEntry, TxType, TxVersion,
};

/// Whether the power-up self-check has run and passed.
static SELF_CHECK_PASSED: AtomicBool = AtomicBool::new(false);

/// Initializes the library: sets up logging if none is configured and
/// runs the power-up self-check against the primitives stack.
///
/// Idempotent; later calls only re-verify the self-check flag.
///
/// # Errors
///
/// Returns [`DeviceError::InvalidInput`] if the self-check fails, which
/// means the curve backend is producing inconsistent derivations and no
/// signing operation can be trusted.
pub fn init() -> Result<()> {
    // A pre-existing global subscriber is fine; ours is best-effort.
    let _ = logging::init_tracing();

    if SELF_CHECK_PASSED.load(Ordering::SeqCst) {
        return Ok(());
    }
    run_self_check()?;
    SELF_CHECK_PASSED.store(true, Ordering::SeqCst);
    tracing::info!("device self-check passed");
    Ok(())
}

/// Whether [`init`] has completed successfully in this process.
#[must_use]
pub fn is_self_check_passed() -> bool {
    SELF_CHECK_PASSED.load(Ordering::SeqCst)
}

/// Derivation round-trip and payment-ID involution over fresh keys.
fn run_self_check() -> Result<()> {
    let recipient = ops::generate_keys(None)?;
    let tx = ops::generate_keys(None)?;

    // The secret and public derivation paths must agree.
    let derivation = ops::generate_key_derivation(&recipient.public, &tx.secret)?;
    let derived_public = ops::derive_public_key(&derivation, 0, &recipient.public)?;
    let derived_secret = ops::derive_secret_key(&derivation, 0, &recipient.secret)?;
    if ops::secret_key_to_public_key(&derived_secret)? != derived_public {
        return Err(DeviceError::InvalidInput(
            "self-check failed: derivation round-trip mismatch".to_owned(),
        ));
    }

    // Payment-ID encryption must be an involution.
    let device = SoftwareDevice::new();
    let payment_id = vault_primitives::Hash8::from_bytes([1, 2, 3, 4, 5, 6, 7, 8]);
    let encrypted = device.encrypt_payment_id(payment_id, &recipient.public, &tx.secret)?;
    let decrypted = device.decrypt_payment_id(encrypted, &recipient.public, &tx.secret)?;
    if decrypted != payment_id {
        return Err(DeviceError::InvalidInput(
            "self-check failed: payment-ID encryption is not an involution".to_owned(),
        ));
    }

    Ok(())
}
