//! Host-side callback capability for devices that need user interaction.
//!
//! Hardware backends prompt for buttons, PINs and passphrases; the host
//! registers a [`DeviceCallback`] to service those prompts. Every method
//! has a safe default, so a host that cares about none of them registers
//! nothing and headless operation still works. Invocations are
//! synchronous on the calling thread and a device keeps at most one
//! prompt outstanding.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]

use zeroize::Zeroizing;

use crate::types::ProgressEvent;

/// The host's answer to a passphrase prompt.
///
/// Entering on the device itself and supplying the passphrase from the
/// host are mutually exclusive, so one enum carries both outcomes.
pub enum PassphraseResponse {
    /// Defer entry to the device's own input surface.
    OnDevice,
    /// Passphrase supplied by the host (zeroized on drop).
    Host(Zeroizing<String>),
}

impl std::fmt::Debug for PassphraseResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OnDevice => f.write_str("PassphraseResponse::OnDevice"),
            Self::Host(_) => f.write_str("PassphraseResponse::Host([REDACTED])"),
        }
    }
}

/// Receiver for device-initiated user interaction.
///
/// Implementations must be `Send + Sync`: a device may be shared across
/// threads through the registry and prompts arrive on whichever thread
/// drove the operation.
pub trait DeviceCallback: Send + Sync {
    /// The device is waiting for a physical button press.
    fn on_button_request(&self, _code: u64) {}

    /// A physical button was pressed.
    fn on_button_pressed(&self) {}

    /// The device needs a PIN. `None` aborts the operation.
    fn on_pin_request(&self) -> Option<Zeroizing<String>> {
        None
    }

    /// The device needs a passphrase.
    fn on_passphrase_request(&self) -> PassphraseResponse {
        PassphraseResponse::OnDevice
    }

    /// Progress report for a long-running operation.
    fn on_progress(&self, _event: &ProgressEvent) {}
}
