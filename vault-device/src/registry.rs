//! Process-wide device registry.
//!
//! Backends register under a unique name; callers resolve a descriptor
//! of the form `name` or `name:params` to the one canonical shared
//! instance. Resolution is idempotent: the same descriptor always yields
//! the same `Arc`, so locking and session state are process-global per
//! backend.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use lazy_static::lazy_static;

use crate::config::DeviceConfig;
use crate::device::Device;
use crate::error::{DeviceError, Result};
use crate::software::SoftwareDevice;

/// Name the software backend registers under.
pub const DEFAULT_DEVICE_NAME: &str = "default";

/// A name-to-backend map with interior locking.
pub struct DeviceRegistry {
    devices: RwLock<HashMap<String, Arc<dyn Device>>>,
}

impl DeviceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { devices: RwLock::new(HashMap::new()) }
    }

    /// Registers `device` under `name`.
    ///
    /// # Errors
    /// [`DeviceError::AlreadyRegistered`] when the name is taken. The
    /// existing registration is never displaced; shared `Arc`s stay
    /// valid.
    pub fn register(&self, name: &str, device: Arc<dyn Device>) -> Result<()> {
        if name.is_empty() || name.contains(':') {
            return Err(DeviceError::InvalidInput(format!(
                "invalid device name for registration: {name:?}"
            )));
        }
        let mut devices = self.devices.write().unwrap_or_else(|poisoned| {
            tracing::warn!("registry lock poisoned, recovering");
            poisoned.into_inner()
        });
        if devices.contains_key(name) {
            return Err(DeviceError::AlreadyRegistered(name.to_owned()));
        }
        tracing::info!(device = name, "registered device backend");
        devices.insert(name.to_owned(), device);
        Ok(())
    }

    /// Resolves a descriptor (`name` or `name:params`) to its backend.
    ///
    /// # Errors
    /// [`DeviceError::UnknownBackend`] when no backend is registered
    /// under the descriptor's name.
    pub fn get(&self, descriptor: &str) -> Result<Arc<dyn Device>> {
        let name = descriptor.split(':').next().unwrap_or(descriptor);
        let devices = self.devices.read().unwrap_or_else(|poisoned| {
            tracing::warn!("registry lock poisoned, recovering");
            poisoned.into_inner()
        });
        devices
            .get(name)
            .cloned()
            .ok_or_else(|| DeviceError::UnknownBackend(name.to_owned()))
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

lazy_static! {
    /// The process-wide registry, constructed on first use with the
    /// software backend pre-registered as [`DEFAULT_DEVICE_NAME`].
    static ref DEFAULT_REGISTRY: DeviceRegistry = {
        let registry = DeviceRegistry::new();
        if let Err(err) =
            registry.register(DEFAULT_DEVICE_NAME, Arc::new(SoftwareDevice::new()))
        {
            tracing::error!(%err, "failed to seed default registry");
        }
        registry
    };
}

/// Resolves a descriptor against the process-wide registry.
///
/// # Errors
/// [`DeviceError::UnknownBackend`] for an unregistered name.
pub fn get_device(descriptor: &str) -> Result<Arc<dyn Device>> {
    DEFAULT_REGISTRY.get(descriptor)
}

/// Registers a backend in the process-wide registry.
///
/// # Errors
/// [`DeviceError::AlreadyRegistered`] when the name is taken.
pub fn register_device(name: &str, device: Arc<dyn Device>) -> Result<()> {
    DEFAULT_REGISTRY.register(name, device)
}

/// Resolves and prepares a device from a validated configuration:
/// initializes, connects, and applies network and derivation-path
/// settings.
///
/// # Errors
/// Configuration validation errors, resolution failures, and any
/// backend setup failure propagate unchanged.
pub fn setup_device(config: &DeviceConfig) -> Result<Arc<dyn Device>> {
    config.validate()?;
    let device = get_device(config.descriptor())?;
    device.init()?;
    device.connect()?;
    device.set_network_type(config.network())?;
    if let Some(path) = config.derivation_path() {
        device.set_derivation_path(path)?;
    }
    Ok(device)
}
