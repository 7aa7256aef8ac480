//! Configuration for resolving and preparing a device.
//!
//! A [`DeviceConfig`] carries everything [`crate::registry::setup_device`]
//! needs: the registry descriptor, the network the wallet addresses
//! belong to, and an optional derivation path for backends that use one.
//! Persisting the configuration is the caller's concern.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]

use serde::{Deserialize, Serialize};

use crate::error::{DeviceError, Result};
use crate::types::NetworkType;

/// Settings used when resolving and preparing a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Registry descriptor: `name` or `name:params`.
    ///
    /// Default: `"default"` (the software backend).
    pub descriptor: String,

    /// Network the wallet's addresses belong to.
    ///
    /// Default: `NetworkType::Mainnet`
    pub network: NetworkType,

    /// Derivation path for backends that use one, or `None` for the
    /// backend's own default.
    pub derivation_path: Option<String>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            descriptor: crate::registry::DEFAULT_DEVICE_NAME.to_owned(),
            network: NetworkType::Mainnet,
            derivation_path: None,
        }
    }
}

impl DeviceConfig {
    /// Creates a configuration resolving to the software backend on
    /// mainnet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the registry descriptor and returns self for method
    /// chaining.
    #[must_use]
    pub fn with_descriptor(mut self, descriptor: impl Into<String>) -> Self {
        self.descriptor = descriptor.into();
        self
    }

    /// Sets the network type and returns self for method chaining.
    #[must_use]
    pub fn with_network(mut self, network: NetworkType) -> Self {
        self.network = network;
        self
    }

    /// Sets the derivation path and returns self for method chaining.
    #[must_use]
    pub fn with_derivation_path(mut self, path: impl Into<String>) -> Self {
        self.derivation_path = Some(path.into());
        self
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    /// Same conditions as [`DeviceConfig::validate`].
    pub fn build(self) -> Result<Self> {
        self.validate()?;
        Ok(self)
    }

    /// Validates the configuration settings.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The descriptor is empty or its name part (before `:`) is empty
    /// - A derivation path is set but empty
    pub fn validate(&self) -> Result<()> {
        let name = self.descriptor.split(':').next().unwrap_or("");
        if name.is_empty() {
            return Err(DeviceError::Configuration(
                "device descriptor must start with a backend name".to_string(),
            ));
        }

        if let Some(path) = &self.derivation_path {
            if path.is_empty() {
                return Err(DeviceError::Configuration(
                    "derivation path must not be empty when set".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// The full registry descriptor.
    #[must_use]
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    /// The configured network.
    #[must_use]
    pub const fn network(&self) -> NetworkType {
        self.network
    }

    /// The configured derivation path, if any.
    #[must_use]
    pub fn derivation_path(&self) -> Option<&str> {
        self.derivation_path.as_deref()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn default_resolves_to_software_backend() {
        let config = DeviceConfig::new();
        assert_eq!(config.descriptor(), "default");
        assert_eq!(config.network(), NetworkType::Mainnet);
        assert!(config.derivation_path().is_none());
        config.validate().unwrap();
    }

    #[test]
    fn builder_pattern_sets_all_fields() {
        let config = DeviceConfig::new()
            .with_descriptor("ledger:usb-0")
            .with_network(NetworkType::Testnet)
            .with_derivation_path("m/44'/128'/0'")
            .build()
            .unwrap();

        assert_eq!(config.descriptor(), "ledger:usb-0");
        assert_eq!(config.network(), NetworkType::Testnet);
        assert_eq!(config.derivation_path(), Some("m/44'/128'/0'"));
    }

    #[test]
    fn empty_descriptor_fails_validation() {
        assert!(DeviceConfig::new().with_descriptor("").validate().is_err());
        assert!(DeviceConfig::new().with_descriptor(":params").validate().is_err());
    }

    #[test]
    fn empty_derivation_path_fails_validation() {
        assert!(DeviceConfig::new().with_derivation_path("").validate().is_err());
    }
}
