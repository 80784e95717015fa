//! Bridge configuration
//!
//! Read from an optional `adbridge.toml`. Every field has a default, so an
//! empty file (or no file) yields [`BridgeConfig::default`].
//!
//! ```toml
//! init_timeout_ms = 5000
//! show_timeout_ms = 1000
//! log_filter = "info"
//!
//! [sink]
//! target = "MediationEventReceiver"
//! method = "OnNativeEvent"
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use adbridge_core::SinkAddress;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration file name looked up by [`BridgeConfig::load_from_dir`]
pub const CONFIG_FILE: &str = "adbridge.toml";

/// Errors from parsing or validating a configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),
}

/// Runtime configuration of a [`MediationBridge`](crate::MediationBridge)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Bounded wait for SDK initialization
    pub init_timeout_ms: u64,
    /// Bounded wait for a synchronous show
    pub show_timeout_ms: u64,
    /// Where events are delivered
    pub sink: SinkAddress,
    /// `tracing_subscriber` filter used when `RUST_LOG` is unset
    pub log_filter: String,
    /// Name of the spawned UI thread
    pub ui_thread_name: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            init_timeout_ms: 5_000,
            show_timeout_ms: 1_000,
            sink: SinkAddress::default(),
            log_filter: "info".to_string(),
            ui_thread_name: "adbridge-ui".to_string(),
        }
    }
}

impl BridgeConfig {
    pub fn init_timeout(&self) -> Duration {
        Duration::from_millis(self.init_timeout_ms)
    }

    pub fn show_timeout(&self) -> Duration {
        Duration::from_millis(self.show_timeout_ms)
    }

    /// Parse and validate TOML text
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: BridgeConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.init_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout("init_timeout_ms"));
        }
        if self.show_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout("show_timeout_ms"));
        }
        Ok(())
    }

    /// Load a configuration file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Load `adbridge.toml` from `dir`, falling back to defaults when absent
    pub fn load_from_dir(dir: &Path) -> anyhow::Result<Self> {
        let path = dir.join(CONFIG_FILE);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }
}
