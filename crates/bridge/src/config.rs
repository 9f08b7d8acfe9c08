//! Bridge configuration

use crate::error::BridgeError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use viking_protocol::serial::BAUD_RATE;

/// Environment prefix; nested keys use `__`, e.g. `VIKING_BRIDGE__SERIAL__DEVICE`
pub const ENV_PREFIX: &str = "VIKING_BRIDGE";

/// Device name selecting the built-in burner simulator
pub const MOCK_DEVICE: &str = "mock";

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub serial: SerialConfig,
    pub report: ReportConfig,

    /// Clear attributes after this long without a reading (milliseconds)
    pub stale_timeout_ms: u64,

    /// `trace`, `debug`, `info`, `warn` or `error`
    pub log_level: String,

    /// Protocol core sleep when the queue is empty (microseconds)
    pub idle_poll_us: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            serial: SerialConfig::default(),
            report: ReportConfig::default(),
            stale_timeout_ms: 30_000,
            log_level: "info".to_string(),
            idle_poll_us: 100,
        }
    }
}

/// Burner serial link
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Device path, or `"mock"`
    pub device: String,
    pub baud_rate: u32,
    /// Simulator frame period (milliseconds)
    pub mock_interval_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            device: MOCK_DEVICE.to_string(),
            baud_rate: BAUD_RATE,
            mock_interval_ms: 1_000,
        }
    }
}

impl SerialConfig {
    pub fn is_mock(&self) -> bool {
        self.device.eq_ignore_ascii_case(MOCK_DEVICE)
    }
}

/// Attribute report delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Local UDP address reports are sent from
    pub bind: String,
    /// Minimum time between reports to one target (milliseconds, 0 = none)
    pub interval_ms: u64,
    /// Targets registered at startup
    pub targets: Vec<TargetConfig>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:0".to_string(),
            interval_ms: 0,
            targets: Vec::new(),
        }
    }
}

/// One report destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    pub address: String,
    pub port: u16,
}

impl BridgeConfig {
    /// Load defaults, then the optional TOML file, then environment
    /// overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, BridgeError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Self>()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document (no environment layer)
    pub fn from_toml(text: &str) -> Result<Self, BridgeError> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(text, config::FileFormat::Toml))
            .build()?
            .try_deserialize::<Self>()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), BridgeError> {
        if self.serial.baud_rate == 0 {
            return Err(BridgeError::InvalidConfig("serial.baud_rate must be non-zero".into()));
        }
        if self.idle_poll_us == 0 {
            return Err(BridgeError::InvalidConfig("idle_poll_us must be non-zero".into()));
        }
        if self.stale_timeout_ms == 0 {
            return Err(BridgeError::InvalidConfig("stale_timeout_ms must be non-zero".into()));
        }
        Ok(())
    }
}
