//! Configuration file loading.
//!
//! The file lists the appliances to control. TOML is the native format:
//!
//! ```toml
//! [[devices]]
//! name = "Living Room TV"
//! url = "http://irblaster.local/tv"
//! on_busy = 300
//! ```
//!
//! JSON files are accepted too, including accessory lists exported from
//! other home-automation hubs (`{"accessories": [...]}`). Entries belonging to
//! another accessory type are skipped.

use anyhow::{Context, Result};
use irblast_devices::DeviceConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "IRBLAST_CONFIG";

/// Configuration file used when neither the flag nor the variable is set.
pub const DEFAULT_CONFIG: &str = "config.toml";

/// `accessory` value marking entries this tool controls in a hub config.
pub const ACCESSORY_KIND: &str = "http-irblaster";

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "RawConfig")]
pub struct AppConfig {
    pub devices: Vec<DeviceConfig>,
}

#[derive(Deserialize)]
struct RawConfig {
    #[serde(default, alias = "accessories")]
    devices: Vec<Value>,
}

impl TryFrom<RawConfig> for AppConfig {
    type Error = serde_json::Error;

    fn try_from(raw: RawConfig) -> std::result::Result<Self, Self::Error> {
        let mut devices = Vec::with_capacity(raw.devices.len());
        for entry in raw.devices {
            match entry.get("accessory").and_then(Value::as_str) {
                None | Some(ACCESSORY_KIND) => devices.push(serde_json::from_value(entry)?),
                Some(other) => debug!(accessory = other, "Skipping foreign accessory"),
            }
        }
        Ok(Self { devices })
    }
}

impl AppConfig {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let config = if is_json {
            Self::from_json(&content)
        } else {
            Self::from_toml(&content)
        }
        .with_context(|| format!("Invalid config file {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Validate every device, failing on the first invalid one.
    pub fn validate(&self) -> Result<()> {
        for device in &self.devices {
            device
                .validate()
                .with_context(|| format!("Invalid device '{}'", device.name))?;
        }
        Ok(())
    }
}

/// Resolve the configuration path: flag, then environment, then default.
pub fn resolve_path(flag: Option<PathBuf>) -> PathBuf {
    flag.or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG))
}
