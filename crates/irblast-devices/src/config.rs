//! Device configuration.
//!
//! One [`DeviceConfig`] describes one appliance behind an IR blaster. The
//! fields mirror the configuration keys users write:
//!
//! ```toml
//! [[devices]]
//! name = "Bedroom Fan"
//! url = "http://irblaster.local/json"
//! on_busy = 400
//! steps = 4
//! start = 25
//! on_data = [{ type = "nec", data = "FF827D", length = 32 }]
//! off_data = [{ type = "nec", data = "FF02FD", length = 32 }]
//! up_data = [{ type = "nec", data = "FF42BD", length = 32 }]
//! down_data = [{ type = "nec", data = "FFC23D", length = 32 }]
//! ```
//!
//! The configuration is immutable once loaded; [`DeviceConfig::validate`]
//! checks it and selects the device shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::controller::DeviceShape;
use crate::error::{DeviceError, Result};
use crate::payload::TransmitTemplate;

/// Configuration of a single IR-blaster controlled appliance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Human-readable device name, unique per configuration
    pub name: String,
    /// Blaster endpoint receiving the commands
    pub url: String,
    /// Toggle devices only: keep reporting "on" after a toggle
    #[serde(default)]
    pub stateful: bool,
    /// Busy window per repeat of the `on`/`toggle` command (ms)
    #[serde(default = "default_busy")]
    pub on_busy: u64,
    /// Busy window per repeat of the `off` command (ms)
    #[serde(default = "default_busy")]
    pub off_busy: u64,
    /// Busy window per repeat of the `down` command (ms)
    #[serde(default = "default_busy")]
    pub down_busy: u64,
    /// Busy window per repeat of the `up` command (ms)
    #[serde(default = "default_busy")]
    pub up_busy: u64,
    /// Delay between IR code repeats, injected into payloads (ms)
    #[serde(default = "default_rdelay")]
    pub rdelay: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub off_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub up_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub down_data: Option<Value>,
    /// Level reported after power-on (0-100)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<u8>,
    /// Number of discrete level increments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<u32>,
}

fn default_busy() -> u64 {
    1
}

fn default_rdelay() -> u64 {
    200
}

impl DeviceConfig {
    /// Create a plain toggle device configuration with all defaults.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            stateful: false,
            on_busy: default_busy(),
            off_busy: default_busy(),
            down_busy: default_busy(),
            up_busy: default_busy(),
            rdelay: default_rdelay(),
            on_data: None,
            off_data: None,
            up_data: None,
            down_data: None,
            start: None,
            steps: None,
        }
    }

    /// Set the on/off payload templates, making the device a stateful switch.
    pub fn with_power_data(mut self, on: Value, off: Option<Value>) -> Self {
        self.on_data = Some(on);
        self.off_data = off;
        self
    }

    /// Set the up/down payload templates and step count.
    pub fn with_level_data(mut self, up: Value, down: Value, steps: u32) -> Self {
        self.up_data = Some(up);
        self.down_data = Some(down);
        self.steps = Some(steps);
        self
    }

    pub fn with_start(mut self, start: u8) -> Self {
        self.start = Some(start);
        self
    }

    /// Set the busy windows (ms per repeat) for on, off, up and down.
    pub fn with_busy(mut self, on: u64, off: u64, up: u64, down: u64) -> Self {
        self.on_busy = on;
        self.off_busy = off;
        self.up_busy = up;
        self.down_busy = down;
        self
    }

    /// Check the configuration and select the device shape.
    ///
    /// Any problem is reported as [`DeviceError::Configuration`]; a device
    /// is never constructed from a configuration that fails here.
    pub fn validate(&self) -> Result<DeviceShape> {
        if self.name.trim().is_empty() {
            return Err(DeviceError::config("device name must not be empty"));
        }
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(DeviceError::config(format!(
                "{}: url must be an http(s) URL, got '{}'",
                self.name, self.url
            )));
        }
        for (key, value) in [
            ("on_busy", self.on_busy),
            ("off_busy", self.off_busy),
            ("up_busy", self.up_busy),
            ("down_busy", self.down_busy),
        ] {
            if value == 0 {
                return Err(DeviceError::config(format!(
                    "{}: {} must be a positive number of milliseconds",
                    self.name, key
                )));
            }
        }
        if let Some(start) = self.start {
            if start > 100 {
                return Err(DeviceError::config(format!(
                    "{}: start must be within 0-100, got {}",
                    self.name, start
                )));
            }
        }

        // Parse every template up front so malformed ones fail here.
        let on = self.template("on_data", &self.on_data)?;
        self.template("off_data", &self.off_data)?;
        let up = self.template("up_data", &self.up_data)?;
        let down = self.template("down_data", &self.down_data)?;

        match (on, up, down) {
            (None, None, None) => {
                if self.off_data.is_some() {
                    return Err(DeviceError::config(format!(
                        "{}: off_data requires on_data",
                        self.name
                    )));
                }
                Ok(DeviceShape::Toggle {
                    momentary: !self.stateful,
                })
            }
            (Some(_), None, None) => Ok(DeviceShape::Switch),
            (Some(_), Some(_), Some(_)) => match self.steps {
                Some(steps) if steps > 0 => Ok(DeviceShape::SwitchWithLevel { steps }),
                Some(_) => Err(DeviceError::config(format!(
                    "{}: steps must be a positive integer",
                    self.name
                ))),
                None => Err(DeviceError::config(format!(
                    "{}: steps is required when up_data/down_data are configured",
                    self.name
                ))),
            },
            (None, _, _) => Err(DeviceError::config(format!(
                "{}: up_data/down_data require on_data",
                self.name
            ))),
            (Some(_), _, _) => Err(DeviceError::config(format!(
                "{}: up_data and down_data must be configured together",
                self.name
            ))),
        }
    }

    /// Parsed template for a `*_data` field, `None` when the action is a plain signal.
    pub(crate) fn template(&self, key: &str, value: &Option<Value>) -> Result<Option<TransmitTemplate>> {
        value
            .as_ref()
            .map(|v| {
                TransmitTemplate::from_value(v.clone())
                    .map_err(|e| DeviceError::config(format!("{}: {}: {}", self.name, key, e)))
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fan() -> DeviceConfig {
        DeviceConfig::new("fan", "http://blaster.local/json")
            .with_power_data(json!([{"code": 1}]), Some(json!([{"code": 2}])))
            .with_level_data(json!([{"code": 3}]), json!([{"code": 4}]), 4)
    }

    #[test]
    fn test_defaults_from_toml() {
        let config: DeviceConfig = toml::from_str(
            r#"
            name = "tv"
            url = "http://blaster.local/"
            "#,
        )
        .unwrap();

        assert!(!config.stateful);
        assert_eq!(config.on_busy, 1);
        assert_eq!(config.off_busy, 1);
        assert_eq!(config.up_busy, 1);
        assert_eq!(config.down_busy, 1);
        assert_eq!(config.rdelay, 200);
        assert!(config.on_data.is_none());
        assert!(config.start.is_none());
    }

    #[test]
    fn test_shape_selection() {
        let toggle = DeviceConfig::new("tv", "http://blaster.local/");
        assert_eq!(
            toggle.validate().unwrap(),
            DeviceShape::Toggle { momentary: true }
        );

        let mut stateful = toggle.clone();
        stateful.stateful = true;
        assert_eq!(
            stateful.validate().unwrap(),
            DeviceShape::Toggle { momentary: false }
        );

        let switch = DeviceConfig::new("amp", "http://blaster.local/")
            .with_power_data(json!([{"code": 1}]), None);
        assert_eq!(switch.validate().unwrap(), DeviceShape::Switch);

        assert_eq!(
            fan().validate().unwrap(),
            DeviceShape::SwitchWithLevel { steps: 4 }
        );
    }

    #[test]
    fn test_missing_steps_rejected() {
        let mut config = fan();
        config.steps = None;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, DeviceError::Configuration(_)));
        assert!(err.to_string().contains("steps"));

        config.steps = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_templates_rejected() {
        let mut config = fan();
        config.on_data = Some(json!([]));
        assert!(config.validate().is_err());

        config.on_data = Some(json!({"code": 1}));
        assert!(config.validate().is_err());

        config.on_data = Some(json!([42]));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inconsistent_actions_rejected() {
        let mut config = fan();
        config.down_data = None;
        assert!(config.validate().is_err());

        let mut config = fan();
        config.on_data = None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_scalars_rejected() {
        assert!(DeviceConfig::new("", "http://x/").validate().is_err());
        assert!(DeviceConfig::new("tv", "blaster.local").validate().is_err());
        assert!(DeviceConfig::new("tv", "http://x/")
            .with_busy(0, 1, 1, 1)
            .validate()
            .is_err());
        assert!(fan().with_start(101).validate().is_err());
    }
}
