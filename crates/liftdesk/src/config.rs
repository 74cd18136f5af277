//! Service configuration.
//!
//! The configuration is read once at startup and split into the per-layer
//! settings ([`FieldWidths`], [`SensorConfig`], [`MotionConfig`]) that the
//! channel and controller constructors take.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use liftdesk_control::MotionConfig;
use liftdesk_frame::{FieldWidths, FrameSync, SensorConfig};
use liftdesk_transport::{ChannelLifecycle, SerialSettings};
use serde::Deserialize;

/// Number of legs on the desk.
pub const LEG_COUNT: usize = 2;

/// Shortest keep-alive the broker client accepts.
pub const MIN_KEEP_ALIVE_SECS: u64 = 5;

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(message.into())
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub actuator: ActuatorSection,
    #[serde(default)]
    pub sensor: SensorSection,
    #[serde(default)]
    pub motion: MotionSection,
    pub legs: Vec<LegSection>,
    #[serde(default)]
    pub mqtt: MqttSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActuatorSection {
    pub port: String,
    #[serde(default = "default_actuator_baud")]
    pub baud_rate: u32,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_field_width")]
    pub identifier_length: usize,
    #[serde(default = "default_field_width")]
    pub message_length: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SensorSection {
    pub baud_rate: u32,
    pub timeout_ms: u64,
    pub lifecycle: ChannelLifecycle,
    pub sync: FrameSync,
}

impl Default for SensorSection {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            timeout_ms: default_timeout_ms(),
            lifecycle: ChannelLifecycle::default(),
            sync: FrameSync::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MotionSection {
    pub polling_rate_hz: f64,
    pub max_travel_secs: u64,
    pub max_move_secs: Option<u64>,
}

impl Default for MotionSection {
    fn default() -> Self {
        Self {
            polling_rate_hz: 20.0,
            max_travel_secs: 120,
            max_move_secs: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LegSection {
    pub name: String,
    pub identifier: u16,
    pub sensor_port: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MqttSection {
    pub host: String,
    pub port: u16,
    pub topic: String,
    pub client_id: String,
    pub keep_alive_secs: u64,
}

impl Default for MqttSection {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            topic: "desk/height".to_string(),
            client_id: "liftdesk".to_string(),
            keep_alive_secs: 30,
        }
    }
}

fn default_actuator_baud() -> u32 {
    9600
}

fn default_timeout_ms() -> u64 {
    1000
}

fn default_field_width() -> usize {
    2
}

impl Config {
    /// Read, parse and validate the configuration file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        text.parse()
    }

    /// Check cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let widths = self.field_widths()?;

        if self.actuator.port.trim().is_empty() {
            return Err(invalid("actuator.port must not be empty"));
        }
        if self.actuator.baud_rate == 0 || self.sensor.baud_rate == 0 {
            return Err(invalid("baud_rate must be greater than zero"));
        }

        if self.legs.len() != LEG_COUNT {
            return Err(invalid(format!(
                "expected {LEG_COUNT} [[legs]] entries, found {}",
                self.legs.len()
            )));
        }
        let mut names = HashSet::new();
        let mut identifiers = HashSet::new();
        for leg in &self.legs {
            if leg.name.trim().is_empty() {
                return Err(invalid("leg name must not be empty"));
            }
            if leg.sensor_port.trim().is_empty() {
                return Err(invalid(format!("leg {} has no sensor_port", leg.name)));
            }
            if !names.insert(leg.name.as_str()) {
                return Err(invalid(format!("duplicate leg name {}", leg.name)));
            }
            if !identifiers.insert(leg.identifier) {
                return Err(invalid(format!("duplicate leg identifier {}", leg.identifier)));
            }
            if !widths.fits_identifier(leg.identifier) {
                return Err(invalid(format!(
                    "leg {} identifier {} does not fit identifier_length {}",
                    leg.name,
                    leg.identifier,
                    widths.identifier()
                )));
            }
        }

        let hz = self.motion.polling_rate_hz;
        if !hz.is_finite() || hz <= 0.0 || Duration::try_from_secs_f64(1.0 / hz).is_err() {
            return Err(invalid(format!(
                "motion.polling_rate_hz must be a positive number, got {hz}"
            )));
        }
        if self.motion.max_travel_secs == 0 {
            return Err(invalid("motion.max_travel_secs must be greater than zero"));
        }
        if self.motion.max_move_secs == Some(0) {
            return Err(invalid("motion.max_move_secs must be greater than zero"));
        }

        if self.mqtt.host.trim().is_empty() {
            return Err(invalid("mqtt.host must not be empty"));
        }
        if self.mqtt.topic.trim().is_empty() {
            return Err(invalid("mqtt.topic must not be empty"));
        }
        if self.mqtt.client_id.trim().is_empty() {
            return Err(invalid("mqtt.client_id must not be empty"));
        }
        if self.mqtt.keep_alive_secs < MIN_KEEP_ALIVE_SECS {
            return Err(invalid(format!(
                "mqtt.keep_alive_secs must be at least {MIN_KEEP_ALIVE_SECS}"
            )));
        }

        Ok(())
    }

    pub fn field_widths(&self) -> Result<FieldWidths, ConfigError> {
        FieldWidths::new(self.actuator.identifier_length, self.actuator.message_length)
            .map_err(|err| invalid(format!("actuator: {err}")))
    }

    pub fn actuator_settings(&self) -> SerialSettings {
        SerialSettings::new(
            self.actuator.port.clone(),
            self.actuator.baud_rate,
            Duration::from_millis(self.actuator.timeout_ms),
        )
    }

    pub fn sensor_settings(&self, leg: &LegSection) -> SerialSettings {
        SerialSettings::new(
            leg.sensor_port.clone(),
            self.sensor.baud_rate,
            Duration::from_millis(self.sensor.timeout_ms),
        )
    }

    pub fn sensor_config(&self) -> SensorConfig {
        SensorConfig {
            lifecycle: self.sensor.lifecycle,
            sync: self.sensor.sync,
            ..SensorConfig::default()
        }
    }

    pub fn motion_config(&self) -> MotionConfig {
        let default = MotionConfig::default();
        MotionConfig {
            poll_interval: Duration::try_from_secs_f64(1.0 / self.motion.polling_rate_hz)
                .unwrap_or(default.poll_interval),
            max_travel: Duration::from_secs(self.motion.max_travel_secs),
            max_move: self.motion.max_move_secs.map(Duration::from_secs),
        }
    }

    pub fn leg(&self, name: &str) -> Option<&LegSection> {
        self.legs.iter().find(|leg| leg.name == name)
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }
}
