//! Rig configuration, read from a TOML file. Every field has a default so
//! a file only needs the values that differ.

use std::{fs, path::Path, time::Duration};

use common::physical::ServoAngle;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    externals::position_stream::{
        adapters::Projection,
        client::{default_client_name, StreamSettings},
        endpoint::{Endpoint, EndpointError},
        services::TcpConnector,
    },
    internals::{control_system::axis::AxisSettings, core::controls::Calibration},
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file. Error: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config file. Error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigConfig {
    /// One of trace, debug, info, warn, error.
    pub log_level: String,
    pub stream: StreamConfig,
    pub pan: AxisConfig,
    pub tilt: AxisConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// `host[:port]` of the position server.
    pub endpoint: String,
    pub client_name: String,
    pub retry_delay_ms: u64,
    pub connect_timeout_ms: u64,
    pub register_timeout_ms: u64,
    pub poll_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisConfig {
    pub name: String,
    pub alternate: bool,
    /// False for an axis mounted mirrored.
    pub forward: bool,
    pub secs_per_180: f64,
    pub pixels_per_degree: f64,
    pub loop_interval_ms: u64,
    pub stall_warning_ms: u64,
    pub projection: Projection,
    pub actuator: ActuatorConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActuatorConfig {
    Noop,
    Simulated { home_angle: i32 },
    Serial {
        port: String,
        baud_rate: u32,
        channel: u8,
        home_angle: i32,
    },
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            stream: StreamConfig::default(),
            pan: AxisConfig::named("pan"),
            tilt: AxisConfig::named("tilt"),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            endpoint: "localhost".to_string(),
            client_name: default_client_name(),
            retry_delay_ms: 1000,
            connect_timeout_ms: 2000,
            register_timeout_ms: 5000,
            poll_timeout_ms: 250,
        }
    }
}

impl Default for AxisConfig {
    /// Unnamed; `RigConfig` names it after the table it was read from.
    fn default() -> Self {
        Self::named("")
    }
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        ActuatorConfig::Simulated {
            home_angle: ServoAngle::center().into(),
        }
    }
}

impl AxisConfig {
    pub fn named(name: &str) -> Self {
        let calibration = Calibration::default();
        Self {
            name: name.to_string(),
            alternate: false,
            forward: true,
            secs_per_180: calibration.secs_per_180,
            pixels_per_degree: calibration.pixels_per_degree,
            loop_interval_ms: 100,
            stall_warning_ms: 5000,
            projection: Projection::default(),
            actuator: ActuatorConfig::default(),
        }
    }

    pub fn calibration(&self) -> Calibration {
        Calibration {
            secs_per_180: self.secs_per_180,
            pixels_per_degree: self.pixels_per_degree,
        }
    }

    pub fn settings(&self) -> AxisSettings {
        AxisSettings {
            name: self.name.clone(),
            alternate: self.alternate,
            calibration: self.calibration(),
            loop_interval: Duration::from_millis(self.loop_interval_ms),
            stall_warning: Duration::from_millis(self.stall_warning_ms),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("axis name must not be empty".to_string()));
        }
        if !self.calibration().is_valid() {
            return Err(ConfigError::Invalid(format!(
                "axis '{}' needs pixels_per_degree > 0 and secs_per_180 >= 0",
                self.name
            )));
        }
        if self.loop_interval_ms == 0 {
            return Err(ConfigError::Invalid(format!(
                "axis '{}' loop_interval_ms must be greater than 0",
                self.name
            )));
        }
        Ok(())
    }
}

impl StreamConfig {
    pub fn endpoint(&self) -> Result<Endpoint, EndpointError> {
        self.endpoint.parse()
    }

    pub fn settings(&self) -> Result<StreamSettings, ConfigError> {
        Ok(StreamSettings {
            endpoint: self.endpoint()?,
            client_name: self.client_name.clone(),
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        })
    }

    pub fn connector(&self) -> TcpConnector {
        TcpConnector {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            register_timeout: Duration::from_millis(self.register_timeout_ms),
            poll_timeout: Duration::from_millis(self.poll_timeout_ms),
        }
    }
}

impl RigConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(raw)?;
        if config.pan.name.is_empty() {
            config.pan.name = "pan".to_string();
        }
        if config.tilt.name.is_empty() {
            config.tilt.name = "tilt".to_string();
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.stream.endpoint()?;
        if self.stream.retry_delay_ms == 0 {
            return Err(ConfigError::Invalid(
                "stream retry_delay_ms must be greater than 0".to_string(),
            ));
        }
        if self.stream.poll_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "stream poll_timeout_ms must be greater than 0".to_string(),
            ));
        }
        self.pan.validate()?;
        self.tilt.validate()?;
        if self.pan.alternate != self.tilt.alternate {
            return Err(ConfigError::Invalid(
                "alternate must be set on both axes or neither".to_string(),
            ));
        }
        Ok(())
    }
}
