//! Monitor configuration using Figment
//!
//! Configuration is layered, later sources overriding earlier ones:
//! 1. Built-in defaults (four synthetic channels `Dev2/ai0`..`Dev2/ai3`,
//!    one-second poll interval)
//! 2. An optional TOML file
//! 3. Environment variables prefixed with `DAQ_MONITOR_`, nested keys
//!    separated by a double underscore
//!
//! # Environment Variable Overrides
//!
//! ```text
//! DAQ_MONITOR_LOG_LEVEL=debug
//! DAQ_MONITOR_DEVICE__SYNTHETIC=false
//! DAQ_MONITOR_DISPLAY__POLL_INTERVAL=500ms
//! ```
//!
//! # Example file
//!
//! ```toml
//! log_level = "info"
//!
//! [device]
//! channels = ["Dev2/ai3", "Dev2/ai2", "Dev2/ai1", "Dev2/ai0"]
//! limits = [-5.0, 5.0]            # or one [low, high] pair per channel
//! reset = true
//! synthetic = false
//! read_timeout = "10s"
//!
//! [display]
//! poll_interval = "1s"
//! order = ["Dev2/ai0", "Dev2/ai1", "Dev2/ai2", "Dev2/ai3"]
//! ```

use std::path::Path;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::channel::{resolve_channels, ChannelId, ChannelLimits, VoltageRange};
use crate::error::{AppResult, MonitorError};
use crate::poller::{validate_display_order, DEFAULT_POLL_INTERVAL};
use crate::sampler::{SamplerConfig, SamplerMode, DEFAULT_READ_TIMEOUT};

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "DAQ_MONITOR_";

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Acquisition settings
    pub device: DeviceConfig,
    /// Display settings
    pub display: DisplayConfig,
}

/// Acquisition settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Physical channels, in sampling order
    pub channels: Vec<ChannelId>,
    /// Voltage limits; default range when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limits: Option<LimitsSetting>,
    /// Reset the device before opening channels
    pub reset: bool,
    /// Generate random values instead of reading hardware
    pub synthetic: bool,
    /// Timeout of a single hardware read
    #[serde(with = "humantime_serde")]
    pub read_timeout: Duration,
    /// Seed for reproducible synthetic values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

/// Limits as written in the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LimitsSetting {
    /// `[low, high]` for every channel
    Uniform((f64, f64)),
    /// One `[low, high]` pair per channel
    PerChannel(Vec<(f64, f64)>),
}

impl From<&LimitsSetting> for ChannelLimits {
    fn from(setting: &LimitsSetting) -> Self {
        match setting {
            LimitsSetting::Uniform(pair) => ChannelLimits::Uniform(VoltageRange::from(*pair)),
            LimitsSetting::PerChannel(pairs) => {
                ChannelLimits::PerChannel(pairs.iter().copied().map(VoltageRange::from).collect())
            }
        }
    }
}

/// Display settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Interval between ticks
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    /// Slot order; configured channel order when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<Vec<ChannelId>>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            device: DeviceConfig::default(),
            display: DisplayConfig::default(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            channels: (0..4).map(|i| ChannelId::new(format!("Dev2/ai{}", i))).collect(),
            limits: None,
            reset: false,
            synthetic: true,
            read_timeout: DEFAULT_READ_TIMEOUT,
            seed: None,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            order: None,
        }
    }
}

impl MonitorConfig {
    /// Load defaults, then `path` (if given), then the environment, and validate.
    ///
    /// # Errors
    ///
    /// `Configuration` if `path` does not exist or the merged values are
    /// invalid, `Config` if a source cannot be parsed.
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        let mut figment = Figment::from(Serialized::defaults(MonitorConfig::default()));
        if let Some(path) = path {
            if !path.exists() {
                return Err(MonitorError::Configuration(format!(
                    "configuration file '{}' not found",
                    path.display()
                )));
            }
            figment = figment.merge(Toml::file(path));
        }
        let config: Self = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// Checks:
    /// - log level is one of trace/debug/info/warn/error
    /// - channel list is non-empty and free of duplicates
    /// - limits match the channel count and are well-formed
    /// - durations are non-zero
    /// - display order (if given) is a permutation of the channels
    pub fn validate(&self) -> AppResult<()> {
        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(MonitorError::Configuration(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.log_level,
                VALID_LOG_LEVELS.join(", ")
            )));
        }

        resolve_channels(&self.device.channels, &self.channel_limits())?;

        if self.device.read_timeout.is_zero() {
            return Err(MonitorError::Configuration(
                "read_timeout must be greater than zero".to_string(),
            ));
        }
        if self.display.poll_interval.is_zero() {
            return Err(MonitorError::Configuration(
                "poll_interval must be greater than zero".to_string(),
            ));
        }

        if let Some(order) = &self.display.order {
            validate_display_order(&self.device.channels, order)?;
        }
        Ok(())
    }

    /// Limit assignment described by `device.limits`.
    pub fn channel_limits(&self) -> ChannelLimits {
        self.device
            .limits
            .as_ref()
            .map(ChannelLimits::from)
            .unwrap_or_default()
    }

    /// Sampler construction parameters.
    pub fn sampler_config(&self) -> SamplerConfig {
        SamplerConfig {
            channels: self.device.channels.clone(),
            limits: self.channel_limits(),
            reset: self.device.reset,
            mode: if self.device.synthetic {
                SamplerMode::Synthetic
            } else {
                SamplerMode::Hardware
            },
            read_timeout: self.device.read_timeout,
            seed: self.device.seed,
        }
    }

    /// Slot order: `display.order` or the configured channel order.
    pub fn display_order(&self) -> Vec<ChannelId> {
        self.display
            .order
            .clone()
            .unwrap_or_else(|| self.device.channels.clone())
    }

    /// Render the configuration as TOML.
    pub fn to_toml(&self) -> AppResult<String> {
        toml::to_string_pretty(self).map_err(|e| MonitorError::Configuration(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_are_valid() {
        let config = MonitorConfig::default();
        config.validate().unwrap();
        assert_eq!(config.device.channels.len(), 4);
        assert!(config.device.synthetic);
        assert_eq!(config.display.poll_interval, Duration::from_secs(1));
        assert_eq!(config.sampler_config().mode, SamplerMode::Synthetic);
    }

    #[test]
    fn loads_toml_file() {
        let file = write_config(
            r#"
            log_level = "debug"

            [device]
            channels = ["Dev1/ai1", "Dev1/ai0"]
            limits = [[-1.0, 1.0], [0.0, 5.0]]
            reset = true
            synthetic = false
            read_timeout = "2s"

            [display]
            poll_interval = "250ms"
            order = ["Dev1/ai0", "Dev1/ai1"]
            "#,
        );

        let config = MonitorConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.device.read_timeout, Duration::from_secs(2));
        assert_eq!(config.display.poll_interval, Duration::from_millis(250));
        assert_eq!(
            config.channel_limits(),
            ChannelLimits::PerChannel(vec![
                VoltageRange::new(-1.0, 1.0),
                VoltageRange::new(0.0, 5.0)
            ])
        );

        let sampler = config.sampler_config();
        assert_eq!(sampler.mode, SamplerMode::Hardware);
        assert!(sampler.reset);
        assert_eq!(config.display_order()[0], ChannelId::from("Dev1/ai0"));
    }

    #[test]
    fn uniform_limits_parse_from_a_single_pair() {
        let file = write_config(
            r#"
            [device]
            channels = ["A", "B"]
            limits = [-5.0, 5.0]
            "#,
        );
        let config = MonitorConfig::load(Some(file.path())).unwrap();
        assert_eq!(
            config.channel_limits(),
            ChannelLimits::Uniform(VoltageRange::new(-5.0, 5.0))
        );
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = MonitorConfig::load(Some(Path::new("/nonexistent/monitor.toml"))).unwrap_err();
        assert!(matches!(err, MonitorError::Configuration(_)));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut config = MonitorConfig::default();
        config.log_level = "verbose".into();
        assert!(config.validate().is_err());

        let mut config = MonitorConfig::default();
        config.device.channels.clear();
        assert!(config.validate().is_err());

        let mut config = MonitorConfig::default();
        config.device.limits = Some(LimitsSetting::PerChannel(vec![(-1.0, 1.0)]));
        assert!(config.validate().is_err());

        let mut config = MonitorConfig::default();
        config.display.poll_interval = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = MonitorConfig::default();
        config.display.order = Some(vec![ChannelId::from("Dev2/ai0")]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn toml_rendering_loads_back() {
        let mut config = MonitorConfig::default();
        config.device.limits = Some(LimitsSetting::Uniform((-2.0, 2.0)));
        let rendered = config.to_toml().unwrap();
        assert!(rendered.contains("poll_interval = \"1s\""));

        let file = write_config(&rendered);
        assert_eq!(MonitorConfig::load(Some(file.path())).unwrap(), config);
    }
}
