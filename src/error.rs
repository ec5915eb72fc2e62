//! Custom error types for the monitor.
//!
//! `MonitorError` is the single error type of the library. It separates two
//! classes of failure:
//!
//! - **Activation errors** (`DeviceUnavailable`, `Configuration`, `Config`):
//!   raised while the sampler is built or configured. They abort plugin
//!   activation and are returned to whoever is bringing the plugin up.
//! - **Per-tick errors** (`ChannelNotConfigured`, `ReadTimeout`, `Driver`):
//!   raised by a single read. The poller catches them at the tick boundary,
//!   logs them and keeps polling.
//!
//! Use [`MonitorError::is_recoverable`] to tell them apart.

use std::time::Duration;

use thiserror::Error;

use crate::channel::ChannelId;

/// Convenience alias for results using the monitor error type.
pub type AppResult<T> = std::result::Result<T, MonitorError>;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Device '{device}' unavailable: {reason}")]
    DeviceUnavailable { device: String, reason: String },

    #[error("Channel '{0}' is not configured")]
    ChannelNotConfigured(ChannelId),

    #[error("Read from channel '{channel}' timed out after {timeout:?}")]
    ReadTimeout { channel: ChannelId, timeout: Duration },

    #[error("Sampler used before configure()")]
    NotConfigured,

    #[error("Driver error on channel '{channel}': {reason}")]
    Driver { channel: ChannelId, reason: String },

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("Poller is already running")]
    AlreadyRunning,

    #[error("Plugin has been closed")]
    Closed,
}

impl MonitorError {
    /// True for errors the poller absorbs at the tick boundary.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MonitorError::ChannelNotConfigured(_)
                | MonitorError::ReadTimeout { .. }
                | MonitorError::Driver { .. }
        )
    }
}

impl From<figment::Error> for MonitorError {
    fn from(err: figment::Error) -> Self {
        MonitorError::Config(Box::new(err))
    }
}
