//! Measurement sources.
//!
//! A [`Sampler`] produces one scalar reading per configured channel on
//! demand. Two variants implement it:
//!
//! - [`HardwareSampler`]: one acquisition task per channel behind a
//!   [`DaqDriver`].
//! - [`SyntheticSampler`]: uniform random values in `[0, 1)`, no hardware.
//!
//! The variant is chosen once by [`build_sampler`] from a [`SamplerConfig`].
//!
//! # Snapshots
//!
//! [`Sampler::read_all`] reads each channel independently, one after another.
//! Values in a [`Snapshot`] may therefore come from slightly different
//! instants, and a failure on one channel is recorded next to the values of
//! the others instead of discarding them.

pub mod hardware;
pub mod synthetic;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::channel::{ChannelId, ChannelLimits, VoltageRange};
use crate::driver::DaqDriver;
use crate::error::{AppResult, MonitorError};

pub use hardware::HardwareSampler;
pub use synthetic::SyntheticSampler;

/// Timeout of a single hardware read.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of one [`Sampler::read_all`] call.
#[derive(Debug)]
pub struct Snapshot {
    /// Monotonic per-sampler counter; later snapshots have larger numbers.
    pub sequence: u64,
    /// When the snapshot was started.
    pub taken_at: DateTime<Utc>,
    readings: HashMap<ChannelId, AppResult<f64>>,
}

impl Snapshot {
    /// Build a snapshot from per-channel results.
    pub fn new(sequence: u64, taken_at: DateTime<Utc>, readings: HashMap<ChannelId, AppResult<f64>>) -> Self {
        Self {
            sequence,
            taken_at,
            readings,
        }
    }

    /// Outcome for `channel`, if it was part of the snapshot.
    pub fn get(&self, channel: &ChannelId) -> Option<&AppResult<f64>> {
        self.readings.get(channel)
    }

    /// Successful value for `channel`.
    pub fn value(&self, channel: &ChannelId) -> Option<f64> {
        match self.readings.get(channel) {
            Some(Ok(value)) => Some(*value),
            _ => None,
        }
    }

    /// Iterate over successful readings (unspecified order).
    pub fn values(&self) -> impl Iterator<Item = (&ChannelId, f64)> {
        self.readings
            .iter()
            .filter_map(|(id, r)| r.as_ref().ok().map(|v| (id, *v)))
    }

    /// Iterate over failed channels (unspecified order).
    pub fn failures(&self) -> impl Iterator<Item = (&ChannelId, &MonitorError)> {
        self.readings
            .iter()
            .filter_map(|(id, r)| r.as_ref().err().map(|e| (id, e)))
    }

    /// Number of channels in the snapshot.
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    /// True when the snapshot holds no channel.
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

/// Hands out snapshot sequence numbers.
#[derive(Debug, Default)]
pub struct SequenceCounter(AtomicU64);

impl SequenceCounter {
    /// Next sequence number, starting at 1.
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Capability interface shared by the hardware and synthetic samplers.
#[async_trait]
pub trait Sampler: Send + Sync {
    /// Configured channels, in configuration order.
    fn channels(&self) -> &[ChannelId];

    /// Effective voltage limit of `channel`.
    fn limit(&self, channel: &ChannelId) -> Option<VoltageRange>;

    /// Source of snapshot sequence numbers.
    fn sequence(&self) -> &SequenceCounter;

    /// Prepare the sampler for reads. Calling it again is a no-op.
    async fn configure(&self) -> AppResult<()>;

    /// Read one sample from `channel`, or from the first channel when `None`.
    async fn read(&self, channel: Option<&ChannelId>) -> AppResult<f64>;

    /// Release every acquisition resource. Calling it again is a no-op.
    async fn release(&self) -> AppResult<()> {
        Ok(())
    }

    /// Read every channel once, independently.
    async fn read_all(&self) -> Snapshot {
        let sequence = self.sequence().next();
        let taken_at = Utc::now();
        let mut readings = HashMap::with_capacity(self.channels().len());
        for channel in self.channels() {
            let outcome = self.read(Some(channel)).await;
            readings.insert(channel.clone(), outcome);
        }
        Snapshot::new(sequence, taken_at, readings)
    }

    /// Resolve an optional channel argument against the configured list.
    fn resolve_channel<'a>(&'a self, channel: Option<&ChannelId>) -> AppResult<&'a ChannelId> {
        let channels = self.channels();
        match channel {
            None => channels.first().ok_or(MonitorError::NotConfigured),
            Some(wanted) => channels
                .iter()
                .find(|c| *c == wanted)
                .ok_or_else(|| MonitorError::ChannelNotConfigured(wanted.clone())),
        }
    }
}

/// Which sampler variant to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SamplerMode {
    /// Driver-backed reads.
    Hardware,
    /// Random values, no hardware access.
    #[default]
    Synthetic,
}

/// Construction parameters shared by both sampler variants.
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Ordered, non-empty channel list
    pub channels: Vec<ChannelId>,
    /// Limit assignment
    pub limits: ChannelLimits,
    /// Reset the device before first use (hardware only)
    pub reset: bool,
    /// Variant selection
    pub mode: SamplerMode,
    /// Single-read timeout (hardware only)
    pub read_timeout: Duration,
    /// Seed for reproducible synthetic values
    pub seed: Option<u64>,
}

impl SamplerConfig {
    /// Synthetic configuration for `channels` with default limits.
    pub fn synthetic<I, C>(channels: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<ChannelId>,
    {
        Self {
            channels: channels.into_iter().map(Into::into).collect(),
            limits: ChannelLimits::Default,
            reset: false,
            mode: SamplerMode::Synthetic,
            read_timeout: DEFAULT_READ_TIMEOUT,
            seed: None,
        }
    }

    /// Hardware configuration for `channels` with default limits.
    pub fn hardware<I, C>(channels: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<ChannelId>,
    {
        Self {
            mode: SamplerMode::Hardware,
            ..Self::synthetic(channels)
        }
    }

    /// Override the limit assignment.
    pub fn with_limits(mut self, limits: ChannelLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Request a device reset before use.
    pub fn with_reset(mut self, reset: bool) -> Self {
        self.reset = reset;
        self
    }

    /// Override the single-read timeout.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Seed the synthetic generator.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Build the sampler variant selected by `config.mode`.
///
/// Hardware mode needs a driver; synthetic mode ignores it. The returned
/// sampler is not configured yet.
pub fn build_sampler(
    config: &SamplerConfig,
    driver: Option<Arc<dyn DaqDriver>>,
) -> AppResult<Arc<dyn Sampler>> {
    match config.mode {
        SamplerMode::Synthetic => {
            if config.channels.is_empty() {
                return Err(MonitorError::Configuration(
                    "at least one channel must be configured".to_string(),
                ));
            }
            Ok(Arc::new(SyntheticSampler::new(config)))
        }
        SamplerMode::Hardware => {
            let driver = driver.ok_or_else(|| {
                MonitorError::Configuration(
                    "hardware mode requires a data-acquisition driver".to_string(),
                )
            })?;
            Ok(Arc::new(HardwareSampler::new(config, driver)?))
        }
    }
}
