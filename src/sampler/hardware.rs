//! Driver-backed sampler.
//!
//! Opens one acquisition task per channel in [`Sampler::configure`]. Each
//! read starts the channel's task, waits for a single sample (bounded by the
//! read timeout), then stops the task again. Driver calls run on Tokio's
//! blocking pool.
//!
//! Tasks are cleared by [`Sampler::release`], or on drop if the sampler is
//! discarded without an explicit release.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{Sampler, SamplerConfig, SequenceCounter};
use crate::channel::{resolve_channels, ChannelConfig, ChannelId, VoltageRange};
use crate::driver::{DaqDriver, DriverError, TaskHandle};
use crate::error::{AppResult, MonitorError};

type TaskMap = HashMap<ChannelId, TaskHandle>;

/// Slack on top of the read timeout before the sampler stops waiting for a
/// driver that overruns its own timeout.
pub const READ_TIMEOUT_GRACE: Duration = Duration::from_millis(250);

/// Sampler reading each channel through a [`DaqDriver`].
pub struct HardwareSampler {
    device: String,
    channels: Vec<ChannelConfig>,
    ids: Vec<ChannelId>,
    read_timeout: Duration,
    driver: Arc<dyn DaqDriver>,
    /// `None` until configured. Held for the duration of every driver call
    /// so reads, configure and release never interleave.
    tasks: Mutex<Option<TaskMap>>,
    sequence: SequenceCounter,
}

impl HardwareSampler {
    /// Resolve channels and limits, resetting the device first if requested.
    ///
    /// # Errors
    ///
    /// `Configuration` for an unusable channel list, `DeviceUnavailable` when
    /// the reset fails.
    pub fn new(config: &SamplerConfig, driver: Arc<dyn DaqDriver>) -> AppResult<Self> {
        let channels = resolve_channels(&config.channels, &config.limits)?;
        let device = channels[0].id.device().to_string();

        if config.reset {
            info!(device = %device, "Resetting data-acquisition device");
            driver
                .reset_device(&device)
                .map_err(|e| MonitorError::DeviceUnavailable {
                    device: device.clone(),
                    reason: e.to_string(),
                })?;
        }

        Ok(Self {
            device,
            ids: channels.iter().map(|c| c.id.clone()).collect(),
            channels,
            read_timeout: config.read_timeout,
            driver,
            tasks: Mutex::new(None),
            sequence: SequenceCounter::default(),
        })
    }

    /// True once `configure` has succeeded and until `release`.
    pub async fn is_configured(&self) -> bool {
        self.tasks.lock().await.is_some()
    }
}

/// Open one task per channel; on failure clear everything opened so far.
fn open_tasks(driver: &dyn DaqDriver, device: &str, channels: &[ChannelConfig]) -> AppResult<TaskMap> {
    let mut opened = TaskMap::with_capacity(channels.len());
    for channel in channels {
        let result = driver.create_task().and_then(|task| {
            match driver.create_voltage_channel(task, &channel.id, channel.range) {
                Ok(()) => Ok(task),
                Err(e) => {
                    if let Err(clear) = driver.clear_task(task) {
                        warn!(channel = %channel.id, %task, error = %clear, "Failed to clear acquisition task");
                    }
                    Err(e)
                }
            }
        });

        match result {
            Ok(task) => {
                debug!(channel = %channel.id, %task, "Opened acquisition task");
                opened.insert(channel.id.clone(), task);
            }
            Err(e) => {
                clear_tasks(driver, opened);
                return Err(MonitorError::DeviceUnavailable {
                    device: device.to_string(),
                    reason: format!("cannot open channel '{}': {}", channel.id, e),
                });
            }
        }
    }
    Ok(opened)
}

fn clear_tasks(driver: &dyn DaqDriver, tasks: TaskMap) {
    for (channel, task) in tasks {
        if let Err(e) = driver.clear_task(task) {
            warn!(channel = %channel, %task, error = %e, "Failed to clear acquisition task");
        }
    }
}

/// Start, read one sample, stop. Stop is attempted even when the read fails.
fn read_once(driver: &dyn DaqDriver, task: TaskHandle, timeout: Duration) -> Result<f64, DriverError> {
    driver.start_task(task)?;
    let value = driver.read_scalar(task, timeout);
    if let Err(e) = driver.stop_task(task) {
        warn!(%task, error = %e, "Failed to stop acquisition task");
    }
    value
}

#[async_trait]
impl Sampler for HardwareSampler {
    fn channels(&self) -> &[ChannelId] {
        &self.ids
    }

    fn limit(&self, channel: &ChannelId) -> Option<VoltageRange> {
        self.channels
            .iter()
            .find(|c| &c.id == channel)
            .map(|c| c.range)
    }

    fn sequence(&self) -> &SequenceCounter {
        &self.sequence
    }

    async fn configure(&self) -> AppResult<()> {
        let mut tasks = self.tasks.lock().await;
        if tasks.is_some() {
            debug!(device = %self.device, "Sampler already configured");
            return Ok(());
        }

        let driver = self.driver.clone();
        let device = self.device.clone();
        let channels = self.channels.clone();
        let opened = tokio::task::spawn_blocking(move || open_tasks(driver.as_ref(), &device, &channels))
            .await
            .map_err(|e| MonitorError::DeviceUnavailable {
                device: self.device.clone(),
                reason: format!("configure task failed: {}", e),
            })??;

        info!(device = %self.device, channels = opened.len(), "Analog input channels configured");
        *tasks = Some(opened);
        Ok(())
    }

    async fn read(&self, channel: Option<&ChannelId>) -> AppResult<f64> {
        let channel = self.resolve_channel(channel)?.clone();

        let tasks = self.tasks.lock().await;
        let task = *tasks
            .as_ref()
            .ok_or(MonitorError::NotConfigured)?
            .get(&channel)
            .ok_or_else(|| MonitorError::ChannelNotConfigured(channel.clone()))?;

        let driver = self.driver.clone();
        let timeout = self.read_timeout;
        let blocking = tokio::task::spawn_blocking(move || read_once(driver.as_ref(), task, timeout));
        // An overrunning read is abandoned, not cancelled; its thread finishes in the background.
        let outcome = tokio::time::timeout(timeout + READ_TIMEOUT_GRACE, blocking).await;
        drop(tasks);

        match outcome {
            Err(_) => {
                warn!(channel = %channel, ?timeout, "Driver overran its read timeout");
                Err(MonitorError::ReadTimeout { channel, timeout })
            }
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(DriverError::Timeout))) => Err(MonitorError::ReadTimeout { channel, timeout }),
            Ok(Ok(Err(DriverError::Device(reason)))) => Err(MonitorError::Driver { channel, reason }),
            Ok(Err(e)) => Err(MonitorError::Driver {
                channel,
                reason: format!("read task failed: {}", e),
            }),
        }
    }

    async fn release(&self) -> AppResult<()> {
        let Some(opened) = self.tasks.lock().await.take() else {
            return Ok(());
        };
        let count = opened.len();
        let driver = self.driver.clone();
        tokio::task::spawn_blocking(move || clear_tasks(driver.as_ref(), opened))
            .await
            .map_err(|e| MonitorError::DeviceUnavailable {
                device: self.device.clone(),
                reason: format!("release task failed: {}", e),
            })?;
        info!(device = %self.device, tasks = count, "Acquisition tasks released");
        Ok(())
    }
}

impl Drop for HardwareSampler {
    fn drop(&mut self) {
        if let Some(opened) = self.tasks.get_mut().take() {
            debug!(device = %self.device, "Clearing acquisition tasks on drop");
            clear_tasks(self.driver.as_ref(), opened);
        }
    }
}
