//! Mock driver
//!
//! In-process [`DaqDriver`] for testing without physical hardware. Each
//! channel returns a fixed value, and failures can be injected per device or
//! per channel:
//!
//! - reset failure (device unavailable at startup)
//! - open failure for individual channels
//! - read timeouts for individual channels
//! - a fixed per-read latency; reads slower than their timeout report
//!   [`DriverError::Timeout`] once the timeout has elapsed
//! - task clear failures
//!
//! The driver keeps call counters and tracks open tasks so tests can verify
//! that tasks are started, stopped and cleared in pairs.
//!
//! # Example
//!
//! ```rust,ignore
//! let driver = MockDriver::new()
//!     .with_value("Dev2/ai0", 1.25)
//!     .with_timeout_on("Dev2/ai1");
//! ```

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use super::{DaqDriver, DriverError, TaskHandle};
use crate::channel::{ChannelId, VoltageRange};

#[derive(Debug)]
struct MockTask {
    channel: Option<ChannelId>,
    running: bool,
}

#[derive(Debug, Default)]
struct MockState {
    next_handle: u64,
    tasks: HashMap<TaskHandle, MockTask>,
    values: HashMap<ChannelId, f64>,
    timeouts: HashSet<ChannelId>,
    unopenable: HashSet<ChannelId>,
    reset_failure: Option<String>,
    clear_failure: Option<String>,
    read_delay: Duration,
    counters: MockCounters,
}

/// Call counters recorded by [`MockDriver`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockCounters {
    /// `reset_device` calls
    pub resets: usize,
    /// Tasks created
    pub created: usize,
    /// Tasks cleared
    pub cleared: usize,
    /// `start_task` calls
    pub starts: usize,
    /// `stop_task` calls
    pub stops: usize,
    /// `read_scalar` calls
    pub reads: usize,
}

/// Simulated data-acquisition device.
#[derive(Debug, Default)]
pub struct MockDriver {
    state: Mutex<MockState>,
}

impl MockDriver {
    /// Create a driver where every channel reads `0.0`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixed value returned for `channel`.
    pub fn with_value(self, channel: impl Into<ChannelId>, value: f64) -> Self {
        self.set_value(channel, value);
        self
    }

    /// Every read of `channel` reports a timeout.
    pub fn with_timeout_on(self, channel: impl Into<ChannelId>) -> Self {
        self.set_timeout(channel, true);
        self
    }

    /// Attaching `channel` to a task fails.
    pub fn with_open_failure(self, channel: impl Into<ChannelId>) -> Self {
        self.state.lock().unopenable.insert(channel.into());
        self
    }

    /// `reset_device` fails with `reason`.
    pub fn with_reset_failure(self, reason: impl Into<String>) -> Self {
        self.state.lock().reset_failure = Some(reason.into());
        self
    }

    /// `clear_task` fails with `reason` and leaves the task open.
    pub fn with_clear_failure(self, reason: impl Into<String>) -> Self {
        self.state.lock().clear_failure = Some(reason.into());
        self
    }

    /// Each read blocks the calling thread for `delay`, or for the read
    /// timeout if that is shorter.
    pub fn with_read_delay(self, delay: Duration) -> Self {
        self.state.lock().read_delay = delay;
        self
    }

    /// Change the value returned for `channel`.
    pub fn set_value(&self, channel: impl Into<ChannelId>, value: f64) {
        self.state.lock().values.insert(channel.into(), value);
    }

    /// Toggle simulated timeouts for `channel`.
    pub fn set_timeout(&self, channel: impl Into<ChannelId>, timing_out: bool) {
        let channel = channel.into();
        let mut state = self.state.lock();
        if timing_out {
            state.timeouts.insert(channel);
        } else {
            state.timeouts.remove(&channel);
        }
    }

    /// Snapshot of the call counters.
    pub fn counters(&self) -> MockCounters {
        self.state.lock().counters
    }

    /// Number of tasks created and not yet cleared.
    pub fn open_tasks(&self) -> usize {
        self.state.lock().tasks.len()
    }

    /// Number of tasks currently started.
    pub fn running_tasks(&self) -> usize {
        self.state.lock().tasks.values().filter(|t| t.running).count()
    }
}

impl DaqDriver for MockDriver {
    fn reset_device(&self, device: &str) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        state.counters.resets += 1;
        if let Some(reason) = &state.reset_failure {
            return Err(DriverError::Device(reason.clone()));
        }
        debug!(device, "MockDriver: device reset");
        Ok(())
    }

    fn create_task(&self) -> Result<TaskHandle, DriverError> {
        let mut state = self.state.lock();
        state.next_handle += 1;
        let handle = TaskHandle(state.next_handle);
        state.tasks.insert(
            handle,
            MockTask {
                channel: None,
                running: false,
            },
        );
        state.counters.created += 1;
        Ok(handle)
    }

    fn create_voltage_channel(
        &self,
        task: TaskHandle,
        channel: &ChannelId,
        range: VoltageRange,
    ) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        if state.unopenable.contains(channel) {
            return Err(DriverError::Device(format!(
                "physical channel '{}' does not exist",
                channel
            )));
        }
        let entry = state
            .tasks
            .get_mut(&task)
            .ok_or_else(|| DriverError::Device(format!("invalid {}", task)))?;
        entry.channel = Some(channel.clone());
        debug!(%task, %channel, low = range.low, high = range.high, "MockDriver: channel attached");
        Ok(())
    }

    fn start_task(&self, task: TaskHandle) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        state.counters.starts += 1;
        let entry = state
            .tasks
            .get_mut(&task)
            .ok_or_else(|| DriverError::Device(format!("invalid {}", task)))?;
        entry.running = true;
        Ok(())
    }

    fn read_scalar(&self, task: TaskHandle, timeout: Duration) -> Result<f64, DriverError> {
        let (value, delay) = {
            let mut state = self.state.lock();
            state.counters.reads += 1;
            let entry = state
                .tasks
                .get(&task)
                .ok_or_else(|| DriverError::Device(format!("invalid {}", task)))?;
            if !entry.running {
                return Err(DriverError::Device(format!("{} not started", task)));
            }
            let channel = entry
                .channel
                .clone()
                .ok_or_else(|| DriverError::Device(format!("{} has no channel", task)))?;
            if state.timeouts.contains(&channel) {
                return Err(DriverError::Timeout);
            }
            (
                state.values.get(&channel).copied().unwrap_or(0.0),
                state.read_delay,
            )
        };

        if delay > timeout {
            std::thread::sleep(timeout);
            return Err(DriverError::Timeout);
        }
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        Ok(value)
    }

    fn stop_task(&self, task: TaskHandle) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        state.counters.stops += 1;
        let entry = state
            .tasks
            .get_mut(&task)
            .ok_or_else(|| DriverError::Device(format!("invalid {}", task)))?;
        entry.running = false;
        Ok(())
    }

    fn clear_task(&self, task: TaskHandle) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        if let Some(reason) = &state.clear_failure {
            return Err(DriverError::Device(reason.clone()));
        }
        if state.tasks.remove(&task).is_none() {
            return Err(DriverError::Device(format!("invalid {}", task)));
        }
        state.counters.cleared += 1;
        Ok(())
    }
}
