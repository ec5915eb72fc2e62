//! Hardware driver boundary.
//!
//! [`DaqDriver`] lists the primitives the hardware sampler needs from a
//! vendor data-acquisition library: device reset, one task per channel,
//! start/read/stop of a single scalar sample, and task teardown. Any library
//! exposing equivalent calls can be wrapped behind it.
//!
//! Driver calls are blocking. The hardware sampler runs them on Tokio's
//! blocking pool so a slow read never stalls the async runtime.

pub mod mock;

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::channel::{ChannelId, VoltageRange};

pub use mock::MockDriver;

/// Opaque handle to an acquisition task owned by a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle(pub u64);

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Errors reported by a driver call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriverError {
    #[error("read timed out")]
    Timeout,

    #[error("{0}")]
    Device(String),
}

/// Blocking vendor primitives used by the hardware sampler.
pub trait DaqDriver: Send + Sync {
    /// Reset the named device to its power-on state.
    fn reset_device(&self, device: &str) -> Result<(), DriverError>;

    /// Allocate an empty acquisition task.
    fn create_task(&self) -> Result<TaskHandle, DriverError>;

    /// Attach an analog voltage input channel to `task`.
    fn create_voltage_channel(
        &self,
        task: TaskHandle,
        channel: &ChannelId,
        range: VoltageRange,
    ) -> Result<(), DriverError>;

    /// Start acquisition on `task`.
    fn start_task(&self, task: TaskHandle) -> Result<(), DriverError>;

    /// Block until one sample is available or `timeout` elapses.
    fn read_scalar(&self, task: TaskHandle, timeout: Duration) -> Result<f64, DriverError>;

    /// Stop acquisition on `task`.
    fn stop_task(&self, task: TaskHandle) -> Result<(), DriverError>;

    /// Release every resource held by `task`. The handle is invalid afterwards.
    fn clear_task(&self, task: TaskHandle) -> Result<(), DriverError>;
}
