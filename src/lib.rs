//! Analog input monitor for a lab-control host.
//!
//! Samples a fixed set of analog input channels at a fixed interval and
//! pushes the latest readings to a display sink. Sampling pauses while the
//! host runs an experiment and resumes when the run completes.
//!
//! - [`sampler`]: hardware-backed and synthetic measurement sources
//! - [`driver`]: the vendor driver boundary and a mock implementation
//! - [`poller`]: the recurring tick that feeds the display
//! - [`gate`]: run-lifecycle driven enable/disable switch
//! - [`plugin`]: composition root implementing the host hooks

pub mod channel;
pub mod config;
pub mod display;
pub mod driver;
pub mod error;
pub mod gate;
pub mod plugin;
pub mod poller;
pub mod sampler;

pub use channel::{ChannelId, ChannelLimits, VoltageRange};
pub use config::MonitorConfig;
pub use display::{format_reading, DisplayBoard, DisplaySink, LogSink};
pub use error::{AppResult, MonitorError};
pub use gate::{MeasurementGate, MeasurementState, RunLifecycle};
pub use plugin::{HostPlugin, MonitorPlugin};
pub use poller::{Poller, TickOutcome, TickReport};
pub use sampler::{build_sampler, Sampler, SamplerConfig, SamplerMode, Snapshot};
