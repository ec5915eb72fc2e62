//! Measurement gate: the enabled/disabled switch driven by run lifecycle.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::info;

/// Whether the poller may sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasurementState {
    /// Ticks sample and update the display.
    Enabled,
    /// Ticks do nothing.
    Disabled,
}

impl fmt::Display for MeasurementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enabled => write!(f, "enabled"),
            Self::Disabled => write!(f, "disabled"),
        }
    }
}

/// Host hooks marking the start and end of an experiment run.
pub trait RunLifecycle: Send + Sync {
    /// A run is about to start; stop sampling.
    fn on_run_starting(&self);

    /// A run has completed; resume sampling.
    fn on_run_finished(&self);
}

/// Shared two-state flag. Starts enabled; cloning shares the same state.
///
/// The only way to change it is through the two [`RunLifecycle`]
/// transitions, both idempotent.
#[derive(Debug, Clone)]
pub struct MeasurementGate {
    enabled: Arc<AtomicBool>,
}

impl Default for MeasurementGate {
    fn default() -> Self {
        Self::new()
    }
}

impl MeasurementGate {
    /// New gate in the `Enabled` state.
    pub fn new() -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Current state.
    pub fn state(&self) -> MeasurementState {
        if self.is_enabled() {
            MeasurementState::Enabled
        } else {
            MeasurementState::Disabled
        }
    }

    /// True while sampling is allowed.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    fn transition(&self, enabled: bool) {
        let previous = self.enabled.swap(enabled, Ordering::AcqRel);
        if previous != enabled {
            info!(state = %self.state(), "Measurement state changed");
        }
    }
}

impl RunLifecycle for MeasurementGate {
    fn on_run_starting(&self) {
        self.transition(false);
    }

    fn on_run_finished(&self) {
        self.transition(true);
    }
}
