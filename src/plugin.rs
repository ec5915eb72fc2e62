//! Host plugin: wires configuration, sampler, gate and poller together.
//!
//! Lifecycle:
//!
//! 1. [`MonitorPlugin::activate`] builds and configures the sampler. A
//!    `DeviceUnavailable` error aborts activation; the host keeps running.
//! 2. [`MonitorPlugin::start`] spawns the poller on the current runtime.
//! 3. The host calls [`RunLifecycle::on_run_starting`] /
//!    [`RunLifecycle::on_run_finished`] around every experiment run.
//! 4. [`MonitorPlugin::close`] stops the poller and releases the hardware.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::channel::ChannelId;
use crate::config::MonitorConfig;
use crate::display::{DisplayBoard, DisplaySink};
use crate::driver::DaqDriver;
use crate::error::{AppResult, MonitorError};
use crate::gate::{MeasurementGate, RunLifecycle};
use crate::poller::Poller;
use crate::sampler::{build_sampler, Sampler, SamplerMode};

/// Name under which the plugin registers with the host.
pub const PLUGIN_NAME: &str = "Monitor";

/// Device name shown for synthetic sampling.
pub const SYNTHETIC_DEVICE_NAME: &str = "Mock";

/// Hooks the host application calls besides the run lifecycle.
pub trait HostPlugin: RunLifecycle {
    /// Display name of the plugin.
    fn name(&self) -> &str;

    /// State to persist across host restarts. The monitor keeps none.
    fn saved_state(&self) -> Map<String, Value> {
        Map::new()
    }

    /// Called from the host main loop. The monitor has nothing to do here.
    fn mainloop_tick(&self) {}
}

/// Analog input monitor plugin.
pub struct MonitorPlugin {
    sampler: Arc<dyn Sampler>,
    gate: MeasurementGate,
    device_name: String,
    order: Vec<ChannelId>,
    interval: std::time::Duration,
    shutdown: watch::Sender<bool>,
    runner: Mutex<Option<JoinHandle<u64>>>,
    closed: AtomicBool,
}

impl MonitorPlugin {
    /// Validate `config`, then build and configure the sampler.
    ///
    /// `driver` is only used in hardware mode.
    pub async fn activate(config: &MonitorConfig, driver: Option<Arc<dyn DaqDriver>>) -> AppResult<Self> {
        config.validate()?;
        let sampler_config = config.sampler_config();

        let sampler = build_sampler(&sampler_config, driver).inspect_err(|e| {
            error!(error = %e, "Monitor plugin activation failed");
        })?;
        if let Err(e) = sampler.configure().await {
            error!(error = %e, "Monitor plugin activation failed");
            return Err(e);
        }

        let device_name = match sampler_config.mode {
            SamplerMode::Synthetic => SYNTHETIC_DEVICE_NAME.to_string(),
            SamplerMode::Hardware => sampler.channels()[0].device().to_string(),
        };
        info!(device = %device_name, channels = sampler.channels().len(), "Monitor plugin activated");

        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            sampler,
            gate: MeasurementGate::new(),
            device_name,
            order: config.display_order(),
            interval: config.display.poll_interval,
            shutdown,
            runner: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }

    /// Device name for the panel header.
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// The gate driven by the lifecycle hooks.
    pub fn gate(&self) -> &MeasurementGate {
        &self.gate
    }

    /// The active sampler.
    pub fn sampler(&self) -> &Arc<dyn Sampler> {
        &self.sampler
    }

    /// Channels in display order.
    pub fn display_order(&self) -> &[ChannelId] {
        &self.order
    }

    /// Empty panel model matching the display order.
    pub fn display_board(&self) -> DisplayBoard {
        DisplayBoard::new(self.device_name.clone(), &self.order)
    }

    /// Poller bound to this plugin's sampler and gate.
    pub fn poller(&self, sink: Arc<dyn DisplaySink>) -> AppResult<Poller> {
        Poller::new(self.sampler.clone(), sink, self.gate.clone(), self.interval)
            .with_display_order(self.order.clone())
    }

    /// Spawn the poller. It runs until [`close`](Self::close), or for
    /// `max_ticks` ticks when given. A closed plugin cannot be restarted.
    pub async fn start(&self, sink: Arc<dyn DisplaySink>, max_ticks: Option<u64>) -> AppResult<()> {
        let mut runner = self.runner.lock().await;
        if self.closed.load(Ordering::Acquire) {
            return Err(MonitorError::Closed);
        }
        if runner.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Err(MonitorError::AlreadyRunning);
        }

        let poller = self.poller(sink)?.with_max_ticks(max_ticks);
        self.shutdown.send_replace(false);
        let shutdown = self.shutdown.subscribe();
        *runner = Some(tokio::spawn(async move { poller.run(shutdown).await }));
        Ok(())
    }

    /// True while the poller task is alive.
    pub async fn is_running(&self) -> bool {
        self.runner
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Wait for the poller task to end. Returns the ticks it fired, or
    /// `None` if no poller was running.
    pub async fn join(&self) -> Option<u64> {
        let mut runner = self.runner.lock().await;
        let handle = runner.as_mut()?;
        let ticks = match handle.await {
            Ok(ticks) => ticks,
            Err(e) => {
                error!(error = %e, "Poller task failed");
                0
            }
        };
        *runner = None;
        Some(ticks)
    }

    /// Stop the poller and release acquisition resources.
    pub async fn close(&self) -> AppResult<()> {
        self.closed.store(true, Ordering::Release);
        self.shutdown.send_replace(true);
        if let Some(ticks) = self.join().await {
            info!(ticks, "Poller joined");
        }
        self.sampler.release().await?;
        info!("Monitor plugin closed");
        Ok(())
    }
}

impl RunLifecycle for MonitorPlugin {
    fn on_run_starting(&self) {
        self.gate.on_run_starting();
    }

    fn on_run_finished(&self) {
        self.gate.on_run_finished();
    }
}

impl HostPlugin for MonitorPlugin {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }
}
