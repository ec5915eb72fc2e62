//! Fixed-interval poller.
//!
//! Every interval, while the [`MeasurementGate`] is enabled, the poller takes
//! one [`Snapshot`](crate::sampler::Snapshot) from the sampler and pushes the
//! formatted readings to the display sink in display order.
//!
//! # Tick semantics
//!
//! - Disabled gate: the tick does nothing, the sampler is not touched.
//! - Per-channel failures are logged and the slot keeps its previous text;
//!   the remaining channels are still updated and polling continues.
//! - Ticks are serialized: a tick runs to completion before the next one
//!   starts. Ticks missed while a slow read was in flight are skipped, not
//!   replayed.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::channel::ChannelId;
use crate::display::{format_reading, DisplaySink};
use crate::error::{AppResult, MonitorError};
use crate::gate::MeasurementGate;
use crate::sampler::Sampler;

/// Default poll interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// What a single tick did.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Gate disabled; nothing was read.
    Skipped,
    /// A snapshot was taken and applied.
    Sampled(TickReport),
}

/// Summary of an applied snapshot.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TickReport {
    /// Snapshot sequence number
    pub sequence: u64,
    /// Slots that received a new value
    pub updated: usize,
    /// Channels whose read failed, in display order
    pub failed: Vec<ChannelId>,
}

/// Recurring sampling task feeding a display sink.
pub struct Poller {
    sampler: Arc<dyn Sampler>,
    sink: Arc<dyn DisplaySink>,
    gate: MeasurementGate,
    interval: Duration,
    order: Vec<ChannelId>,
    max_ticks: Option<u64>,
}

impl Poller {
    /// Poller showing channels in configuration order.
    pub fn new(
        sampler: Arc<dyn Sampler>,
        sink: Arc<dyn DisplaySink>,
        gate: MeasurementGate,
        interval: Duration,
    ) -> Self {
        let order = sampler.channels().to_vec();
        Self {
            sampler,
            sink,
            gate,
            interval,
            order,
            max_ticks: None,
        }
    }

    /// Show channels in `order`, which must be a permutation of the sampler's channels.
    pub fn with_display_order(mut self, order: Vec<ChannelId>) -> AppResult<Self> {
        validate_display_order(self.sampler.channels(), &order)?;
        self.order = order;
        Ok(self)
    }

    /// Stop `run` after `ticks` interval ticks.
    pub fn with_max_ticks(mut self, ticks: Option<u64>) -> Self {
        self.max_ticks = ticks;
        self
    }

    /// Channels in display order; slot `i` shows `display_order()[i]`.
    pub fn display_order(&self) -> &[ChannelId] {
        &self.order
    }

    /// Run one tick.
    pub async fn tick(&self) -> TickOutcome {
        if !self.gate.is_enabled() {
            return TickOutcome::Skipped;
        }

        let snapshot = self.sampler.read_all().await;
        let mut report = TickReport {
            sequence: snapshot.sequence,
            ..TickReport::default()
        };

        for (slot, channel) in self.order.iter().enumerate() {
            match snapshot.get(channel) {
                Some(Ok(value)) => {
                    self.sink
                        .update(slot, channel, &format_reading(*value), snapshot.sequence);
                    report.updated += 1;
                }
                Some(Err(e)) if e.is_recoverable() => {
                    warn!(channel = %channel, error = %e, "Channel read failed; keeping previous value");
                    report.failed.push(channel.clone());
                }
                Some(Err(e)) => {
                    error!(channel = %channel, error = %e, "Sampler cannot read channel; keeping previous value");
                    report.failed.push(channel.clone());
                }
                None => {
                    warn!(channel = %channel, "Channel missing from snapshot");
                    report.failed.push(channel.clone());
                }
            }
        }

        debug!(
            sequence = report.sequence,
            taken_at = %snapshot.taken_at,
            updated = report.updated,
            failed = report.failed.len(),
            "Tick complete"
        );
        TickOutcome::Sampled(report)
    }

    /// Tick every interval until `shutdown` turns true (or its sender is
    /// dropped), or until the tick limit is reached. Returns the number of
    /// ticks fired.
    ///
    /// The first tick fires one interval after the call.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> u64 {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(interval = ?self.interval, channels = self.order.len(), "Poller started");
        let mut fired = 0u64;
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                    fired += 1;
                    if self.max_ticks.is_some_and(|max| fired >= max) {
                        break;
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        info!(ticks = fired, "Poller stopped");
        fired
    }
}

/// Check that `order` lists every configured channel exactly once.
pub fn validate_display_order(channels: &[ChannelId], order: &[ChannelId]) -> AppResult<()> {
    let configured: HashSet<&ChannelId> = channels.iter().collect();
    let mut seen = HashSet::with_capacity(order.len());
    for channel in order {
        if !configured.contains(channel) {
            return Err(MonitorError::Configuration(format!(
                "display order names unknown channel '{}'",
                channel
            )));
        }
        if !seen.insert(channel) {
            return Err(MonitorError::Configuration(format!(
                "display order lists '{}' more than once",
                channel
            )));
        }
    }
    if seen.len() != configured.len() {
        return Err(MonitorError::Configuration(format!(
            "display order has {} channels, expected {}",
            seen.len(),
            configured.len()
        )));
    }
    Ok(())
}
