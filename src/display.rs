//! Display boundary.
//!
//! The poller pushes one formatted string per channel per tick through a
//! [`DisplaySink`]. Rendering is up to the sink: [`DisplayBoard`] keeps the
//! panel contents in memory for a host UI to draw, [`LogSink`] emits them as
//! tracing events for headless runs.

use parking_lot::RwLock;
use tracing::info;

use crate::channel::ChannelId;

/// Text shown in a slot before its first reading.
pub const PLACEHOLDER: &str = "---";

/// Format a reading with exactly three decimals (`0.5` -> `"0.500"`).
pub fn format_reading(value: f64) -> String {
    format!("{:.3}", value)
}

/// Receiver of per-channel display updates.
pub trait DisplaySink: Send + Sync {
    /// Show `text` in display slot `slot`, which belongs to `channel`.
    ///
    /// `sequence` is the snapshot the reading came from; it only grows.
    fn update(&self, slot: usize, channel: &ChannelId, text: &str, sequence: u64);
}

/// One labelled value cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    /// Caption, e.g. `"AI #0"`
    pub caption: String,
    /// Channel shown in the slot
    pub channel: ChannelId,
    /// Current text
    pub text: String,
    /// Snapshot that produced `text`; 0 before the first update
    pub sequence: u64,
}

/// In-memory model of the monitor panel.
///
/// Updates carrying an older sequence than the one already shown are
/// ignored, so a late snapshot never overwrites a newer value.
#[derive(Debug)]
pub struct DisplayBoard {
    device_name: String,
    slots: RwLock<Vec<Slot>>,
}

impl DisplayBoard {
    /// Board with one slot per channel, captioned `AI #0`, `AI #1`, ...
    pub fn new(device_name: impl Into<String>, channels: &[ChannelId]) -> Self {
        let slots = channels
            .iter()
            .enumerate()
            .map(|(i, channel)| Slot {
                caption: format!("AI #{}", i),
                channel: channel.clone(),
                text: PLACEHOLDER.to_string(),
                sequence: 0,
            })
            .collect();
        Self {
            device_name: device_name.into(),
            slots: RwLock::new(slots),
        }
    }

    /// Header text.
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Copy of every slot, in display order.
    pub fn slots(&self) -> Vec<Slot> {
        self.slots.read().clone()
    }

    /// Current text of slot `slot`.
    pub fn text(&self, slot: usize) -> Option<String> {
        self.slots.read().get(slot).map(|s| s.text.clone())
    }

    /// Current text shown for `channel`.
    pub fn text_for(&self, channel: &ChannelId) -> Option<String> {
        self.slots
            .read()
            .iter()
            .find(|s| &s.channel == channel)
            .map(|s| s.text.clone())
    }
}

impl DisplaySink for DisplayBoard {
    fn update(&self, slot: usize, channel: &ChannelId, text: &str, sequence: u64) {
        let mut slots = self.slots.write();
        let Some(cell) = slots.get_mut(slot) else {
            return;
        };
        if &cell.channel != channel || sequence < cell.sequence {
            return;
        }
        cell.text = text.to_string();
        cell.sequence = sequence;
    }
}

/// Sink that logs every update at `info` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DisplaySink for LogSink {
    fn update(&self, slot: usize, channel: &ChannelId, text: &str, sequence: u64) {
        info!(slot, channel = %channel, value = text, sequence, "AI reading");
    }
}
