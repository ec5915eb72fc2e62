//! Common test utilities for daq-monitor integration tests
//!
//! This module provides reusable test helpers for:
//! - Counting `read_all` calls on any sampler
//! - Recording every display update
//! - Waiting for asynchronous conditions with environment-aware deadlines

#![allow(dead_code)] // Utilities may not all be used by every test binary

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use daq_monitor::sampler::SequenceCounter;
use daq_monitor::{AppResult, ChannelId, DisplaySink, Sampler, Snapshot, VoltageRange};

/// Sampler wrapper counting `read_all` calls.
pub struct CountingSampler {
    inner: Arc<dyn Sampler>,
    read_all_calls: AtomicUsize,
}

impl CountingSampler {
    pub fn new(inner: Arc<dyn Sampler>) -> Self {
        Self {
            inner,
            read_all_calls: AtomicUsize::new(0),
        }
    }

    pub fn read_all_calls(&self) -> usize {
        self.read_all_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Sampler for CountingSampler {
    fn channels(&self) -> &[ChannelId] {
        self.inner.channels()
    }

    fn limit(&self, channel: &ChannelId) -> Option<VoltageRange> {
        self.inner.limit(channel)
    }

    fn sequence(&self) -> &SequenceCounter {
        self.inner.sequence()
    }

    async fn configure(&self) -> AppResult<()> {
        self.inner.configure().await
    }

    async fn read(&self, channel: Option<&ChannelId>) -> AppResult<f64> {
        self.inner.read(channel).await
    }

    async fn release(&self) -> AppResult<()> {
        self.inner.release().await
    }

    async fn read_all(&self) -> Snapshot {
        self.read_all_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.read_all().await
    }
}

/// One recorded display update.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub slot: usize,
    pub channel: ChannelId,
    pub text: String,
    pub sequence: u64,
}

/// Sink keeping every update it receives.
#[derive(Default)]
pub struct RecordingSink {
    updates: Mutex<Vec<Update>>,
}

impl RecordingSink {
    pub fn updates(&self) -> Vec<Update> {
        self.updates.lock().clone()
    }

    pub fn updates_for(&self, channel: &str) -> Vec<Update> {
        self.updates
            .lock()
            .iter()
            .filter(|u| u.channel.as_str() == channel)
            .cloned()
            .collect()
    }
}

impl DisplaySink for RecordingSink {
    fn update(&self, slot: usize, channel: &ChannelId, text: &str, sequence: u64) {
        self.updates.lock().push(Update {
            slot,
            channel: channel.clone(),
            text: text.to_string(),
            sequence,
        });
    }
}

/// True if `text` is a decimal number with exactly three fractional digits.
pub fn is_three_decimal(text: &str) -> bool {
    let Some((whole, fraction)) = text.split_once('.') else {
        return false;
    };
    let whole = whole.strip_prefix('-').unwrap_or(whole);
    !whole.is_empty()
        && whole.chars().all(|c| c.is_ascii_digit())
        && fraction.len() == 3
        && fraction.chars().all(|c| c.is_ascii_digit())
}

/// Deadline for real-time waits; longer in CI where scheduling is noisy.
pub fn settle_timeout() -> Duration {
    if std::env::var("CI").is_ok() {
        Duration::from_secs(10)
    } else {
        Duration::from_secs(3)
    }
}

/// Poll `condition` every few milliseconds until it holds or `timeout` passes.
pub async fn wait_until<F>(mut condition: F, timeout: Duration) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[test]
fn three_decimal_check() {
    assert!(is_three_decimal("0.500"));
    assert!(is_three_decimal("-2.000"));
    assert!(!is_three_decimal("0.5"));
    assert!(!is_three_decimal("1.2345"));
    assert!(!is_three_decimal("abc"));
}
