//! Channel identifiers and per-channel voltage limits.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AppResult, MonitorError};

/// Default input range applied when no limit is configured.
pub const DEFAULT_RANGE: VoltageRange = VoltageRange {
    low: -10.0,
    high: 10.0,
};

/// Name of one physical analog input line, e.g. `"Dev2/ai0"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    /// Create a channel identifier.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The raw identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Device part of the identifier (everything before the first `/`).
    pub fn device(&self) -> &str {
        self.0.split('/').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for ChannelId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Low/high voltage bound of an input channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoltageRange {
    /// Lower bound in volts
    pub low: f64,
    /// Upper bound in volts
    pub high: f64,
}

impl VoltageRange {
    /// Create a range; no validation is done here, see [`VoltageRange::validate`].
    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    /// Reject non-finite or inverted bounds.
    pub fn validate(&self) -> AppResult<()> {
        if !self.low.is_finite() || !self.high.is_finite() {
            return Err(MonitorError::Configuration(format!(
                "voltage range bounds must be finite, got ({}, {})",
                self.low, self.high
            )));
        }
        if self.low >= self.high {
            return Err(MonitorError::Configuration(format!(
                "voltage range low bound {} must be below high bound {}",
                self.low, self.high
            )));
        }
        Ok(())
    }
}

impl Default for VoltageRange {
    fn default() -> Self {
        DEFAULT_RANGE
    }
}

impl From<(f64, f64)> for VoltageRange {
    fn from((low, high): (f64, f64)) -> Self {
        Self { low, high }
    }
}

/// How limits are assigned to the configured channels.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelLimits {
    /// Every channel uses [`DEFAULT_RANGE`].
    #[default]
    Default,
    /// Every channel uses the same range.
    Uniform(VoltageRange),
    /// Channel `i` uses entry `i`; the list length must match the channel count.
    PerChannel(Vec<VoltageRange>),
}

impl ChannelLimits {
    /// Resolve the effective range of each channel, in channel order.
    pub fn resolve(&self, channel_count: usize) -> AppResult<Vec<VoltageRange>> {
        let ranges = match self {
            ChannelLimits::Default => vec![DEFAULT_RANGE; channel_count],
            ChannelLimits::Uniform(range) => vec![*range; channel_count],
            ChannelLimits::PerChannel(ranges) => {
                if ranges.len() != channel_count {
                    return Err(MonitorError::Configuration(format!(
                        "{} per-channel limits given for {} channels",
                        ranges.len(),
                        channel_count
                    )));
                }
                ranges.clone()
            }
        };
        for range in &ranges {
            range.validate()?;
        }
        Ok(ranges)
    }

    /// Range of the channel at `index`, falling back to [`DEFAULT_RANGE`]
    /// when the entry is missing or malformed.
    pub fn range_at(&self, index: usize) -> VoltageRange {
        let range = match self {
            ChannelLimits::Default => DEFAULT_RANGE,
            ChannelLimits::Uniform(range) => *range,
            ChannelLimits::PerChannel(ranges) => ranges.get(index).copied().unwrap_or(DEFAULT_RANGE),
        };
        if range.validate().is_ok() {
            range
        } else {
            DEFAULT_RANGE
        }
    }
}

/// A channel together with its effective limit.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelConfig {
    /// Physical channel
    pub id: ChannelId,
    /// Effective input range
    pub range: VoltageRange,
}

/// Pair each channel with its limit after checking the list is usable.
///
/// The list must be non-empty and free of duplicates.
pub fn resolve_channels(channels: &[ChannelId], limits: &ChannelLimits) -> AppResult<Vec<ChannelConfig>> {
    if channels.is_empty() {
        return Err(MonitorError::Configuration(
            "at least one channel must be configured".to_string(),
        ));
    }

    let mut seen = HashSet::with_capacity(channels.len());
    for channel in channels {
        if channel.as_str().is_empty() {
            return Err(MonitorError::Configuration(
                "channel identifiers must not be empty".to_string(),
            ));
        }
        if !seen.insert(channel) {
            return Err(MonitorError::Configuration(format!(
                "channel '{}' is listed more than once",
                channel
            )));
        }
    }

    let ranges = limits.resolve(channels.len())?;
    Ok(channels
        .iter()
        .cloned()
        .zip(ranges)
        .map(|(id, range)| ChannelConfig { id, range })
        .collect())
}

/// Pair each channel with a usable limit without rejecting anything.
///
/// Repeated identifiers keep their first position; limits that are missing or
/// malformed resolve to [`DEFAULT_RANGE`].
pub fn resolve_channels_lenient(channels: &[ChannelId], limits: &ChannelLimits) -> Vec<ChannelConfig> {
    let mut seen = HashSet::with_capacity(channels.len());
    channels
        .iter()
        .enumerate()
        .filter(|(_, id)| seen.insert(*id))
        .map(|(index, id)| ChannelConfig {
            id: id.clone(),
            range: limits.range_at(index),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<ChannelId> {
        names.iter().map(|n| ChannelId::from(*n)).collect()
    }

    #[test]
    fn device_is_prefix_before_slash() {
        assert_eq!(ChannelId::from("Dev2/ai3").device(), "Dev2");
        assert_eq!(ChannelId::from("ai0").device(), "ai0");
    }

    #[test]
    fn default_limits_apply_to_every_channel() {
        let resolved = resolve_channels(&ids(&["A", "B"]), &ChannelLimits::Default).unwrap();
        assert!(resolved.iter().all(|c| c.range == DEFAULT_RANGE));
    }

    #[test]
    fn uniform_limit_applies_to_every_channel() {
        let range = VoltageRange::new(-5.0, 5.0);
        let resolved =
            resolve_channels(&ids(&["A", "B", "C"]), &ChannelLimits::Uniform(range)).unwrap();
        assert_eq!(resolved.len(), 3);
        assert!(resolved.iter().all(|c| c.range == range));
    }

    #[test]
    fn per_channel_limits_preserve_order() {
        let ranges = vec![
            VoltageRange::new(-1.0, 1.0),
            VoltageRange::new(-2.0, 2.0),
            VoltageRange::new(0.0, 5.0),
        ];
        let resolved = resolve_channels(
            &ids(&["A", "B", "C"]),
            &ChannelLimits::PerChannel(ranges.clone()),
        )
        .unwrap();
        for (i, channel) in resolved.iter().enumerate() {
            assert_eq!(channel.range, ranges[i]);
        }
        assert_eq!(resolved[2].id, ChannelId::from("C"));
    }

    #[test]
    fn per_channel_length_mismatch_is_rejected() {
        let err = resolve_channels(
            &ids(&["A", "B"]),
            &ChannelLimits::PerChannel(vec![VoltageRange::new(-1.0, 1.0)]),
        )
        .unwrap_err();
        assert!(matches!(err, MonitorError::Configuration(_)));
    }

    #[test]
    fn empty_and_duplicate_channel_lists_are_rejected() {
        assert!(resolve_channels(&[], &ChannelLimits::Default).is_err());
        assert!(resolve_channels(&ids(&["A", "A"]), &ChannelLimits::Default).is_err());
    }

    #[test]
    fn lenient_resolution_dedupes_and_falls_back() {
        let limits = ChannelLimits::PerChannel(vec![
            VoltageRange::new(-1.0, 1.0),
            VoltageRange::new(-2.0, 2.0),
            VoltageRange::new(3.0, -3.0),
        ]);
        let resolved = resolve_channels_lenient(&ids(&["A", "A", "B", "C"]), &limits);

        let names: Vec<_> = resolved.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(names, ["A", "B", "C"]);
        assert_eq!(resolved[0].range, VoltageRange::new(-1.0, 1.0));
        // "B" sat at index 2, whose entry is inverted; "C" has no entry at all
        assert_eq!(resolved[1].range, DEFAULT_RANGE);
        assert_eq!(resolved[2].range, DEFAULT_RANGE);
    }

    #[test]
    fn inverted_range_is_rejected() {
        let err = VoltageRange::new(5.0, -5.0).validate().unwrap_err();
        assert!(err.to_string().contains("must be below"));
        assert!(VoltageRange::new(f64::NAN, 1.0).validate().is_err());
    }
}
