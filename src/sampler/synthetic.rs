//! Synthetic sampler: uniform random readings without hardware.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{Sampler, SamplerConfig, SequenceCounter};
use crate::channel::{resolve_channels_lenient, ChannelId, VoltageRange};
use crate::error::AppResult;

/// Sampler returning values uniformly distributed in `[0, 1)`.
///
/// Construction never touches hardware and never fails; `configure` and
/// `release` are no-ops. Repeated channels are read once, and limits are
/// resolved leniently so the effective limit of every channel can still be
/// queried the same way as in hardware mode.
pub struct SyntheticSampler {
    channels: Vec<ChannelId>,
    limits: HashMap<ChannelId, VoltageRange>,
    rng: Mutex<StdRng>,
    sequence: SequenceCounter,
}

impl SyntheticSampler {
    /// Create a sampler for the channels in `config`.
    pub fn new(config: &SamplerConfig) -> Self {
        let resolved = resolve_channels_lenient(&config.channels, &config.limits);
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            channels: resolved.iter().map(|c| c.id.clone()).collect(),
            limits: resolved.into_iter().map(|c| (c.id, c.range)).collect(),
            rng: Mutex::new(rng),
            sequence: SequenceCounter::default(),
        }
    }
}

#[async_trait]
impl Sampler for SyntheticSampler {
    fn channels(&self) -> &[ChannelId] {
        &self.channels
    }

    fn limit(&self, channel: &ChannelId) -> Option<VoltageRange> {
        self.limits.get(channel).copied()
    }

    fn sequence(&self) -> &SequenceCounter {
        &self.sequence
    }

    async fn configure(&self) -> AppResult<()> {
        Ok(())
    }

    async fn read(&self, channel: Option<&ChannelId>) -> AppResult<f64> {
        self.resolve_channel(channel)?;
        Ok(self.rng.lock().gen::<f64>())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::channel::ChannelLimits;
    use crate::error::MonitorError;

    #[tokio::test]
    async fn read_all_returns_one_value_per_channel() {
        let sampler = SyntheticSampler::new(&SamplerConfig::synthetic(["A", "B", "C", "D"]));
        sampler.configure().await.unwrap();

        for _ in 0..50 {
            let snapshot = sampler.read_all().await;
            assert_eq!(snapshot.len(), 4);
            assert_eq!(snapshot.failures().count(), 0);
            for (_, value) in snapshot.values() {
                assert!((0.0..1.0).contains(&value), "value {} out of [0, 1)", value);
            }
        }
    }

    #[tokio::test]
    async fn unknown_channel_is_rejected() {
        let sampler = SyntheticSampler::new(&SamplerConfig::synthetic(["A"]));
        let err = sampler.read(Some(&ChannelId::from("B"))).await.unwrap_err();
        assert!(matches!(err, MonitorError::ChannelNotConfigured(ref c) if c.as_str() == "B"));
        assert_eq!(sampler.channels(), &[ChannelId::from("A")]);
    }

    #[tokio::test]
    async fn seeded_samplers_agree() {
        let config = SamplerConfig::synthetic(["A"]).with_seed(7);
        let first = SyntheticSampler::new(&config);
        let second = SyntheticSampler::new(&config);
        for _ in 0..5 {
            assert_eq!(first.read(None).await.unwrap(), second.read(None).await.unwrap());
        }
    }

    #[test]
    fn uniform_limit_is_reported_per_channel() {
        let range = VoltageRange::new(-1.0, 1.0);
        let sampler = SyntheticSampler::new(
            &SamplerConfig::synthetic(["A", "B"]).with_limits(ChannelLimits::Uniform(range)),
        );
        assert_eq!(sampler.limit(&ChannelId::from("A")), Some(range));
        assert_eq!(sampler.limit(&ChannelId::from("B")), Some(range));
        assert_eq!(sampler.limit(&ChannelId::from("C")), None);
    }

    #[tokio::test]
    async fn construction_accepts_any_non_empty_channel_list() {
        let channel_lists: [&[&str]; 4] = [&["A"], &["A", "A"], &["A", "B", "A", "B"], &["", "A", ""]];
        let limit_choices = [
            ChannelLimits::Default,
            ChannelLimits::Uniform(VoltageRange::new(5.0, -5.0)),
            ChannelLimits::Uniform(VoltageRange::new(f64::NAN, 1.0)),
            ChannelLimits::PerChannel(vec![]),
            ChannelLimits::PerChannel(vec![VoltageRange::new(-1.0, 1.0); 9]),
        ];

        for names in channel_lists {
            for limits in &limit_choices {
                let config = SamplerConfig::synthetic(names.iter().copied()).with_limits(limits.clone());
                let sampler = SyntheticSampler::new(&config);

                let unique: HashSet<_> = names.iter().collect();
                assert_eq!(sampler.channels().len(), unique.len(), "{:?} / {:?}", names, limits);
                assert_eq!(sampler.channels()[0].as_str(), names[0]);

                let snapshot = sampler.read_all().await;
                assert_eq!(snapshot.failures().count(), 0);
                for channel in sampler.channels() {
                    let range = sampler.limit(channel).unwrap();
                    assert!(range.validate().is_ok(), "{:?} / {:?}", names, limits);
                }
            }
        }
    }
}
