// Quality grading - end-of-session confidence
//
// Distinct from the stabilizer's live "reliable" flag. Combines a
// signal-quality score (normalized deviation of the conditioned tail: too
// flat means poor contact, too noisy means motion, a mid band is optimal)
// with an interval-consistency score into a three-tier label via a simple
// averaged threshold rule.

use serde::{Deserialize, Serialize};

use crate::config::QualityConfig;

/// Confidence tier attached to estimates and session results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Good,
    Low,
}

/// QualityGrader scores signal quality and interval consistency
#[derive(Debug, Clone)]
pub struct QualityGrader {
    config: QualityConfig,
}

impl QualityGrader {
    pub fn new(config: QualityConfig) -> Self {
        Self { config }
    }

    /// Grade a finished measurement.
    ///
    /// # Arguments
    /// * `conditioned_tail` - conditioned signal over the last ~2 seconds
    /// * `raw_mean` - mean raw intensity over the same span (normalization)
    /// * `intervals` - filtered beat-to-beat intervals in samples
    pub fn grade(&self, conditioned_tail: &[f32], raw_mean: f32, intervals: &[i32]) -> Confidence {
        let signal = self.signal_quality(conditioned_tail, raw_mean);
        let consistency = self.interval_consistency(intervals);
        let score = (signal + consistency) / 2.0;

        tracing::debug!(
            "[Quality] signal {:.2}, consistency {:.2}, score {:.2}",
            signal,
            consistency,
            score
        );

        if score >= self.config.high_score {
            Confidence::High
        } else if score >= self.config.good_score {
            Confidence::Good
        } else {
            Confidence::Low
        }
    }

    /// Score in [0, 1] from the normalized standard deviation of the
    /// conditioned tail. The conditioned signal is zero-mean, so it is
    /// normalized against the raw brightness level it rode on.
    fn signal_quality(&self, conditioned_tail: &[f32], raw_mean: f32) -> f32 {
        if conditioned_tail.len() < 4 || raw_mean.abs() < f32::EPSILON {
            return 0.2;
        }

        let mean =
            conditioned_tail.iter().sum::<f32>() / conditioned_tail.len() as f32;
        let variance = conditioned_tail
            .iter()
            .map(|v| {
                let d = v - mean;
                d * d
            })
            .sum::<f32>()
            / conditioned_tail.len() as f32;
        let normalized = variance.sqrt() / raw_mean.abs();

        if normalized < self.config.flat_deviation {
            // Barely any modulation: poor contact.
            0.2
        } else if normalized >= self.config.optimal_low
            && normalized <= self.config.optimal_high
        {
            1.0
        } else if normalized > self.config.noisy_deviation {
            // Large swings: motion artifacts.
            0.2
        } else {
            0.6
        }
    }

    /// Score in [0, 1] from the relative deviation of the intervals.
    fn interval_consistency(&self, intervals: &[i32]) -> f32 {
        if intervals.len() < 2 {
            return 0.3;
        }

        let mean = intervals.iter().sum::<i32>() as f32 / intervals.len() as f32;
        if mean <= 0.0 {
            return 0.3;
        }
        let variance = intervals
            .iter()
            .map(|&v| {
                let d = v as f32 - mean;
                d * d
            })
            .sum::<f32>()
            / intervals.len() as f32;
        let relative = variance.sqrt() / mean;

        if relative <= self.config.interval_tight {
            1.0
        } else if relative <= self.config.interval_loose {
            0.6
        } else {
            0.2
        }
    }
}
