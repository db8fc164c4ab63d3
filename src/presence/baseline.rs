// Calibration baseline - no-finger brightness statistics
//
// Before any contact detection runs, the detector learns what the sensor
// sees with no finger present. The baseline must be stable (low variance)
// and bright enough; an unstable accumulation is discarded wholesale, which
// handles a finger placed too early.

use serde::{Deserialize, Serialize};

/// Accepted no-finger brightness statistics for one session.
///
/// May be carried across consecutive sessions to skip recalibration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub mean: f32,
    pub std_dev: f32,
}

/// Result of feeding one sample to the accumulator
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BaselineOutcome {
    /// Still collecting samples
    Collecting,
    /// Baseline accepted
    Accepted(Baseline),
    /// Accumulated window was unstable or too dim; collection restarted
    Restarted,
}

/// Accumulates brightness samples until a stable baseline is established
#[derive(Debug)]
pub struct BaselineAccumulator {
    required: usize,
    max_std: f32,
    min_mean: f32,
    samples: Vec<f32>,
}

impl BaselineAccumulator {
    pub fn new(required: usize, max_std: f32, min_mean: f32) -> Self {
        Self {
            required: required.max(2),
            max_std,
            min_mean,
            samples: Vec::with_capacity(required),
        }
    }

    pub fn push(&mut self, value: f32) -> BaselineOutcome {
        self.samples.push(value);
        if self.samples.len() < self.required {
            return BaselineOutcome::Collecting;
        }

        let mean = self.samples.iter().sum::<f32>() / self.samples.len() as f32;
        let variance = self
            .samples
            .iter()
            .map(|v| {
                let d = v - mean;
                d * d
            })
            .sum::<f32>()
            / self.samples.len() as f32;
        let std_dev = variance.sqrt();

        self.samples.clear();

        if std_dev < self.max_std && mean > self.min_mean {
            BaselineOutcome::Accepted(Baseline { mean, std_dev })
        } else {
            tracing::debug!(
                "[Baseline] Rejected window (mean {:.1}, std {:.1}); restarting",
                mean,
                std_dev
            );
            BaselineOutcome::Restarted
        }
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_stable_bright_window() {
        let mut acc = BaselineAccumulator::new(10, 6.0, 40.0);
        let mut outcome = BaselineOutcome::Collecting;
        for i in 0..10 {
            outcome = acc.push(120.0 + (i % 2) as f32);
        }
        match outcome {
            BaselineOutcome::Accepted(baseline) => {
                assert!((baseline.mean - 120.5).abs() < 0.01);
                assert!(baseline.std_dev < 1.0);
            }
            other => panic!("expected acceptance, got {:?}", other),
        }
    }

    #[test]
    fn test_restarts_on_unstable_window() {
        let mut acc = BaselineAccumulator::new(10, 6.0, 40.0);
        let mut outcome = BaselineOutcome::Collecting;
        for i in 0..10 {
            // Large swings, e.g. a finger being placed mid-calibration.
            outcome = acc.push(if i < 5 { 120.0 } else { 220.0 });
        }
        assert_eq!(outcome, BaselineOutcome::Restarted);

        // A subsequent stable window is accepted from scratch.
        let mut outcome = BaselineOutcome::Collecting;
        for _ in 0..10 {
            outcome = acc.push(120.0);
        }
        assert!(matches!(outcome, BaselineOutcome::Accepted(_)));
    }

    #[test]
    fn test_restarts_on_dim_window() {
        let mut acc = BaselineAccumulator::new(10, 6.0, 40.0);
        let mut outcome = BaselineOutcome::Collecting;
        for _ in 0..10 {
            outcome = acc.push(10.0);
        }
        assert_eq!(outcome, BaselineOutcome::Restarted);
    }
}
