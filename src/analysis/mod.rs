// Analysis module - signal-to-BPM detection pipeline
//
// This module owns the batch path from raw intensity samples to a raw BPM
// estimate: conditioning, peak detection, interval statistics, and the
// stabilizer that turns raw estimates into a display value. The realtime
// beat detector lives here too but runs independently of the batch path.
//
// Pipeline: SignalConditioner -> PeakIntervalEstimator -> BpmStabilizer

pub mod conditioner;
pub mod peaks;
pub mod quality;
pub mod realtime;
pub mod stabilizer;

use crate::config::{ConditioningConfig, PeakConfig};

pub use conditioner::SignalConditioner;
pub use peaks::PeakIntervalEstimator;
pub use quality::{Confidence, QualityGrader};
pub use realtime::RealtimeBeatDetector;
pub use stabilizer::{BpmEstimate, BpmStabilizer};

/// Output of one batch estimation pass over the accumulated session buffer.
///
/// Carries the intermediate products the session needs for quality grading
/// alongside the raw BPM itself.
#[derive(Debug, Clone)]
pub struct RawEstimate {
    /// Raw BPM from the median filtered interval, if enough intervals exist
    pub bpm: Option<i32>,
    /// Peaks found in the conditioned signal
    pub peak_count: usize,
    /// Intervals surviving plausibility filtering and outlier rejection
    pub intervals: Vec<i32>,
    /// The conditioned signal (same length as the input)
    pub conditioned: Vec<f32>,
    /// True when the estimate came from the relaxed fallback path
    pub relaxed: bool,
}

/// BatchEstimator composes the conditioning and peak-search stages.
///
/// On a noisy signal it degrades progressively: first the outlier-filtered
/// intervals, then the unfiltered ones with a lower count requirement,
/// before reporting no estimate at all.
#[derive(Debug, Clone)]
pub struct BatchEstimator {
    conditioner: SignalConditioner,
    peaks: PeakIntervalEstimator,
    min_intervals: usize,
    relaxed_min_intervals: usize,
}

impl BatchEstimator {
    pub fn new(conditioning: ConditioningConfig, peak_config: PeakConfig) -> Self {
        Self {
            conditioner: SignalConditioner::new(conditioning),
            peaks: PeakIntervalEstimator::new(peak_config.clone()),
            min_intervals: peak_config.min_intervals,
            relaxed_min_intervals: peak_config.relaxed_min_intervals,
        }
    }

    /// Run the full batch path over a raw sample buffer.
    pub fn estimate(&self, raw: &[f32], sample_rate: f32) -> RawEstimate {
        let conditioned = self.conditioner.condition(raw, sample_rate);
        let peak_set = self.peaks.find_peaks(&conditioned, sample_rate);
        let intervals = self.peaks.intervals(&peak_set, sample_rate);
        let filtered = self.peaks.reject_outliers(&intervals);

        let mut relaxed = false;
        let bpm = match self
            .peaks
            .bpm_from_intervals(&filtered, sample_rate, self.min_intervals)
        {
            Some(bpm) => Some(bpm),
            None => {
                // Relaxed fallback: fewer intervals, no outlier rejection.
                relaxed = true;
                let fallback = self.peaks.bpm_from_intervals(
                    &intervals,
                    sample_rate,
                    self.relaxed_min_intervals,
                );
                if fallback.is_some() {
                    tracing::debug!(
                        "[Batch] Relaxed fallback produced an estimate from {} intervals",
                        intervals.len()
                    );
                }
                fallback
            }
        };

        let intervals_out = if relaxed { intervals } else { filtered };
        RawEstimate {
            bpm,
            peak_count: peak_set.len(),
            intervals: intervals_out,
            conditioned,
            relaxed,
        }
    }
}
