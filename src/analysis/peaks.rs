// PeakIntervalEstimator - batch peak detection and interval statistics
//
// Finds heartbeat peaks in a conditioned signal and derives beat-to-beat
// intervals from them. All spacing thresholds are derived from the measured
// sample rate, never from an assumed frame rate.
//
// Peak acceptance:
// 1. Zero-mean the signal, compute its standard deviation
// 2. Accept index i only if value > k * stddev AND it strictly exceeds all
//    neighbors within a symmetric window
// 3. A candidate closer than the minimum spacing to the previous accepted
//    peak is dropped as noise; one farther than the maximum spacing is kept
//    (possibly-missed beat, a coarse reading beats none)

use crate::config::PeakConfig;

/// PeakIntervalEstimator finds peaks and converts them to intervals/BPM
#[derive(Debug, Clone)]
pub struct PeakIntervalEstimator {
    config: PeakConfig,
}

impl PeakIntervalEstimator {
    pub fn new(config: PeakConfig) -> Self {
        Self { config }
    }

    /// Find peak indices in a conditioned signal.
    ///
    /// Returns a strictly increasing index sequence. Empty when the signal
    /// is too short or has no variance.
    pub fn find_peaks(&self, signal: &[f32], sample_rate: f32) -> Vec<usize> {
        let n = self.config.neighborhood.max(1);
        if signal.len() < 2 * n + 1 {
            return Vec::new();
        }

        let mean = signal.iter().sum::<f32>() / signal.len() as f32;
        let variance = signal
            .iter()
            .map(|v| {
                let d = v - mean;
                d * d
            })
            .sum::<f32>()
            / signal.len() as f32;
        let std_dev = variance.sqrt();
        if std_dev <= f32::EPSILON {
            return Vec::new();
        }

        let amplitude_gate = self.config.amplitude_factor * std_dev;
        let min_spacing = self.min_spacing_samples(sample_rate);

        let mut peaks: Vec<usize> = Vec::new();
        for i in n..signal.len() - n {
            if signal[i] - mean <= amplitude_gate {
                continue;
            }

            // Strict local maximum across the whole neighborhood; ties lose,
            // which rejects plateaus and shallow wobbles.
            let is_max = (i - n..=i + n)
                .filter(|&j| j != i)
                .all(|j| signal[i] > signal[j]);
            if !is_max {
                continue;
            }

            if let Some(&last) = peaks.last() {
                if i - last < min_spacing {
                    tracing::debug!(
                        "[Peaks] Dropping candidate {} within {} samples of peak {}",
                        i,
                        min_spacing,
                        last
                    );
                    continue;
                }
            }

            peaks.push(i);
        }

        peaks
    }

    /// Consecutive index differences between accepted peaks, filtered to the
    /// physiologically plausible spacing band.
    pub fn intervals(&self, peaks: &[usize], sample_rate: f32) -> Vec<i32> {
        let min_spacing = self.min_spacing_samples(sample_rate) as i32;
        let max_spacing = self.max_spacing_samples(sample_rate) as i32;

        peaks
            .windows(2)
            .map(|pair| (pair[1] - pair[0]) as i32)
            .filter(|&d| d >= min_spacing && d <= max_spacing)
            .collect()
    }

    /// IQR outlier rejection: drop intervals outside
    /// [Q1 - 1.5*IQR, Q3 + 1.5*IQR]. Applied only when enough intervals
    /// exist; smaller sets are returned unchanged.
    pub fn reject_outliers(&self, intervals: &[i32]) -> Vec<i32> {
        if intervals.len() < 4 {
            return intervals.to_vec();
        }

        let mut sorted = intervals.to_vec();
        sorted.sort_unstable();

        let q1 = percentile(&sorted, 0.25);
        let q3 = percentile(&sorted, 0.75);
        let iqr = q3 - q1;
        let low = q1 - 1.5 * iqr;
        let high = q3 + 1.5 * iqr;

        let kept: Vec<i32> = intervals
            .iter()
            .copied()
            .filter(|&v| (v as f32) >= low && (v as f32) <= high)
            .collect();

        if kept.len() < intervals.len() {
            tracing::debug!(
                "[Peaks] IQR rejection dropped {} of {} intervals",
                intervals.len() - kept.len(),
                intervals.len()
            );
        }

        kept
    }

    /// Median-based BPM from filtered intervals.
    ///
    /// Returns `None` below `min_count` intervals; the caller is expected to
    /// fall back to a partial/low-confidence path rather than fail.
    pub fn bpm_from_intervals(
        &self,
        intervals: &[i32],
        sample_rate: f32,
        min_count: usize,
    ) -> Option<i32> {
        if intervals.len() < min_count.max(1) {
            return None;
        }

        let median = median_i32(intervals);
        if median <= 0.0 {
            return None;
        }

        Some((60.0 * sample_rate / median).round() as i32)
    }

    pub fn min_spacing_samples(&self, sample_rate: f32) -> usize {
        ((self.config.min_peak_spacing_s * sample_rate).round() as usize).max(1)
    }

    pub fn max_spacing_samples(&self, sample_rate: f32) -> usize {
        ((self.config.max_peak_spacing_s * sample_rate).round() as usize).max(2)
    }
}

/// Linear-interpolated percentile of a sorted slice.
fn percentile(sorted: &[i32], p: f32) -> f32 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = p * (sorted.len() - 1) as f32;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo] as f32
    } else {
        let frac = rank - lo as f32;
        sorted[lo] as f32 * (1.0 - frac) + sorted[hi] as f32 * frac
    }
}

fn median_i32(values: &[i32]) -> f32 {
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) as f32 / 2.0
    } else {
        sorted[mid] as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimator() -> PeakIntervalEstimator {
        PeakIntervalEstimator::new(PeakConfig::default())
    }

    /// Zero-mean sine at the given beat frequency.
    fn sine_signal(bpm: f32, sample_rate: f32, samples: usize) -> Vec<f32> {
        let freq = bpm / 60.0;
        (0..samples)
            .map(|i| {
                let t = i as f32 / sample_rate;
                (2.0 * std::f32::consts::PI * freq * t).sin()
            })
            .collect()
    }

    #[test]
    fn test_finds_peaks_in_clean_sine() {
        let rate = 30.0;
        let signal = sine_signal(72.0, rate, 300);
        let peaks = estimator().find_peaks(&signal, rate);

        // 10 seconds at 72 BPM = 12 cycles; edge cycles may be clipped.
        assert!(
            peaks.len() >= 10,
            "expected at least 10 peaks, found {}",
            peaks.len()
        );

        // Median interval should be close to one period (25 samples).
        let intervals = estimator().intervals(&peaks, rate);
        let median = median_i32(&intervals);
        assert!(
            (median - 25.0).abs() <= 2.0,
            "median interval {} not near 25",
            median
        );
    }

    #[test]
    fn test_no_peaks_in_flat_signal() {
        let signal = vec![0.0; 300];
        assert!(estimator().find_peaks(&signal, 30.0).is_empty());
    }

    #[test]
    fn test_no_peaks_in_short_signal() {
        let signal = vec![0.0, 1.0, 0.0];
        assert!(estimator().find_peaks(&signal, 30.0).is_empty());
    }

    #[test]
    fn test_min_spacing_drops_close_candidates() {
        let rate = 30.0;
        // Two sharp spikes 4 samples apart, well inside min spacing (~8).
        let mut signal = vec![0.0f32; 60];
        signal[20] = 10.0;
        signal[24] = 9.0;
        signal[45] = 10.0;

        let peaks = estimator().find_peaks(&signal, rate);
        assert_eq!(peaks, vec![20, 45], "close candidate should be dropped");
    }

    #[test]
    fn test_wide_spacing_still_accepted() {
        let rate = 30.0;
        // Peaks 70 samples apart (~2.3 s) exceed the maximum spacing but the
        // second peak must still be accepted.
        let mut signal = vec![0.0f32; 160];
        signal[20] = 10.0;
        signal[90] = 10.0;

        let peaks = estimator().find_peaks(&signal, rate);
        assert_eq!(peaks, vec![20, 90]);

        // The implausible interval is filtered out of the interval set.
        let intervals = estimator().intervals(&peaks, rate);
        assert!(intervals.is_empty());
    }

    #[test]
    fn test_interval_filtering_bounds() {
        let rate = 30.0;
        // min spacing 8, max spacing 60 at 30 Hz.
        let peaks = vec![0, 25, 50, 52, 140];
        let intervals = estimator().intervals(&peaks, rate);
        // 25 and 25 pass; 2 is below min; 88 is above max.
        assert_eq!(intervals, vec![25, 25]);
    }

    #[test]
    fn test_iqr_rejects_outlier() {
        let intervals = vec![25, 24, 26, 25, 25, 80];
        let kept = estimator().reject_outliers(&intervals);
        assert!(!kept.contains(&80));
        assert_eq!(kept.len(), 5);
    }

    #[test]
    fn test_iqr_skipped_for_small_sets() {
        let intervals = vec![25, 80, 24];
        let kept = estimator().reject_outliers(&intervals);
        assert_eq!(kept, intervals);
    }

    #[test]
    fn test_bpm_from_intervals() {
        let bpm = estimator().bpm_from_intervals(&[25, 25, 24, 26], 30.0, 3);
        assert_eq!(bpm, Some(72));
    }

    #[test]
    fn test_bpm_requires_minimum_count() {
        assert_eq!(estimator().bpm_from_intervals(&[25, 25], 30.0, 3), None);
        // The relaxed path accepts fewer.
        assert_eq!(estimator().bpm_from_intervals(&[25, 25], 30.0, 2), Some(72));
    }
}
