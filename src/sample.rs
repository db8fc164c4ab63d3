// Sample types - raw frame statistics and windowed buffers
//
// The acquisition layer (camera preview callbacks) pushes one Sample per
// frame. Frames arrive at a nominal but unreliable rate, so the real rate is
// measured from timestamp deltas by SampleRateTracker and fed into every
// rate-dependent threshold downstream.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::config::AcquisitionConfig;

/// One frame worth of fingertip statistics from the acquisition layer.
///
/// `value` is the derived intensity the detection pipeline operates on
/// (dominant-channel mean, observed on a 0-255 scale but conceptually
/// unbounded). `red`/`green` are per-frame channel means consulted only by
/// the finger-presence predicate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub value: f32,
    pub red: f32,
    pub green: f32,
    pub timestamp_ms: i64,
}

impl Sample {
    pub fn new(value: f32, red: f32, green: f32, timestamp_ms: i64) -> Self {
        Self {
            value,
            red,
            green,
            timestamp_ms,
        }
    }

    /// Build a sample from a single intensity, with channel means that pass
    /// the finger-like predicate. Used by fixtures and tests that only care
    /// about the pipeline value.
    pub fn from_value(value: f32, timestamp_ms: i64) -> Self {
        Self {
            value,
            red: value,
            green: value / 2.0,
            timestamp_ms,
        }
    }
}

/// Bounded ring buffer of recent intensity values.
///
/// Oldest entries are evicted once capacity is exceeded. Used by the
/// realtime beat detector (fixed small window) and the presence detector's
/// verification windows.
#[derive(Debug, Clone)]
pub struct SampleWindow {
    values: VecDeque<f32>,
    capacity: usize,
}

impl SampleWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, value: f32) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.values.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, index: usize) -> Option<f32> {
        self.values.get(index).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = f32> + '_ {
        self.values.iter().copied()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn mean(&self) -> f32 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<f32>() / self.values.len() as f32
    }

    pub fn std_dev(&self) -> f32 {
        if self.values.len() < 2 {
            return 0.0;
        }
        let mean = self.mean();
        let variance = self
            .values
            .iter()
            .map(|v| {
                let d = v - mean;
                d * d
            })
            .sum::<f32>()
            / self.values.len() as f32;
        variance.sqrt()
    }

    /// Coefficient of variation (std / |mean|), 0.0 for a near-zero mean.
    pub fn variation_coefficient(&self) -> f32 {
        let mean = self.mean();
        if mean.abs() < f32::EPSILON {
            return 0.0;
        }
        self.std_dev() / mean.abs()
    }

    /// Number of times the series crosses its own mean.
    ///
    /// A pulsatile window oscillates around its mean a handful of times;
    /// static or chaotic windows fall outside the expected crossing band.
    pub fn mean_crossings(&self) -> u32 {
        if self.values.len() < 2 {
            return 0;
        }
        let mean = self.mean();
        let mut crossings = 0;
        let mut prev_above = None;
        for &v in &self.values {
            let above = v >= mean;
            if let Some(p) = prev_above {
                if p != above {
                    crossings += 1;
                }
            }
            prev_above = Some(above);
        }
        crossings
    }
}

/// Measures the actual sample rate from frame timestamps.
///
/// Reports the configured nominal rate until a short warm-up has elapsed,
/// then frames/elapsed-seconds clamped to the configured bounds.
#[derive(Debug, Clone)]
pub struct SampleRateTracker {
    config: AcquisitionConfig,
    first_timestamp_ms: Option<i64>,
    last_timestamp_ms: i64,
    frame_count: u64,
}

impl SampleRateTracker {
    pub fn new(config: AcquisitionConfig) -> Self {
        Self {
            config,
            first_timestamp_ms: None,
            last_timestamp_ms: 0,
            frame_count: 0,
        }
    }

    pub fn record(&mut self, timestamp_ms: i64) {
        if self.first_timestamp_ms.is_none() {
            self.first_timestamp_ms = Some(timestamp_ms);
        }
        self.last_timestamp_ms = timestamp_ms;
        self.frame_count += 1;
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Measured rate in Hz, clamped to the configured bounds.
    pub fn rate(&self) -> f32 {
        let first = match self.first_timestamp_ms {
            Some(t) => t,
            None => return self.config.target_fps,
        };
        let elapsed_ms = self.last_timestamp_ms.saturating_sub(first);
        if elapsed_ms < self.config.warmup_ms || self.frame_count < 2 {
            return self.config.target_fps;
        }
        let measured = (self.frame_count - 1) as f32 / (elapsed_ms as f32 / 1000.0);
        measured.clamp(self.config.min_fps, self.config.max_fps)
    }

    pub fn reset(&mut self) {
        self.first_timestamp_ms = None;
        self.last_timestamp_ms = 0;
        self.frame_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_evicts_oldest() {
        let mut window = SampleWindow::new(3);
        for v in [1.0, 2.0, 3.0, 4.0] {
            window.push(v);
        }
        assert!(window.is_full());
        assert_eq!(window.get(0), Some(2.0));
        assert_eq!(window.get(2), Some(4.0));
    }

    #[test]
    fn test_window_statistics() {
        let mut window = SampleWindow::new(4);
        for v in [2.0, 4.0, 4.0, 2.0] {
            window.push(v);
        }
        assert!((window.mean() - 3.0).abs() < 1e-6);
        assert!((window.std_dev() - 1.0).abs() < 1e-6);
        assert!((window.variation_coefficient() - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_mean_crossings_oscillating() {
        let mut window = SampleWindow::new(8);
        for v in [1.0, 3.0, 1.0, 3.0, 1.0, 3.0, 1.0, 3.0] {
            window.push(v);
        }
        // Alternating series crosses its mean between every pair.
        assert_eq!(window.mean_crossings(), 7);
    }

    #[test]
    fn test_mean_crossings_flat() {
        let mut window = SampleWindow::new(5);
        for _ in 0..5 {
            window.push(2.0);
        }
        assert_eq!(window.mean_crossings(), 0);
    }

    #[test]
    fn test_rate_tracker_reports_nominal_during_warmup() {
        let config = AcquisitionConfig::default();
        let mut tracker = SampleRateTracker::new(config.clone());
        tracker.record(0);
        tracker.record(33);
        assert_eq!(tracker.rate(), config.target_fps);
    }

    #[test]
    fn test_rate_tracker_measures_after_warmup() {
        let config = AcquisitionConfig::default();
        let mut tracker = SampleRateTracker::new(config);
        // 61 frames over 3 seconds = 20 Hz.
        for i in 0..61 {
            tracker.record(i * 50);
        }
        assert!((tracker.rate() - 20.0).abs() < 0.5);
    }

    #[test]
    fn test_rate_tracker_clamps_to_bounds() {
        let config = AcquisitionConfig::default();
        let mut tracker = SampleRateTracker::new(config.clone());
        // 1000 frames in 2 seconds = 500 Hz, far above the clamp.
        for i in 0..1000 {
            tracker.record(i * 2);
        }
        assert_eq!(tracker.rate(), config.max_fps);
    }
}
