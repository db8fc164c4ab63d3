// RealtimeBeatDetector - low-latency per-beat event detection
//
// Fires one event per heartbeat to drive immediate feedback (sound,
// animation, waveform spike). Intentionally simpler and faster than the
// batch estimator; it never contributes to the reported BPM.
//
// A beat fires only when all of the following hold:
// - the ring buffer is full and its middle sample is strictly the window
//   maximum (a true local peak, delayed by half a window)
// - the peak sits in the upper portion of a slowly-adapting min/max range
// - the range itself has non-trivial amplitude (signal is not flat)
// - the minimum inter-beat time has elapsed since the previous firing

use crate::config::RealtimeBeatConfig;
use crate::sample::SampleWindow;

/// RealtimeBeatDetector fires one boolean event per detected pulse cycle
#[derive(Debug)]
pub struct RealtimeBeatDetector {
    config: RealtimeBeatConfig,
    window: SampleWindow,
    range_min: f32,
    range_max: f32,
    range_seeded: bool,
    last_beat_ms: Option<i64>,
}

impl RealtimeBeatDetector {
    pub fn new(config: RealtimeBeatConfig) -> Self {
        let window = SampleWindow::new(config.window.max(3));
        Self {
            config,
            window,
            range_min: 0.0,
            range_max: 0.0,
            range_seeded: false,
            last_beat_ms: None,
        }
    }

    /// Process one sample. Returns true when a beat event fires now.
    pub fn on_sample(&mut self, value: f32, timestamp_ms: i64) -> bool {
        self.track_range(value);
        self.window.push(value);

        if !self.window.is_full() {
            return false;
        }

        let mid_index = self.window.len() / 2;
        let mid = match self.window.get(mid_index) {
            Some(v) => v,
            None => return false,
        };

        // Strict maximum: ties lose, so a plateau never fires twice.
        let is_peak = self
            .window
            .iter()
            .enumerate()
            .all(|(i, v)| i == mid_index || v < mid);
        if !is_peak {
            return false;
        }

        let range = self.range_max - self.range_min;
        if range < self.config.min_range {
            return false;
        }
        if mid < self.range_min + self.config.range_fraction * range {
            return false;
        }

        if let Some(last) = self.last_beat_ms {
            if timestamp_ms - last < self.config.min_beat_interval_ms {
                return false;
            }
        }

        self.last_beat_ms = Some(timestamp_ms);
        tracing::debug!("[RealtimeBeat] Beat at {} ms (peak {:.1})", timestamp_ms, mid);
        true
    }

    /// Track a running min/max that expands instantly to contain the signal
    /// and decays slowly toward it, so the range follows amplitude drift
    /// without being collapsed by a single outlier sample.
    fn track_range(&mut self, value: f32) {
        if !self.range_seeded {
            self.range_min = value;
            self.range_max = value;
            self.range_seeded = true;
            return;
        }

        if value < self.range_min {
            self.range_min = value;
        } else {
            self.range_min += (value - self.range_min) * self.config.range_decay;
        }

        if value > self.range_max {
            self.range_max = value;
        } else {
            self.range_max += (value - self.range_max) * self.config.range_decay;
        }
    }

    pub fn reset(&mut self) {
        self.window.clear();
        self.range_min = 0.0;
        self.range_max = 0.0;
        self.range_seeded = false;
        self.last_beat_ms = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> RealtimeBeatDetector {
        RealtimeBeatDetector::new(RealtimeBeatConfig::default())
    }

    /// Feed a pulse-shaped trace with peaks at the given times (ms), 30 Hz.
    /// Returns the count of fired beats.
    fn feed_pulses(detector: &mut RealtimeBeatDetector, peak_times_ms: &[i64], total_ms: i64) -> u32 {
        let mut fired = 0;
        let mut t = 0i64;
        while t <= total_ms {
            // Triangular bump of ~100 ms around each peak on a 100 baseline.
            let mut value = 100.0;
            for &peak in peak_times_ms {
                let d = (t - peak).abs() as f32;
                if d < 100.0 {
                    value += 30.0 * (1.0 - d / 100.0);
                }
            }
            if detector.on_sample(value, t) {
                fired += 1;
            }
            t += 33;
        }
        fired
    }

    #[test]
    fn test_two_peaks_200ms_apart_fire_once() {
        let mut d = detector();
        // Warm the range up with a first beat, then two close peaks.
        let fired = feed_pulses(&mut d, &[1000, 2000, 2200], 3500);
        // The 2200 ms peak is inside the 450 ms debounce of the 2000 ms one.
        assert_eq!(fired, 2, "close double-peak must be debounced");
    }

    #[test]
    fn test_two_peaks_600ms_apart_fire_twice() {
        let mut d = detector();
        let fired = feed_pulses(&mut d, &[1000, 2000, 2600], 3500);
        assert_eq!(fired, 3, "peaks 600 ms apart must both fire");
    }

    #[test]
    fn test_flat_signal_never_fires() {
        let mut d = detector();
        let mut fired = 0;
        for i in 0..200 {
            if d.on_sample(100.0, i * 33) {
                fired += 1;
            }
        }
        assert_eq!(fired, 0, "flat signal has no range, must not fire");
    }

    #[test]
    fn test_no_fire_before_window_full() {
        let mut d = detector();
        for i in 0..5 {
            assert!(!d.on_sample(100.0 + i as f32 * 10.0, i * 33));
        }
    }

    #[test]
    fn test_low_peak_in_range_does_not_fire() {
        let mut d = detector();
        // Establish a wide range first.
        for i in 0..30 {
            let v = if i == 15 { 200.0 } else { 100.0 };
            d.on_sample(v, i * 33);
        }
        // A small bump near the bottom of the range must not fire.
        let mut fired = 0;
        for i in 30..60 {
            let v = if i == 45 { 110.0 } else { 100.0 };
            if d.on_sample(v, i * 33) {
                fired += 1;
            }
        }
        assert_eq!(fired, 0, "peak below the range gate must not fire");
    }

    #[test]
    fn test_reset_clears_debounce_and_range() {
        let mut d = detector();
        feed_pulses(&mut d, &[1000], 1500);
        d.reset();
        assert!(!d.on_sample(100.0, 2000));
    }
}
