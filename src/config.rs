//! Configuration management for dynamic parameter tuning
//!
//! Every numeric threshold in the detection pipeline is a configuration
//! field with a documented default, loadable from a JSON file so parameters
//! can be adjusted without recompilation. Historical variants of this
//! algorithm disagreed on the exact constants (debounce 300-500 ms,
//! confidence bands), so none of them are hardcoded.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Complete engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PulseConfig {
    pub acquisition: AcquisitionConfig,
    pub presence: PresenceConfig,
    pub conditioning: ConditioningConfig,
    pub peaks: PeakConfig,
    pub stabilizer: StabilizerConfig,
    pub realtime: RealtimeBeatConfig,
    pub quality: QualityConfig,
    pub session: SessionConfig,
}

/// Frame acquisition rate parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Nominal frame rate assumed until the measured rate warms up (Hz)
    pub target_fps: f32,
    /// Lower clamp for the measured rate (Hz)
    pub min_fps: f32,
    /// Upper clamp for the measured rate (Hz)
    pub max_fps: f32,
    /// Elapsed time before the measured rate is trusted (ms)
    pub warmup_ms: i64,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            target_fps: 30.0,
            min_fps: 15.0,
            max_fps: 60.0,
            warmup_ms: 1000,
        }
    }
}

/// Finger-presence state machine parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// Brightness samples accumulated for the no-finger baseline
    pub baseline_samples: usize,
    /// Maximum baseline standard deviation for acceptance
    pub baseline_max_std: f32,
    /// Minimum baseline mean brightness for acceptance
    pub baseline_min_mean: f32,
    /// Absolute intensity floor for the finger-like predicate
    pub min_intensity: f32,
    /// Minimum red/green channel ratio for the finger-like predicate
    pub min_channel_ratio: f32,
    /// Lower bound of the accepted overall brightness band
    pub min_brightness: f32,
    /// Upper bound of the accepted overall brightness band
    pub max_brightness: f32,
    /// Minimum absolute deviation from the no-finger baseline
    pub min_baseline_deviation: f32,
    /// Consecutive matching frames to enter contact verification
    pub contact_frames: u32,
    /// Sustained matching frames required during contact verification
    pub verify_frames: u32,
    /// Lower bound of the acceptable micro-variation coefficient band
    pub micro_variation_min: f32,
    /// Upper bound of the acceptable micro-variation coefficient band
    pub micro_variation_max: f32,
    /// Window length for pulse verification (frames)
    pub pulse_window: usize,
    /// Lower bound of the pulsatile variation coefficient band
    pub pulse_variation_min: f32,
    /// Upper bound of the pulsatile variation coefficient band
    pub pulse_variation_max: f32,
    /// Minimum mean-crossings per pulse window (30 BPM floor)
    pub min_mean_crossings: u32,
    /// Maximum mean-crossings per pulse window (150+ BPM ceiling)
    pub max_mean_crossings: u32,
    /// Failed verification attempts before contact is accepted anyway.
    /// Tunable usability policy; 0 disables the fail-open path.
    pub fail_open_attempts: u32,
    /// Threshold scale for the relaxed continued-presence check
    pub hysteresis: f32,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            baseline_samples: 30,
            baseline_max_std: 6.0,
            baseline_min_mean: 40.0,
            min_intensity: 60.0,
            min_channel_ratio: 1.5,
            min_brightness: 50.0,
            max_brightness: 250.0,
            min_baseline_deviation: 25.0,
            contact_frames: 15,
            verify_frames: 30,
            micro_variation_min: 0.0008,
            micro_variation_max: 0.08,
            pulse_window: 45,
            pulse_variation_min: 0.0015,
            pulse_variation_max: 0.1,
            min_mean_crossings: 3,
            max_mean_crossings: 20,
            fail_open_attempts: 3,
            hysteresis: 0.85,
        }
    }
}

/// Signal conditioning parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditioningConfig {
    /// Width of the detrending moving average in seconds of measured rate
    pub detrend_seconds: f32,
    /// Minimum detrend window in samples
    pub detrend_min_window: usize,
    /// Gaussian low-pass kernel width in samples
    pub gaussian_width: usize,
    /// Final moving-average smoothing window in samples
    pub smooth_window: usize,
    /// Inputs shorter than this are returned unmodified
    pub min_input_len: usize,
}

impl Default for ConditioningConfig {
    fn default() -> Self {
        Self {
            detrend_seconds: 2.0,
            detrend_min_window: 30,
            gaussian_width: 5,
            smooth_window: 5,
            min_input_len: 10,
        }
    }
}

/// Peak detection and interval statistics parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeakConfig {
    /// Amplitude gate as a multiple of the signal standard deviation
    pub amplitude_factor: f32,
    /// Half-width of the strict local-maximum neighborhood (samples).
    /// Narrower windows accept shallow local wobbles as false peaks.
    pub neighborhood: usize,
    /// Minimum beat-to-beat spacing in seconds (240 BPM ceiling)
    pub min_peak_spacing_s: f32,
    /// Maximum beat-to-beat spacing in seconds (30 BPM floor)
    pub max_peak_spacing_s: f32,
    /// Intervals required for a full-confidence estimate
    pub min_intervals: usize,
    /// Intervals accepted on the relaxed fallback path
    pub relaxed_min_intervals: usize,
}

impl Default for PeakConfig {
    fn default() -> Self {
        Self {
            amplitude_factor: 0.45,
            neighborhood: 3,
            min_peak_spacing_s: 0.25,
            max_peak_spacing_s: 2.0,
            min_intervals: 3,
            relaxed_min_intervals: 2,
        }
    }
}

/// BPM stabilizer parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StabilizerConfig {
    /// Consecutive raw estimates required to establish the initial value
    pub warmup_readings: usize,
    /// Maximum mutual spread of the warm-up readings (BPM)
    pub warmup_spread: i32,
    /// Maximum stable-value change per second of elapsed time (BPM/s)
    pub max_change_per_second: f32,
    /// Floor on the allowed change regardless of elapsed time (BPM)
    pub min_allowed_change: f32,
    /// Bounded recent-readings window size
    pub window_size: usize,
    /// Maximum window spread before nudging is suspended (BPM)
    pub window_spread: i32,
    /// Lower bound of the valid physiological band (BPM)
    pub min_bpm: i32,
    /// Upper bound of the valid physiological band (BPM)
    pub max_bpm: i32,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            warmup_readings: 3,
            warmup_spread: 10,
            max_change_per_second: 15.0,
            min_allowed_change: 5.0,
            window_size: 5,
            window_spread: 8,
            min_bpm: 45,
            max_bpm: 180,
        }
    }
}

/// Realtime beat detector parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeBeatConfig {
    /// Ring buffer length in samples (~0.5 s at 30 Hz)
    pub window: usize,
    /// Fraction of the running range the peak must reach
    pub range_fraction: f32,
    /// Minimum running range amplitude before firing is allowed
    pub min_range: f32,
    /// Minimum inter-beat time (debounce, ~133 BPM fast-path ceiling)
    pub min_beat_interval_ms: i64,
    /// Per-sample decay of the running min/max toward the signal
    pub range_decay: f32,
}

impl Default for RealtimeBeatConfig {
    fn default() -> Self {
        Self {
            window: 15,
            range_fraction: 0.6,
            min_range: 1.0,
            min_beat_interval_ms: 450,
            range_decay: 0.001,
        }
    }
}

/// End-of-session confidence grading parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityConfig {
    /// Conditioned-signal tail inspected for quality (seconds)
    pub window_seconds: f32,
    /// Normalized deviation below which contact is considered too flat
    pub flat_deviation: f32,
    /// Lower bound of the optimal normalized deviation band
    pub optimal_low: f32,
    /// Upper bound of the optimal normalized deviation band
    pub optimal_high: f32,
    /// Normalized deviation above which the signal is considered motion noise
    pub noisy_deviation: f32,
    /// Relative interval deviation for full consistency credit
    pub interval_tight: f32,
    /// Relative interval deviation beyond which consistency credit is lost
    pub interval_loose: f32,
    /// Averaged score at or above which confidence is High
    pub high_score: f32,
    /// Averaged score at or above which confidence is Good
    pub good_score: f32,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            window_seconds: 2.0,
            flat_deviation: 0.002,
            optimal_low: 0.005,
            optimal_high: 0.05,
            noisy_deviation: 0.15,
            interval_tight: 0.10,
            interval_loose: 0.25,
            high_score: 0.8,
            good_score: 0.5,
        }
    }
}

/// Measurement session parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Wall-clock session timeout (ms)
    pub duration_ms: u64,
    /// Confirmed samples that complete the session
    pub required_samples: usize,
    /// Minimum confirmed samples for any estimate at all
    pub min_samples: usize,
    /// Confirmed samples between batch re-estimations
    pub estimate_every: usize,
    /// Extended sanity band floor; readings below are flagged Low (BPM)
    pub sanity_min_bpm: i32,
    /// Extended sanity band ceiling; readings above are flagged Low (BPM)
    pub sanity_max_bpm: i32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            duration_ms: 10_000,
            required_samples: 300,
            min_samples: 90,
            estimate_every: 30,
            sanity_min_bpm: 30,
            sanity_max_bpm: 220,
        }
    }
}

impl Default for PulseConfig {
    /// Default configuration values (fallback if config file not found)
    fn default() -> Self {
        Self {
            acquisition: AcquisitionConfig::default(),
            presence: PresenceConfig::default(),
            conditioning: ConditioningConfig::default(),
            peaks: PeakConfig::default(),
            stabilizer: StabilizerConfig::default(),
            realtime: RealtimeBeatConfig::default(),
            quality: QualityConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl PulseConfig {
    /// Load configuration from a JSON file.
    ///
    /// Any read or parse failure falls back to the defaults with a logged
    /// warning; a missing config file is not an error.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PulseConfig::default();
        assert_eq!(config.acquisition.target_fps, 30.0);
        assert_eq!(config.presence.baseline_samples, 30);
        assert_eq!(config.presence.fail_open_attempts, 3);
        assert_eq!(config.peaks.neighborhood, 3);
        assert_eq!(config.realtime.min_beat_interval_ms, 450);
        assert_eq!(config.session.duration_ms, 10_000);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = PulseConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: PulseConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(
            parsed.stabilizer.max_change_per_second,
            config.stabilizer.max_change_per_second
        );
        assert_eq!(parsed.presence.pulse_window, config.presence.pulse_window);
        assert_eq!(parsed.quality.good_score, config.quality.good_score);
    }

    #[test]
    fn test_load_missing_file_falls_back_to_defaults() {
        let config = PulseConfig::load_from_file("/nonexistent/pulse_config.json");
        assert_eq!(config.session.required_samples, 300);
    }
}
