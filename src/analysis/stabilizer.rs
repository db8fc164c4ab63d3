// BpmStabilizer - rate-limited, outlier-resistant BPM smoothing
//
// Raw per-window estimates jitter by several BPM even on a clean signal.
// The stabilizer absorbs them into a stable display value that never jumps:
// it establishes an initial consensus, ignores implausible spikes outright,
// and otherwise nudges the stable value toward the recent average by at
// most a time-scaled allowance.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::analysis::quality::Confidence;
use crate::config::StabilizerConfig;

/// A stabilized BPM reading emitted to external consumers.
///
/// Immutable once emitted; only the stabilizer mutates the underlying state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BpmEstimate {
    pub value: i32,
    pub confidence: Confidence,
    pub is_partial: bool,
    /// True once enough consistent readings have been absorbed and the
    /// value lies inside the valid physiological band.
    pub reliable: bool,
}

/// BpmStabilizer converts raw estimates into a rate-limited stable value
#[derive(Debug)]
pub struct BpmStabilizer {
    config: StabilizerConfig,
    /// Raw readings collected before the initial value is established
    warmup: Vec<i32>,
    stable: Option<f32>,
    recent: VecDeque<i32>,
    last_update_ms: Option<i64>,
    absorbed: u32,
}

impl BpmStabilizer {
    pub fn new(config: StabilizerConfig) -> Self {
        Self {
            warmup: Vec::with_capacity(config.warmup_readings),
            recent: VecDeque::with_capacity(config.window_size),
            config,
            stable: None,
            last_update_ms: None,
            absorbed: 0,
        }
    }

    /// Feed one raw estimate. Returns the current stabilized estimate, or
    /// `None` while warming up or when the reading was rejected as noise.
    pub fn update(&mut self, raw_bpm: i32, now_ms: i64) -> Option<BpmEstimate> {
        let stable = match self.stable {
            None => return self.warm_up(raw_bpm, now_ms),
            Some(s) => s,
        };

        let elapsed_s = self
            .last_update_ms
            .map(|last| ((now_ms - last).max(0)) as f32 / 1000.0)
            .unwrap_or(0.0);
        let allowed = (self.config.max_change_per_second * elapsed_s)
            .max(self.config.min_allowed_change);

        // A reading far beyond what the heart could plausibly have done in
        // the elapsed time is noise, not a trend. Drop it entirely.
        if (raw_bpm as f32 - stable).abs() > 2.0 * allowed {
            tracing::debug!(
                "[Stabilizer] Ignoring implausible reading {} (stable {:.1}, allowed {:.1})",
                raw_bpm,
                stable,
                allowed
            );
            return None;
        }

        if self.recent.len() == self.config.window_size {
            self.recent.pop_front();
        }
        self.recent.push_back(raw_bpm);
        self.absorbed += 1;

        let spread = self.recent.iter().max().unwrap_or(&0) - self.recent.iter().min().unwrap_or(&0);
        if spread <= self.config.window_spread {
            let target =
                self.recent.iter().sum::<i32>() as f32 / self.recent.len() as f32;
            let delta = (target - stable).clamp(-allowed, allowed);
            self.stable = Some(stable + delta);
            self.last_update_ms = Some(now_ms);
        }

        Some(self.current_estimate())
    }

    fn warm_up(&mut self, raw_bpm: i32, now_ms: i64) -> Option<BpmEstimate> {
        self.warmup.push(raw_bpm);
        if self.warmup.len() > self.config.warmup_readings {
            self.warmup.remove(0);
        }
        if self.warmup.len() < self.config.warmup_readings {
            return None;
        }

        let min = *self.warmup.iter().min().unwrap();
        let max = *self.warmup.iter().max().unwrap();
        if max - min > self.config.warmup_spread {
            // Readings still disagree; keep sliding until they settle.
            return None;
        }

        let avg = self.warmup.iter().sum::<i32>() as f32 / self.warmup.len() as f32;
        self.stable = Some(avg);
        self.absorbed = self.warmup.len() as u32;
        self.last_update_ms = Some(now_ms);
        for &v in &self.warmup {
            self.recent.push_back(v);
        }
        self.warmup.clear();
        tracing::info!("[Stabilizer] Initial stable value {:.1} BPM", avg);
        Some(self.current_estimate())
    }

    fn current_estimate(&self) -> BpmEstimate {
        let value = self.stable.map(|s| s.round() as i32).unwrap_or(0);
        let reliable = self.is_reliable();
        BpmEstimate {
            value,
            confidence: if reliable {
                Confidence::Good
            } else {
                Confidence::Low
            },
            is_partial: false,
            reliable,
        }
    }

    /// Current stable value, if established.
    pub fn stable_bpm(&self) -> Option<i32> {
        self.stable.map(|s| s.round() as i32)
    }

    pub fn is_reliable(&self) -> bool {
        match self.stable {
            Some(s) => {
                let v = s.round() as i32;
                self.absorbed >= 3 && v >= self.config.min_bpm && v <= self.config.max_bpm
            }
            None => false,
        }
    }

    pub fn reset(&mut self) {
        self.warmup.clear();
        self.recent.clear();
        self.stable = None;
        self.last_update_ms = None;
        self.absorbed = 0;
    }
}
