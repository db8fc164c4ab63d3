// FingerPresenceDetector - contact verification state machine
//
// Decides whether a finger with a live pulse is covering the sensor. One
// call per incoming sample, no blocking, never errors: an un-confirmable
// contact simply never advances, and a failed calibration silently
// restarts.
//
// State flow:
//   Calibrating -> AwaitingContact -> VerifyingContact -> VerifyingPulse
//   -> Confirmed -> (relaxed check fails) -> AwaitingContact
//
// Every transition is driven by consecutive-frame counters, never by a
// single sample.

use serde::{Deserialize, Serialize};

use crate::config::PresenceConfig;
use crate::presence::baseline::{Baseline, BaselineAccumulator, BaselineOutcome};
use crate::sample::{Sample, SampleWindow};

/// Detection state exposed to the session controller and status display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionState {
    Calibrating,
    AwaitingContact,
    VerifyingContact,
    VerifyingPulse,
    Confirmed,
}

/// FingerPresenceDetector gates whether a measurement session is active
#[derive(Debug)]
pub struct FingerPresenceDetector {
    config: PresenceConfig,
    state: DetectionState,
    baseline: Option<Baseline>,
    accumulator: BaselineAccumulator,
    /// Consecutive strict-predicate matches while awaiting contact
    contact_run: u32,
    /// Sustained matches during contact verification
    verify_run: u32,
    verify_window: SampleWindow,
    /// Failed micro-variation evaluations this contact episode
    micro_attempts: u32,
    pulse_window: SampleWindow,
    /// Failed pulse verifications this contact episode
    pulse_attempts: u32,
}

impl FingerPresenceDetector {
    pub fn new(config: PresenceConfig) -> Self {
        let accumulator = BaselineAccumulator::new(
            config.baseline_samples,
            config.baseline_max_std,
            config.baseline_min_mean,
        );
        let verify_window = SampleWindow::new(config.verify_frames.max(2) as usize);
        let pulse_window = SampleWindow::new(config.pulse_window.max(2));
        Self {
            config,
            state: DetectionState::Calibrating,
            baseline: None,
            accumulator,
            contact_run: 0,
            verify_run: 0,
            verify_window,
            micro_attempts: 0,
            pulse_window,
            pulse_attempts: 0,
        }
    }

    pub fn state(&self) -> DetectionState {
        self.state
    }

    pub fn baseline(&self) -> Option<Baseline> {
        self.baseline
    }

    /// Process one sample and return the (possibly unchanged) state.
    pub fn process(&mut self, sample: &Sample) -> DetectionState {
        match self.state {
            DetectionState::Calibrating => self.process_calibrating(sample),
            DetectionState::AwaitingContact => self.process_awaiting(sample),
            DetectionState::VerifyingContact => self.process_verifying_contact(sample),
            DetectionState::VerifyingPulse => self.process_verifying_pulse(sample),
            DetectionState::Confirmed => self.process_confirmed(sample),
        }
        self.state
    }

    fn process_calibrating(&mut self, sample: &Sample) {
        if let BaselineOutcome::Accepted(baseline) = self.accumulator.push(sample.value) {
            tracing::info!(
                "[Presence] Baseline accepted (mean {:.1}, std {:.1})",
                baseline.mean,
                baseline.std_dev
            );
            self.baseline = Some(baseline);
            self.enter_awaiting();
        }
    }

    fn process_awaiting(&mut self, sample: &Sample) {
        if self.matches_strict(sample) {
            self.contact_run += 1;
            if self.contact_run >= self.config.contact_frames {
                tracing::info!("[Presence] Contact candidate after {} frames", self.contact_run);
                self.enter_verifying_contact();
            }
        } else {
            self.contact_run = 0;
        }
    }

    fn process_verifying_contact(&mut self, sample: &Sample) {
        if !self.matches_strict(sample) {
            tracing::debug!("[Presence] Contact lost during verification");
            self.enter_awaiting();
            return;
        }

        self.verify_run += 1;
        self.verify_window.push(sample.value);
        if self.verify_run < self.config.verify_frames {
            return;
        }

        // Micro-variation gate: a live fingertip shows slight intensity
        // wobble. Too low means a static red object, too high means noise.
        let cov = self.verify_window.variation_coefficient();
        if cov >= self.config.micro_variation_min && cov <= self.config.micro_variation_max {
            self.enter_verifying_pulse();
            return;
        }

        self.micro_attempts += 1;
        tracing::debug!(
            "[Presence] Micro-variation {:.4} outside band (attempt {})",
            cov,
            self.micro_attempts
        );
        if self.config.fail_open_attempts > 0
            && self.micro_attempts >= self.config.fail_open_attempts
        {
            // Sustained plausible contact that never shows the expected
            // wobble: let pulse verification make the call instead of
            // blocking here forever.
            self.enter_verifying_pulse();
        } else {
            self.verify_run = 0;
            self.verify_window.clear();
        }
    }

    fn process_verifying_pulse(&mut self, sample: &Sample) {
        if !self.matches_strict(sample) {
            tracing::debug!("[Presence] Contact lost during pulse verification");
            self.enter_awaiting();
            return;
        }

        self.pulse_window.push(sample.value);
        if !self.pulse_window.is_full() {
            return;
        }

        let cov = self.pulse_window.variation_coefficient();
        let crossings = self.pulse_window.mean_crossings();
        let rhythmic = cov >= self.config.pulse_variation_min
            && cov <= self.config.pulse_variation_max
            && crossings >= self.config.min_mean_crossings
            && crossings <= self.config.max_mean_crossings;

        if rhythmic {
            tracing::info!(
                "[Presence] Pulse verified (cov {:.4}, {} crossings)",
                cov,
                crossings
            );
            self.state = DetectionState::Confirmed;
            return;
        }

        self.pulse_attempts += 1;
        self.pulse_window.clear();
        if self.config.fail_open_attempts > 0
            && self.pulse_attempts >= self.config.fail_open_attempts
        {
            // Fail-open: accept atypical but sustained contact rather than
            // block a legitimate user indefinitely.
            tracing::info!(
                "[Presence] Accepting contact after {} failed pulse checks",
                self.pulse_attempts
            );
            self.state = DetectionState::Confirmed;
        }
    }

    fn process_confirmed(&mut self, sample: &Sample) {
        if !self.matches_relaxed(sample) {
            tracing::info!("[Presence] Contact lost");
            self.enter_awaiting();
        }
    }

    fn enter_awaiting(&mut self) {
        self.state = DetectionState::AwaitingContact;
        self.contact_run = 0;
        self.verify_run = 0;
        self.verify_window.clear();
        self.micro_attempts = 0;
        self.pulse_window.clear();
        self.pulse_attempts = 0;
    }

    fn enter_verifying_contact(&mut self) {
        self.state = DetectionState::VerifyingContact;
        self.verify_run = 0;
        self.verify_window.clear();
        self.micro_attempts = 0;
    }

    fn enter_verifying_pulse(&mut self) {
        self.state = DetectionState::VerifyingPulse;
        self.pulse_window.clear();
        self.pulse_attempts = 0;
    }

    /// Strict finger-like predicate for initial detection.
    fn matches_strict(&self, sample: &Sample) -> bool {
        self.matches_with_scale(sample, 1.0)
    }

    /// Relaxed continued-presence check; thresholds loosened so lighting
    /// flicker does not flap a confirmed contact.
    fn matches_relaxed(&self, sample: &Sample) -> bool {
        self.matches_with_scale(sample, self.config.hysteresis)
    }

    fn matches_with_scale(&self, sample: &Sample, scale: f32) -> bool {
        let baseline = match self.baseline {
            Some(b) => b,
            None => return false,
        };

        if sample.value < self.config.min_intensity * scale {
            return false;
        }

        let ratio = sample.red / sample.green.max(f32::EPSILON);
        if ratio < self.config.min_channel_ratio * scale {
            return false;
        }

        let brightness = (sample.red + sample.green) / 2.0;
        if brightness < self.config.min_brightness * scale
            || brightness > self.config.max_brightness / scale
        {
            return false;
        }

        (sample.value - baseline.mean).abs() >= self.config.min_baseline_deviation * scale
    }

    /// Full reset: drops the calibration baseline.
    pub fn reset(&mut self) {
        self.baseline = None;
        self.accumulator.clear();
        self.enter_awaiting();
        self.state = DetectionState::Calibrating;
    }

    /// Reset for the next measurement, keeping an accepted baseline so the
    /// next session skips recalibration.
    pub fn reset_for_next_measurement(&mut self) {
        self.accumulator.clear();
        self.enter_awaiting();
        if self.baseline.is_none() {
            self.state = DetectionState::Calibrating;
        }
    }
}
