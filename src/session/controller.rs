// MeasurementSession - owns the detection pipeline for one measurement
//
// Samples arrive via push_sample from the producer context (a camera frame
// callback); all per-sample work runs inline and never blocks. The session
// gates measurement on the presence detector, drives the realtime beat
// detector for feedback, periodically re-runs the batch estimator, and
// finalizes exactly once whether the sample target, the wall-clock timeout,
// contact loss, or a cancel gets there first.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::analysis::{
    BatchEstimator, BpmStabilizer, Confidence, QualityGrader, RawEstimate, RealtimeBeatDetector,
};
use crate::config::PulseConfig;
use crate::error::SessionError;
use crate::presence::{DetectionState, FingerPresenceDetector};
use crate::sample::{Sample, SampleRateTracker};
use crate::session::broadcast::SessionChannels;
use crate::session::events::{BeatEvent, BeatLatch, CompletionLatch, SessionEndReason, SessionResult};

/// Mutable pipeline state, owned by a single logical thread of control.
struct SessionInner {
    presence: FingerPresenceDetector,
    realtime: RealtimeBeatDetector,
    estimator: BatchEstimator,
    stabilizer: BpmStabilizer,
    grader: QualityGrader,
    rate: SampleRateTracker,
    /// Full-session buffer of confirmed-contact sample values
    samples: Vec<f32>,
    last_state: DetectionState,
    /// Confirmed samples accumulated since the last batch pass
    since_estimate: usize,
}

impl SessionInner {
    fn new(config: &PulseConfig) -> Self {
        let presence = FingerPresenceDetector::new(config.presence.clone());
        let last_state = presence.state();
        Self {
            presence,
            realtime: RealtimeBeatDetector::new(config.realtime.clone()),
            estimator: BatchEstimator::new(config.conditioning.clone(), config.peaks.clone()),
            stabilizer: BpmStabilizer::new(config.stabilizer.clone()),
            grader: QualityGrader::new(config.quality.clone()),
            rate: SampleRateTracker::new(config.acquisition.clone()),
            samples: Vec::new(),
            last_state,
            since_estimate: 0,
        }
    }

    /// Clear per-measurement state. The presence baseline survives unless
    /// `drop_baseline` is set.
    fn reset(&mut self, drop_baseline: bool) {
        if drop_baseline {
            self.presence.reset();
        } else {
            self.presence.reset_for_next_measurement();
        }
        self.realtime.reset();
        self.stabilizer.reset();
        self.rate.reset();
        self.samples.clear();
        self.since_estimate = 0;
        self.last_state = self.presence.state();
    }
}

/// MeasurementSession runs one pulse measurement end to end
pub struct MeasurementSession {
    config: PulseConfig,
    channels: SessionChannels,
    beat_latch: Arc<BeatLatch>,
    completion: CompletionLatch,
    running: AtomicBool,
    inner: Mutex<SessionInner>,
    result_tx: watch::Sender<Option<SessionResult>>,
    timeout_task: Mutex<Option<JoinHandle<()>>>,
}

impl MeasurementSession {
    pub fn new(config: PulseConfig) -> Self {
        let inner = SessionInner::new(&config);
        let (result_tx, _) = watch::channel(None);
        Self {
            config,
            channels: SessionChannels::new(),
            beat_latch: Arc::new(BeatLatch::new()),
            completion: CompletionLatch::new(),
            running: AtomicBool::new(false),
            inner: Mutex::new(inner),
            result_tx,
            timeout_task: Mutex::new(None),
        }
    }

    /// Start a measurement. Must be called from within a tokio runtime; the
    /// session timeout runs as an independently cancellable spawned task.
    pub fn start(self: &Arc<Self>) -> Result<(), SessionError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SessionError::AlreadyRunning);
        }

        {
            let mut inner = self.inner.lock().map_err(|_| SessionError::LockPoisoned {
                context: "session state",
            })?;
            inner.reset(false);
        }
        self.completion.reset();
        self.result_tx.send_replace(None);
        while self.beat_latch.take().is_some() {}

        let duration = Duration::from_millis(self.config.session.duration_ms);
        let session = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            if session.completion.try_complete() {
                tracing::info!("[Session] Timeout after {:?}", duration);
                session.finalize(SessionEndReason::Timeout);
            }
        });

        let mut slot = self.timeout_task.lock().map_err(|_| SessionError::LockPoisoned {
            context: "timeout task",
        })?;
        if let Some(stale) = slot.replace(handle) {
            stale.abort();
        }

        tracing::info!("[Session] Started ({} ms timeout)", self.config.session.duration_ms);
        Ok(())
    }

    /// Feed one sample from the producer context. Non-blocking; all
    /// conditioning and detection runs inline. Ignored when no session is
    /// active.
    pub fn push_sample(&self, sample: Sample) {
        if !self.running.load(Ordering::Acquire) || self.completion.is_complete() {
            return;
        }
        let mut inner = match self.inner.lock() {
            Ok(inner) => inner,
            Err(_) => {
                tracing::warn!("[Session] Dropping sample: state lock poisoned");
                return;
            }
        };

        inner.rate.record(sample.timestamp_ms);

        let was_confirmed = inner.last_state == DetectionState::Confirmed;
        let state = inner.presence.process(&sample);
        if state != inner.last_state {
            tracing::info!("[Session] {:?} -> {:?}", inner.last_state, state);
            inner.last_state = state;
            self.channels.publish_state(state);
        }

        if was_confirmed && state != DetectionState::Confirmed {
            // Contact lost mid-measurement: finalize with whatever partial
            // estimate exists rather than failing hard.
            if self.completion.try_complete() {
                self.finalize_locked(&mut inner, SessionEndReason::FingerRemoved);
            }
            return;
        }

        if state != DetectionState::Confirmed {
            return;
        }

        inner.samples.push(sample.value);
        inner.since_estimate += 1;

        if inner.realtime.on_sample(sample.value, sample.timestamp_ms) {
            let beat = BeatEvent {
                timestamp_ms: sample.timestamp_ms,
            };
            self.beat_latch.offer(beat);
            self.channels.publish_beat(beat);
        }

        if inner.since_estimate >= self.config.session.estimate_every {
            inner.since_estimate = 0;
            let rate = inner.rate.rate();
            let raw = inner.estimator.estimate(&inner.samples, rate);
            if let Some(raw_bpm) = raw.bpm {
                if let Some(estimate) = inner.stabilizer.update(raw_bpm, sample.timestamp_ms) {
                    self.channels.publish_estimate(estimate);
                }
            }
        }

        if inner.samples.len() >= self.config.session.required_samples
            && self.completion.try_complete()
        {
            self.finalize_locked(&mut inner, SessionEndReason::Completed);
        }
    }

    /// Cancel the running session. Components are reset for the next
    /// measurement; the calibration baseline is kept.
    pub fn cancel(&self) -> Result<(), SessionError> {
        if !self.running.load(Ordering::Acquire) {
            return Err(SessionError::NotRunning);
        }
        if self.completion.try_complete() {
            let mut inner = self.inner.lock().map_err(|_| SessionError::LockPoisoned {
                context: "session state",
            })?;
            self.finalize_locked(&mut inner, SessionEndReason::Cancelled);
            inner.reset(false);
        }
        Ok(())
    }

    /// Finalize from a context that does not already hold the state lock.
    fn finalize(&self, reason: SessionEndReason) {
        let mut inner = match self.inner.lock() {
            Ok(inner) => inner,
            Err(_) => {
                tracing::warn!("[Session] Finalize skipped: state lock poisoned");
                return;
            }
        };
        self.finalize_locked(&mut inner, reason);
    }

    fn finalize_locked(&self, inner: &mut SessionInner, reason: SessionEndReason) {
        let result = self.build_result(inner, reason);
        tracing::info!(
            "[Session] Finalized: {:?} BPM ({:?}, {:?})",
            result.bpm,
            result.confidence,
            result.reason
        );
        self.result_tx.send_replace(Some(result));
        self.running.store(false, Ordering::Release);

        if let Ok(mut slot) = self.timeout_task.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }

    fn build_result(&self, inner: &mut SessionInner, reason: SessionEndReason) -> SessionResult {
        if reason != SessionEndReason::Cancelled
            && inner.samples.len() < self.config.session.min_samples
        {
            return SessionResult {
                bpm: None,
                confidence: Confidence::Low,
                is_partial: true,
                reason: SessionEndReason::InsufficientData,
            };
        }

        let rate = inner.rate.rate();
        let raw = inner.estimator.estimate(&inner.samples, rate);
        let bpm = inner.stabilizer.stable_bpm().or(raw.bpm);

        let mut confidence = self.grade_confidence(inner, &raw, rate);
        if let Some(bpm) = bpm {
            // An implausible reading is reported but flagged, never
            // silently corrected.
            if bpm < self.config.session.sanity_min_bpm || bpm > self.config.session.sanity_max_bpm
            {
                tracing::warn!("[Session] Implausible reading {} BPM", bpm);
                confidence = Confidence::Low;
            }
        } else {
            confidence = Confidence::Low;
        }

        SessionResult {
            bpm,
            confidence,
            is_partial: reason != SessionEndReason::Completed || bpm.is_none(),
            reason,
        }
    }

    fn grade_confidence(
        &self,
        inner: &SessionInner,
        raw: &RawEstimate,
        rate: f32,
    ) -> Confidence {
        let tail_len = ((self.config.quality.window_seconds * rate) as usize)
            .clamp(1, inner.samples.len().max(1));
        let start = inner.samples.len().saturating_sub(tail_len);
        let raw_tail = &inner.samples[start..];
        let conditioned_tail = &raw.conditioned[raw.conditioned.len().saturating_sub(tail_len)..];
        let raw_mean = if raw_tail.is_empty() {
            0.0
        } else {
            raw_tail.iter().sum::<f32>() / raw_tail.len() as f32
        };
        inner
            .grader
            .grade(conditioned_tail, raw_mean, &raw.intervals)
    }

    /// Full reset including the calibration baseline. Only valid between
    /// sessions.
    pub fn reset(&self) -> Result<(), SessionError> {
        self.reset_with(true)
    }

    /// Reset for the next measurement, keeping the calibration baseline to
    /// skip recalibration.
    pub fn reset_for_next_measurement(&self) -> Result<(), SessionError> {
        self.reset_with(false)
    }

    fn reset_with(&self, drop_baseline: bool) -> Result<(), SessionError> {
        if self.running.load(Ordering::Acquire) {
            return Err(SessionError::AlreadyRunning);
        }
        let mut inner = self.inner.lock().map_err(|_| SessionError::LockPoisoned {
            context: "session state",
        })?;
        inner.reset(drop_baseline);
        self.completion.reset();
        self.result_tx.send_replace(None);
        while self.beat_latch.take().is_some() {}
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Current detection state (for status display).
    pub fn detection_state(&self) -> DetectionState {
        self.inner
            .lock()
            .map(|inner| inner.last_state)
            .unwrap_or(DetectionState::Calibrating)
    }

    /// Latest stabilized BPM, if established.
    pub fn current_bpm(&self) -> Option<i32> {
        self.inner.lock().ok().and_then(|inner| inner.stabilizer.stable_bpm())
    }

    /// Consume-once beat latch for the presentation context.
    pub fn beat_latch(&self) -> Arc<BeatLatch> {
        Arc::clone(&self.beat_latch)
    }

    /// Broadcast channel hub for event subscriptions.
    pub fn channels(&self) -> &SessionChannels {
        &self.channels
    }

    /// Watch the terminal session result.
    pub fn subscribe_result(&self) -> watch::Receiver<Option<SessionResult>> {
        self.result_tx.subscribe()
    }

    /// Terminal result of the last finished session, if any.
    pub fn result(&self) -> Option<SessionResult> {
        *self.result_tx.borrow()
    }
}
