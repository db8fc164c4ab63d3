// Session event types - beat delivery, completion latch, terminal result

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::analysis::Confidence;

/// A momentary "a full pulse cycle just peaked" signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeatEvent {
    pub timestamp_ms: i64,
}

/// Single-slot, consume-once beat delivery between the producer context and
/// the presentation context.
///
/// The producer offers beats, the presentation side takes them exactly once.
/// The mutex guarantees a beat is never delivered twice nor lost to a race;
/// an unconsumed beat overwritten by the next one means the consumer lagged
/// a full pulse cycle, which is logged rather than hidden.
#[derive(Debug, Default)]
pub struct BeatLatch {
    slot: Mutex<Option<BeatEvent>>,
}

impl BeatLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a beat for the presentation context.
    pub fn offer(&self, event: BeatEvent) {
        let mut slot = self.slot.lock().expect("beat latch poisoned");
        if let Some(previous) = slot.replace(event) {
            tracing::debug!(
                "[BeatLatch] Beat at {} ms replaced unconsumed beat at {} ms",
                event.timestamp_ms,
                previous.timestamp_ms
            );
        }
    }

    /// Read and clear the pending beat, if any.
    pub fn take(&self) -> Option<BeatEvent> {
        self.slot.lock().expect("beat latch poisoned").take()
    }
}

/// Set-once guard ensuring exactly one finalization wins.
///
/// Both the session timeout and the required-sample-count path may attempt
/// to finalize concurrently; whichever swaps the flag first performs the
/// finalization and the loser becomes a no-op.
#[derive(Debug, Default)]
pub struct CompletionLatch {
    completed: AtomicBool,
}

impl CompletionLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true exactly once, for the caller that wins the race.
    pub fn try_complete(&self) -> bool {
        self.completed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_complete(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    pub fn reset(&self) {
        self.completed.store(false, Ordering::Release);
    }
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEndReason {
    /// The required sample count was reached
    Completed,
    /// The wall-clock session timeout fired first
    Timeout,
    /// The relaxed presence check failed mid-measurement
    FingerRemoved,
    /// The caller cancelled the session
    Cancelled,
    /// Too few samples for any estimate
    InsufficientData,
}

/// Terminal result delivered once per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionResult {
    pub bpm: Option<i32>,
    pub confidence: Confidence,
    pub is_partial: bool,
    pub reason: SessionEndReason,
}
