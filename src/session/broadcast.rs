// SessionChannels: broadcast channel hub for session outputs
//
// Centralizes the tokio broadcast channels a session publishes on, so the
// presentation layer can take independent subscriptions for status text,
// beat feedback, and the live BPM display. Senders are created up front;
// publishing without subscribers is a silent no-op.

use tokio::sync::broadcast;

use crate::analysis::BpmEstimate;
use crate::presence::DetectionState;
use crate::session::events::BeatEvent;

/// Buffer sizes: states change a handful of times per session, beats arrive
/// at most ~3/s, estimates about once per second.
const STATE_BUFFER: usize = 16;
const BEAT_BUFFER: usize = 32;
const ESTIMATE_BUFFER: usize = 32;

/// Manages all broadcast channels for one session
#[derive(Debug)]
pub struct SessionChannels {
    states: broadcast::Sender<DetectionState>,
    beats: broadcast::Sender<BeatEvent>,
    estimates: broadcast::Sender<BpmEstimate>,
}

impl SessionChannels {
    pub fn new() -> Self {
        let (states, _) = broadcast::channel(STATE_BUFFER);
        let (beats, _) = broadcast::channel(BEAT_BUFFER);
        let (estimates, _) = broadcast::channel(ESTIMATE_BUFFER);
        Self {
            states,
            beats,
            estimates,
        }
    }

    /// Subscribe to detection state changes (for status display).
    pub fn subscribe_states(&self) -> broadcast::Receiver<DetectionState> {
        self.states.subscribe()
    }

    /// Subscribe to beat events (for synchronized sound and animation).
    pub fn subscribe_beats(&self) -> broadcast::Receiver<BeatEvent> {
        self.beats.subscribe()
    }

    /// Subscribe to live BPM estimate updates.
    pub fn subscribe_estimates(&self) -> broadcast::Receiver<BpmEstimate> {
        self.estimates.subscribe()
    }

    pub(crate) fn publish_state(&self, state: DetectionState) {
        let _ = self.states.send(state);
    }

    pub(crate) fn publish_beat(&self, beat: BeatEvent) {
        let _ = self.beats.send(beat);
    }

    pub(crate) fn publish_estimate(&self, estimate: BpmEstimate) {
        let _ = self.estimates.send(estimate);
    }
}

impl Default for SessionChannels {
    fn default() -> Self {
        Self::new()
    }
}
