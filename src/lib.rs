// Pulse Meter Core - fingertip PPG pulse-rate detection engine
// Signal conditioning, presence verification, and BPM estimation

// Module declarations
pub mod analysis;
pub mod config;
pub mod error;
pub mod presence;
pub mod sample;
pub mod session;
pub mod testing;

// Re-exports for convenience
pub use analysis::{BatchEstimator, BpmEstimate, Confidence};
pub use config::PulseConfig;
pub use error::SessionError;
pub use presence::DetectionState;
pub use sample::Sample;
pub use session::{BeatEvent, MeasurementSession, SessionEndReason, SessionResult};

use once_cell::sync::OnceCell;

static LOG_INIT: OnceCell<()> = OnceCell::new();

/// Initialize tracing output once per process. Safe to call repeatedly
/// from tests and the CLI.
pub fn init_logging() {
    LOG_INIT.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .try_init();
    });
}
