// Presence module - finger contact calibration and verification
//
// Consumes every raw sample and gates whether a measurement session is
// active. The calibration baseline may be carried across consecutive
// sessions; everything else is per-session state.

pub mod baseline;
pub mod detector;

pub use baseline::{Baseline, BaselineAccumulator, BaselineOutcome};
pub use detector::{DetectionState, FingerPresenceDetector};
