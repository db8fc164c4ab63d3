// Session module - measurement orchestration
//
// Owns sequencing for one measurement: components emit values and events
// upward, the controller decides what happens next. Detectors never call
// back into the presentation layer.

pub mod broadcast;
pub mod controller;
pub mod events;

pub use broadcast::SessionChannels;
pub use controller::MeasurementSession;
pub use events::{BeatEvent, BeatLatch, CompletionLatch, SessionEndReason, SessionResult};
