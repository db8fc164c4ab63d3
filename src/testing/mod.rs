// Testing support - deterministic synthetic PPG traces
//
// Live camera input is awkward to reproduce, so fixtures synthesize the
// sample streams the engine would see: ambient no-finger frames and
// finger-on traces with a known pulse rate. Used by the simulator CLI and
// integration tests.

pub mod fixtures;

pub use fixtures::{ambient_trace, finger_trace, TraceSpec};
