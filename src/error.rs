// Error types for the pulse meter engine
//
// The detection core itself never errors: every computation returns a
// best-effort value or an explicit "no estimate yet". Typed errors exist
// only for misuse of the session lifecycle API.

use thiserror::Error;

/// Session lifecycle errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// A measurement session is already in progress
    #[error("measurement session is already running")]
    AlreadyRunning,

    /// No measurement session is in progress
    #[error("measurement session is not running")]
    NotRunning,

    /// An internal lock was poisoned by a panicked thread
    #[error("internal lock poisoned: {context}")]
    LockPoisoned { context: &'static str },
}
