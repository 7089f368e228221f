// ── Core error types ──
//
// Errors surfaced by the sync engine. Transport failures pass through
// untouched so callers can still tell `Unreachable` from `Http`; the
// engine adds its own variants for polling and key construction.

use std::time::Duration;

use thiserror::Error;

use crate::registry::Resource;

/// Unified error type for the core crate.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    // ── Transport ────────────────────────────────────────────────────
    #[error(transparent)]
    Transport(#[from] ootb_api::Error),

    // ── Polling ──────────────────────────────────────────────────────
    #[error("Polling gave up after {}s without reaching a terminal status", elapsed.as_secs())]
    PollTimedOut { elapsed: Duration },

    #[error("Device reported a failed operation: {message}")]
    PollFailed { message: String },

    #[error("Polling was cancelled")]
    PollCancelled,

    // ── Keys and registry ────────────────────────────────────────────
    #[error("Invalid argument for {resource}: {reason}")]
    InvalidArgument { resource: Resource, reason: String },

    #[error("Resource registry is inconsistent: {message}")]
    Registry { message: String },
}

impl CoreError {
    /// Returns `true` if the underlying transport said the device was unreachable.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_unreachable())
    }

    /// The transport error, if this is one.
    pub fn transport(&self) -> Option<&ootb_api::Error> {
        match self {
            Self::Transport(e) => Some(e),
            _ => None,
        }
    }
}
