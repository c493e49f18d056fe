// src/connection/guard.rs

//! RAII guards that keep the session table consistent when a future is dropped
//! half-way or a task unwinds.

use super::session::Shared;
use crate::core::ApiError;
use std::sync::Arc;
use tracing::debug;

/// Held by `connect` while the session is in the connecting state. Dropping it without
/// calling `set_handed_off` (error, or the connect future was cancelled) returns the
/// session to the disconnected state.
pub(crate) struct ConnectAttemptGuard {
    shared: Arc<Shared>,
    is_handed_off: bool,
}

impl ConnectAttemptGuard {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            is_handed_off: false,
        }
    }

    /// Marks the attempt as successful: the link now owns the session state.
    pub(crate) fn set_handed_off(&mut self) {
        self.is_handed_off = true;
    }
}

impl Drop for ConnectAttemptGuard {
    fn drop(&mut self) {
        if self.is_handed_off {
            return;
        }
        debug!("Connect attempt abandoned, returning session to idle.");
        self.shared.abort_connect();
    }
}

/// Removes a command's entry from the pending table when `execute` returns or its
/// future is dropped.
pub(crate) struct PendingRequestGuard {
    shared: Arc<Shared>,
    tag: String,
}

impl PendingRequestGuard {
    pub(crate) fn new(shared: Arc<Shared>, tag: String) -> Self {
        Self { shared, tag }
    }

    pub(crate) fn tag(&self) -> &str {
        &self.tag
    }
}

impl Drop for PendingRequestGuard {
    fn drop(&mut self) {
        if self.shared.forget_request(&self.tag) {
            debug!("Request #{} left the table without a reply.", self.tag);
        }
    }
}

/// Owned by the read loop. Whatever way the loop ends, including a panic while
/// dispatching, dropping the guard tears the connection down with the recorded cause.
pub(crate) struct ReadLoopGuard {
    shared: Arc<Shared>,
    generation: u64,
    cause: ApiError,
}

impl ReadLoopGuard {
    pub(crate) fn new(shared: Arc<Shared>, generation: u64) -> Self {
        Self {
            shared,
            generation,
            cause: ApiError::Internal("read loop terminated unexpectedly".into()),
        }
    }

    pub(crate) fn shared(&self) -> &Shared {
        &self.shared
    }

    pub(crate) fn set_cause(&mut self, cause: ApiError) {
        self.cause = cause;
    }
}

impl Drop for ReadLoopGuard {
    fn drop(&mut self) {
        let cause = std::mem::replace(
            &mut self.cause,
            ApiError::Internal("read loop terminated unexpectedly".into()),
        );
        // A no-op when the loop was cancelled by a teardown that already happened.
        self.shared.disconnect(cause, self.generation);
    }
}
