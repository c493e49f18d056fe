// src/core/correlation.rs

//! Tracks in-flight commands by tag and routes reply events to their callers.
//!
//! The table itself does no locking and no I/O; the session keeps it behind its guard
//! together with the live connection, so tag allocation, routing and teardown are all
//! serialized by that one lock.
//!
//! Each pending request owns a `oneshot` sender wrapped in an `Option`. Resolving takes
//! the sender out, so a request is resolved at most once even when a natural completion
//! races a teardown.

use crate::core::ApiError;
use crate::core::protocol::ProtocolEvent;
use crate::core::row::{Attributes, Row, render_attributes};
use std::collections::HashMap;
use tokio::sync::oneshot;
use tracing::debug;

/// The full result of a command: its data rows plus the attributes of its `!done`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandResponse {
    pub rows: Vec<Row>,
    pub attributes: Attributes,
}

pub type Completion = Result<CommandResponse, ApiError>;
pub type CompletionReceiver = oneshot::Receiver<Completion>;

/// One command awaiting its `!done` or `!trap`.
#[derive(Debug)]
struct PendingRequest {
    rows: Vec<Row>,
    completion: Option<oneshot::Sender<Completion>>,
}

impl PendingRequest {
    fn new() -> (Self, CompletionReceiver) {
        let (tx, rx) = oneshot::channel();
        let request = Self {
            rows: Vec::new(),
            completion: Some(tx),
        };
        (request, rx)
    }

    /// Resolves the completion signal unless it was already resolved.
    fn resolve(&mut self, result: Completion) {
        if let Some(tx) = self.completion.take() {
            // The caller may have given up (timeout); nothing to do then.
            let _ = tx.send(result);
        }
    }
}

/// What happened to a routed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// A data row was appended to a pending request.
    Appended,
    /// A pending request finished successfully.
    Completed,
    /// A pending request was rejected by a trap.
    Rejected,
    /// No request is registered under the event's tag.
    Discarded,
}

/// The tag counter and the table of in-flight commands.
#[derive(Debug, Default)]
pub struct RequestTable {
    last_tag: u64,
    pending: HashMap<String, PendingRequest>,
}

impl RequestTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next tag and registers a pending request under it.
    pub fn register(&mut self) -> (String, CompletionReceiver) {
        self.last_tag += 1;
        let tag = self.last_tag.to_string();
        let (request, rx) = PendingRequest::new();
        self.pending.insert(tag.clone(), request);
        (tag, rx)
    }

    /// Drops the entry for `tag`, if still present. Returns whether it was.
    pub fn remove(&mut self, tag: &str) -> bool {
        self.pending.remove(tag).is_some()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.pending.contains_key(tag)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// The most recently allocated tag, `0` before the first command.
    pub fn last_tag(&self) -> u64 {
        self.last_tag
    }

    /// Delivers a `!re`, `!done` or `!trap` event to the request it belongs to.
    ///
    /// Events with no matching request are late or unsolicited replies and are
    /// discarded. `Fatal` events are never routed here; they end the session.
    pub fn route(&mut self, event: ProtocolEvent) -> RouteOutcome {
        let Some(tag) = event.tag().map(str::to_string) else {
            debug!("Discarding untagged reply: {event}");
            return RouteOutcome::Discarded;
        };
        if !self.pending.contains_key(&tag) {
            debug!("Discarding reply for unknown tag {tag}: {event}");
            return RouteOutcome::Discarded;
        }

        match event {
            ProtocolEvent::Data { attributes, .. } => {
                if let Some(request) = self.pending.get_mut(&tag) {
                    request.rows.push(Row::new(attributes));
                }
                RouteOutcome::Appended
            }
            ProtocolEvent::Done { attributes, .. } => {
                if let Some(mut request) = self.pending.remove(&tag) {
                    let rows = std::mem::take(&mut request.rows);
                    request.resolve(Ok(CommandResponse { rows, attributes }));
                }
                RouteOutcome::Completed
            }
            ProtocolEvent::Trap { attributes, .. } => {
                if let Some(mut request) = self.pending.remove(&tag) {
                    request.resolve(Err(ApiError::Trap {
                        message: render_attributes(&attributes),
                        attributes,
                    }));
                }
                RouteOutcome::Rejected
            }
            ProtocolEvent::Fatal { .. } => RouteOutcome::Discarded,
        }
    }

    /// Resolves every pending request with `cause` and empties the table.
    /// Returns how many requests were failed.
    pub fn fail_all(&mut self, cause: &ApiError) -> usize {
        let failed = self.pending.len();
        for (_, mut request) in self.pending.drain() {
            request.resolve(Err(cause.clone()));
        }
        failed
    }
}
