// src/connection/reader.rs

//! The background task that reads reply sentences and hands them to the correlation
//! table.

use super::guard::ReadLoopGuard;
use super::session::{ApiReader, Shared};
use crate::core::ApiError;
use crate::core::protocol::ProtocolEvent;
use futures::StreamExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Runs until the stream ends, a fatal sentence or decode error arrives, or the session
/// cancels it. Every exit except cancellation tears the connection down through the
/// guard, so no pending command is left waiting on a dead link.
pub(crate) async fn run(
    shared: Arc<Shared>,
    mut reader: ApiReader,
    cancel: CancellationToken,
    generation: u64,
) {
    let mut guard = ReadLoopGuard::new(shared, generation);
    debug!("Read loop started for connection #{generation}.");

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Read loop for connection #{generation} cancelled.");
                return;
            }
            next = reader.next() => next,
        };

        match next {
            Some(Ok(ProtocolEvent::Fatal { message, .. })) => {
                error!("Router sent a fatal error: {message}. Disconnecting.");
                guard.set_cause(ApiError::Fatal(message));
                return;
            }
            Some(Ok(event)) => {
                debug!("<<< {event}");
                guard.shared().dispatch(event);
            }
            Some(Err(e)) => {
                error!("Error reading reply from router: {e}. Disconnecting.");
                guard.set_cause(ApiError::Internal(e.to_string()));
                return;
            }
            None => {
                warn!("Router closed connection #{generation}.");
                guard.set_cause(ApiError::Internal(
                    "connection closed by router".into(),
                ));
                return;
            }
        }
    }
}
