// src/connection/session.rs

//! State shared between the public client, in-flight commands and the read loop.
//!
//! Everything mutable lives in one `SessionState` behind a single `parking_lot` mutex:
//! the live link (write half + cancellation token), the connection generation, the tag
//! counter and the pending-request table. The lock is only held for short, synchronous
//! edits and never across an `.await`, so the read loop and callers cannot deadlock.
//!
//! `disconnect` is the one teardown routine. Every session-ending error, whoever detects
//! it, goes through it, so all pending callers observe the same cause exactly once.

use super::reader;
use super::stream::RouterStream;
use crate::core::correlation::{CompletionReceiver, RouteOutcome};
use crate::core::protocol::{ApiCodec, ProtocolEvent};
use crate::core::{ApiError, RequestTable};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Default bound on establishing the TCP connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
/// Default bound on a single command (and on each login round trip).
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(20);

// How long a teardown waits to flush a graceful shutdown (TLS close_notify / FIN).
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

pub(crate) type ApiReader = FramedRead<ReadHalf<RouterStream>, ApiCodec>;
pub(crate) type ApiWriter = FramedWrite<WriteHalf<RouterStream>, ApiCodec>;
pub(crate) type SharedWriter = Arc<AsyncMutex<ApiWriter>>;

/// Timeouts applied by a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

/// A live connection.
struct Link {
    generation: u64,
    writer: SharedWriter,
    cancel: CancellationToken,
}

enum LinkState {
    Idle,
    Connecting,
    Live(Link),
}

struct SessionState {
    link: LinkState,
    /// Bumped every time a connection goes live. Lets stale actors (an old read loop,
    /// a command sent on a previous connection) recognize they must not tear down a
    /// newer link.
    generation: u64,
    requests: RequestTable,
}

pub(crate) struct Shared {
    state: Mutex<SessionState>,
}

impl Shared {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(SessionState {
                link: LinkState::Idle,
                generation: 0,
                requests: RequestTable::new(),
            }),
        })
    }

    /// Moves the session from idle to connecting.
    pub(crate) fn begin_connect(&self) -> Result<(), ApiError> {
        let mut state = self.state.lock();
        match state.link {
            LinkState::Idle => {
                state.link = LinkState::Connecting;
                Ok(())
            }
            LinkState::Connecting | LinkState::Live(_) => Err(ApiError::AlreadyConnected),
        }
    }

    /// Returns a connecting session to idle. Leaves a live link alone.
    pub(crate) fn abort_connect(&self) {
        let mut state = self.state.lock();
        if matches!(state.link, LinkState::Connecting) {
            state.link = LinkState::Idle;
        }
    }

    /// Installs a logged-in connection and starts its read loop.
    pub(crate) fn go_live(self: &Arc<Self>, reader: ApiReader, writer: ApiWriter) -> u64 {
        let cancel = CancellationToken::new();
        let generation = {
            let mut state = self.state.lock();
            state.generation += 1;
            let generation = state.generation;
            state.link = LinkState::Live(Link {
                generation,
                writer: Arc::new(AsyncMutex::new(writer)),
                cancel: cancel.clone(),
            });
            generation
        };
        tokio::spawn(reader::run(self.clone(), reader, cancel, generation));
        generation
    }

    pub(crate) fn live_generation(&self) -> Option<u64> {
        match &self.state.lock().link {
            LinkState::Live(link) => Some(link.generation),
            _ => None,
        }
    }

    /// The write half of the live connection and its generation.
    pub(crate) fn writer(&self) -> Result<(SharedWriter, u64), ApiError> {
        match &self.state.lock().link {
            LinkState::Live(link) => Ok((link.writer.clone(), link.generation)),
            _ => Err(ApiError::NotConnected),
        }
    }

    /// Allocates a tag and registers a pending request under it.
    pub(crate) fn register_request(&self) -> (String, CompletionReceiver) {
        self.state.lock().requests.register()
    }

    /// Removes a request entry if it is still present.
    pub(crate) fn forget_request(&self, tag: &str) -> bool {
        self.state.lock().requests.remove(tag)
    }

    pub(crate) fn pending_count(&self) -> usize {
        self.state.lock().requests.len()
    }

    /// Routes a reply event to its pending request.
    pub(crate) fn dispatch(&self, event: ProtocolEvent) -> RouteOutcome {
        self.state.lock().requests.route(event)
    }

    /// Tears the session down: fails every pending request with `cause`, cancels the
    /// read loop and drops the transport.
    ///
    /// Only acts if connection `generation` is still the live one, so a stale caller
    /// never touches a newer link. Idempotent.
    pub(crate) fn disconnect(&self, cause: ApiError, generation: u64) {
        let link = {
            let mut state = self.state.lock();
            match &state.link {
                LinkState::Live(link) if link.generation == generation => {}
                _ => return,
            }

            let failed = state.requests.fail_all(&cause);
            let link = match std::mem::replace(&mut state.link, LinkState::Idle) {
                LinkState::Live(link) => Some(link),
                other => {
                    state.link = other;
                    None
                }
            };
            if link.is_some() || failed > 0 {
                warn!("Session torn down ({cause}); failed {failed} pending command(s).");
            }
            link
        };

        if let Some(link) = link {
            link.cancel.cancel();
            shutdown_writer(link.writer);
        }
    }
}

/// Best-effort graceful close of the write half. Without a runtime (e.g. a client
/// dropped after its runtime shut down) the half is simply dropped.
fn shutdown_writer(writer: SharedWriter) {
    let Ok(handle) = tokio::runtime::Handle::try_current() else {
        return;
    };
    handle.spawn(async move {
        let result = tokio::time::timeout(SHUTDOWN_GRACE, async {
            let mut writer = writer.lock().await;
            writer.get_mut().shutdown().await
        })
        .await;
        if let Ok(Err(e)) = result {
            debug!("Error while shutting down transport: {e}");
        }
    });
}
