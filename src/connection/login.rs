// src/connection/login.rs

//! The `/login` handshake, run directly on the fresh stream before the read loop exists.

use super::session::{ApiReader, ApiWriter};
use crate::core::ApiError;
use crate::core::auth;
use crate::core::protocol::{CommandSentence, ProtocolEvent};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info};

const LOGIN_COMMAND: &str = "/login";

/// Logs in with `username`/`password`.
///
/// Newer routers accept the plain credentials and answer `!done`. Older ones answer
/// `!done` with a `ret` challenge, which is answered with the MD5 challenge response.
/// Anything other than `!done` at either step is reported as invalid credentials.
pub(crate) async fn login(
    reader: &mut ApiReader,
    writer: &mut ApiWriter,
    username: &str,
    password: &str,
    reply_timeout: Duration,
) -> Result<(), ApiError> {
    let first = CommandSentence::new(LOGIN_COMMAND)
        .with_attributes(&[("name", username), ("password", password)]);
    let reply = round_trip(reader, writer, first, reply_timeout).await?;

    let attributes = match reply {
        ProtocolEvent::Done { attributes, .. } => attributes,
        other => {
            debug!("Login rejected: {other}");
            return Err(ApiError::InvalidCredentials);
        }
    };

    let Some(challenge) = attributes.get("ret") else {
        info!("Logged in as '{username}'.");
        return Ok(());
    };

    debug!("Router requested a challenge-response login.");
    let response = auth::login_response(password, challenge)?;
    let second = CommandSentence::new(LOGIN_COMMAND)
        .with_attributes(&[("name", username), ("response", response.as_str())]);
    let reply = round_trip(reader, writer, second, reply_timeout).await?;

    if !reply.is_done() {
        debug!("Challenge-response login rejected: {reply}");
        return Err(ApiError::InvalidCredentials);
    }
    info!("Logged in as '{username}' (challenge-response).");
    Ok(())
}

/// Writes one sentence and reads exactly one reply.
async fn round_trip(
    reader: &mut ApiReader,
    writer: &mut ApiWriter,
    sentence: CommandSentence,
    reply_timeout: Duration,
) -> Result<ProtocolEvent, ApiError> {
    writer.send(sentence).await?;
    match timeout(reply_timeout, reader.next()).await {
        Ok(Some(reply)) => reply,
        Ok(None) => Err(ApiError::Connection(
            "connection closed during login".into(),
        )),
        Err(_) => Err(ApiError::Timeout),
    }
}
