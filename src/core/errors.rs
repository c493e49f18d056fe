// src/core/errors.rs

//! Defines the error type shared by the codec, the session and the public API.

use crate::core::row::Attributes;
use std::sync::Arc;
use thiserror::Error;

/// Every failure the client can surface to a caller.
///
/// Session-ending variants (`Connection`, `Fatal`, `Timeout`, `Internal`) are delivered
/// to every in-flight command through the single teardown path, so the enum must be
/// cheaply cloneable.
#[derive(Error, Debug, Clone)]
pub enum ApiError {
    #[error("Session is already connected")]
    AlreadyConnected,

    #[error("Session is not connected")]
    NotConnected,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Invalid response from router: {0}")]
    InvalidResponse(String),

    #[error("Connection error: {0}")]
    Connection(String),

    /// The router rejected one command. Does not end the session.
    #[error("Command rejected: {message}")]
    Trap {
        message: String,
        attributes: Attributes,
    },

    /// The router sent a `!fatal` sentence and closed the session.
    #[error("Fatal error from router: {0}")]
    Fatal(String),

    #[error("Command timed out")]
    Timeout,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("TLS error: {0}")]
    Tls(String),
}

impl ApiError {
    /// Returns true for errors that only affect the command that produced them.
    pub fn is_command_local(&self) -> bool {
        matches!(self, ApiError::Trap { .. })
    }
}

// `std::io::Error` has no `PartialEq`; compare it by its rendered message.
impl PartialEq for ApiError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ApiError::Io(e1), ApiError::Io(e2)) => e1.to_string() == e2.to_string(),
            (ApiError::InvalidResponse(s1), ApiError::InvalidResponse(s2)) => s1 == s2,
            (ApiError::Connection(s1), ApiError::Connection(s2)) => s1 == s2,
            (
                ApiError::Trap {
                    message: m1,
                    attributes: a1,
                },
                ApiError::Trap {
                    message: m2,
                    attributes: a2,
                },
            ) => m1 == m2 && a1 == a2,
            (ApiError::Fatal(s1), ApiError::Fatal(s2)) => s1 == s2,
            (ApiError::Internal(s1), ApiError::Internal(s2)) => s1 == s2,
            (ApiError::Tls(s1), ApiError::Tls(s2)) => s1 == s2,
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

// --- From trait implementations for easy error conversion ---

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        ApiError::Io(Arc::new(e))
    }
}

impl From<tokio_rustls::rustls::Error> for ApiError {
    fn from(e: tokio_rustls::rustls::Error) -> Self {
        ApiError::Tls(e.to_string())
    }
}

impl From<hex::FromHexError> for ApiError {
    fn from(e: hex::FromHexError) -> Self {
        ApiError::InvalidResponse(format!("malformed login challenge: {e}"))
    }
}
