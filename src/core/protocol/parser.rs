// src/core/protocol/parser.rs

//! The response parser: a small state machine that folds a stream of words into
//! protocol events, one event per reply sentence.

use crate::core::ApiError;
use crate::core::row::{Attributes, render_attributes};
use std::fmt;

/// One reply sentence from the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolEvent {
    /// `!re`: one data row of a command's output.
    Data {
        tag: Option<String>,
        attributes: Attributes,
    },
    /// `!done`: the command finished; may carry final attributes (e.g. `ret`).
    Done {
        tag: Option<String>,
        attributes: Attributes,
    },
    /// `!trap`: the command was rejected.
    Trap {
        tag: Option<String>,
        attributes: Attributes,
    },
    /// `!fatal`: the router is closing the session.
    Fatal {
        tag: Option<String>,
        message: String,
    },
}

impl ProtocolEvent {
    pub fn tag(&self) -> Option<&str> {
        match self {
            ProtocolEvent::Data { tag, .. }
            | ProtocolEvent::Done { tag, .. }
            | ProtocolEvent::Trap { tag, .. }
            | ProtocolEvent::Fatal { tag, .. } => tag.as_deref(),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, ProtocolEvent::Done { .. })
    }
}

impl fmt::Display for ProtocolEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = self.tag().unwrap_or("-");
        match self {
            ProtocolEvent::Data { attributes, .. } => {
                write!(f, "[Data #{tag}] {}", render_attributes(attributes))
            }
            ProtocolEvent::Done { attributes, .. } => {
                write!(f, "[Done #{tag}] {}", render_attributes(attributes))
            }
            ProtocolEvent::Trap { attributes, .. } => {
                write!(f, "[Trap #{tag}] {}", render_attributes(attributes))
            }
            ProtocolEvent::Fatal { message, .. } => write!(f, "[Fatal #{tag}] {message}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ParserState {
    #[default]
    ReadingCode,
    ReadingData,
    ReadingDone,
    ReadingTrap,
    ReadingFatal,
}

/// Accumulates words until a full sentence is known.
#[derive(Debug, Default)]
pub struct ResponseParser {
    state: ParserState,
    tag: Option<String>,
    attributes: Attributes,
    /// Set after a fatal message was emitted; its terminator is still on the wire.
    skip_terminator: bool,
}

impl ResponseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no sentence is partially parsed.
    pub fn is_idle(&self) -> bool {
        self.state == ParserState::ReadingCode
    }

    /// Feeds one word. Returns the finished event when `word` completes a sentence.
    /// An empty word is the sentence terminator.
    ///
    /// A `!fatal` sentence carries exactly one payload word and is emitted as soon as
    /// that word arrives. The router may close the socket, or keep it open, without
    /// sending the terminator.
    pub fn feed(&mut self, word: &str) -> Result<Option<ProtocolEvent>, ApiError> {
        if std::mem::take(&mut self.skip_terminator) && word.is_empty() {
            return Ok(None);
        }
        match self.state {
            ParserState::ReadingCode => {
                self.state = match word {
                    "!re" => ParserState::ReadingData,
                    "!done" => ParserState::ReadingDone,
                    "!trap" => ParserState::ReadingTrap,
                    "!fatal" => ParserState::ReadingFatal,
                    other => {
                        return Err(ApiError::InvalidResponse(format!(
                            "unknown reply code '{other}'"
                        )));
                    }
                };
                Ok(None)
            }
            ParserState::ReadingFatal => {
                self.skip_terminator = !word.is_empty();
                Ok(Some(self.finish_fatal(word.to_string())))
            }
            _ if word.is_empty() => Ok(Some(self.finish())),
            _ => match self.push_attribute(word) {
                Ok(()) => Ok(None),
                Err(e) => {
                    *self = Self::default();
                    Err(e)
                }
            },
        }
    }

    /// Called when the stream ends. A `!fatal` code with nothing after it is still
    /// delivered, since the router closes right after sending it.
    pub fn finish_at_eof(&mut self) -> Option<ProtocolEvent> {
        if self.state == ParserState::ReadingFatal {
            Some(self.finish_fatal(String::new()))
        } else {
            None
        }
    }

    fn push_attribute(&mut self, word: &str) -> Result<(), ApiError> {
        let mut parts = word.splitn(3, '=');
        let key = parts.next().unwrap_or_default();
        if key == ".tag" {
            self.tag = parts.next().map(str::to_string);
            return Ok(());
        }
        match (parts.next(), parts.next()) {
            (Some(name), Some(value)) => {
                self.attributes.insert(name.to_string(), value.to_string());
                Ok(())
            }
            _ => Err(ApiError::InvalidResponse(format!(
                "malformed attribute word '{word}'"
            ))),
        }
    }

    fn finish_fatal(&mut self, message: String) -> ProtocolEvent {
        self.state = ParserState::ReadingCode;
        self.attributes.clear();
        ProtocolEvent::Fatal {
            tag: self.tag.take(),
            message,
        }
    }

    fn finish(&mut self) -> ProtocolEvent {
        let state = std::mem::take(&mut self.state);
        let tag = self.tag.take();
        let attributes = std::mem::take(&mut self.attributes);
        match state {
            ParserState::ReadingData => ProtocolEvent::Data { tag, attributes },
            ParserState::ReadingTrap => ProtocolEvent::Trap { tag, attributes },
            // Only reached from Data, Done or Trap.
            ParserState::ReadingDone | ParserState::ReadingCode | ParserState::ReadingFatal => {
                ProtocolEvent::Done { tag, attributes }
            }
        }
    }
}
