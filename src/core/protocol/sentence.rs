// src/core/protocol/sentence.rs

//! Outgoing command sentences.

use super::word::{encode_terminator, encode_word};
use crate::core::ApiError;
use bytes::{Bytes, BytesMut};

/// A command ready to be written to the router: `/path/verb`, an optional correlation
/// tag, and its attribute words in caller order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSentence {
    pub command: String,
    pub tag: Option<String>,
    pub attributes: Vec<(String, String)>,
}

impl CommandSentence {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            tag: None,
            attributes: Vec::new(),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_attributes<K, V>(mut self, attributes: &[(K, V)]) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.attributes.extend(
            attributes
                .iter()
                .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string())),
        );
        self
    }

    /// Encodes the sentence into `dst`.
    pub fn write_to(&self, dst: &mut BytesMut) -> Result<(), ApiError> {
        encode_word(&self.command, dst)?;

        if let Some(tag) = &self.tag {
            encode_word(&format!(".tag={tag}"), dst)?;
        }

        for (name, value) in &self.attributes {
            encode_word(&attribute_word(name, value), dst)?;
        }

        encode_terminator(dst);
        Ok(())
    }

    /// Encodes the sentence into a standalone packet.
    pub fn encode_to_bytes(&self) -> Result<Bytes, ApiError> {
        let mut buf = BytesMut::new();
        self.write_to(&mut buf)?;
        Ok(buf.freeze())
    }
}

/// Formats one attribute word. Query words (`?name`) keep their own marker, everything
/// else is sent as `=name=value`.
fn attribute_word(name: &str, value: &str) -> String {
    if name.starts_with('?') {
        format!("{name}={value}")
    } else {
        format!("={name}={value}")
    }
}

/// Builds a complete command packet: command word, optional `.tag=<tag>` word, one word
/// per attribute, then the zero-length terminator.
pub fn build_packet(
    command: &str,
    tag: Option<&str>,
    attributes: &[(&str, &str)],
) -> Result<Bytes, ApiError> {
    let mut sentence = CommandSentence::new(command).with_attributes(attributes);
    sentence.tag = tag.map(str::to_string);
    sentence.encode_to_bytes()
}
