// src/core/protocol/codec.rs

//! `tokio_util::codec` glue: decodes reply sentences into `ProtocolEvent`s and encodes
//! `CommandSentence`s.

use super::parser::{ProtocolEvent, ResponseParser};
use super::sentence::CommandSentence;
use super::word::decode_word;
use crate::core::ApiError;
use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

/// A codec for one side of an API connection.
///
/// The decoder keeps a `ResponseParser` between calls, so a sentence may arrive split
/// across any number of reads.
#[derive(Debug, Default)]
pub struct ApiCodec {
    parser: ResponseParser,
}

impl ApiCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for ApiCodec {
    type Item = ProtocolEvent;
    type Error = ApiError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        while let Some(word) = decode_word(src)? {
            if let Some(event) = self.parser.feed(&word)? {
                return Ok(Some(event));
            }
        }
        Ok(None)
    }

    /// Anything left over when the stream closes means the peer hung up mid-sentence.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(event) = self.decode(src)? {
            return Ok(Some(event));
        }
        if let Some(event) = self.parser.finish_at_eof() {
            return Ok(Some(event));
        }
        if src.is_empty() && self.parser.is_idle() {
            return Ok(None);
        }
        Err(ApiError::Connection(
            "stream closed in the middle of a sentence".into(),
        ))
    }
}

impl Encoder<CommandSentence> for ApiCodec {
    type Error = ApiError;

    fn encode(&mut self, item: CommandSentence, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.write_to(dst)
    }
}
