// src/core/protocol/word.rs

//! The word layer of the API wire format.
//!
//! Every unit on the wire is a *word*: a self-describing length prefix followed by that
//! many payload bytes. A zero-length word terminates a sentence. The prefix uses one of
//! five widths, announced by the high bits of its leading byte:
//!
//! | length range              | bytes | leading marker |
//! |---------------------------|-------|----------------|
//! | `< 0x80`                  | 1     | `0xxxxxxx`     |
//! | `< 0x4000`                | 2     | `10xxxxxx`     |
//! | `< 0x20_0000`             | 3     | `110xxxxx`     |
//! | `< 0x1000_0000`           | 4     | `1110xxxx`     |
//! | otherwise                 | 5     | `11110000`     |
//!
//! Remaining bytes are big-endian.

use crate::core::ApiError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

const ONE_BYTE_LIMIT: u32 = 0x80;
const TWO_BYTE_LIMIT: u32 = 0x4000;
const THREE_BYTE_LIMIT: u32 = 0x20_0000;
const FOUR_BYTE_LIMIT: u32 = 0x1000_0000;

const TWO_BYTE_MARKER: u8 = 0x80;
const THREE_BYTE_MARKER: u8 = 0xC0;
const FOUR_BYTE_MARKER: u8 = 0xE0;
const FIVE_BYTE_MARKER: u8 = 0xF0;

/// Upper bound on a single incoming word. Protects against a corrupt prefix asking
/// the decoder to buffer gigabytes.
pub const MAX_WORD_LEN: u32 = 64 * 1024 * 1024;

/// Appends the length prefix for `len` to `dst`, using the shortest encoding.
pub fn encode_length(len: u32, dst: &mut BytesMut) {
    if len < ONE_BYTE_LIMIT {
        dst.put_u8(len as u8);
    } else if len < TWO_BYTE_LIMIT {
        dst.put_u16(len as u16 | ((TWO_BYTE_MARKER as u16) << 8));
    } else if len < THREE_BYTE_LIMIT {
        let [_, b2, b1, b0] = len.to_be_bytes();
        dst.put_slice(&[b2 | THREE_BYTE_MARKER, b1, b0]);
    } else if len < FOUR_BYTE_LIMIT {
        dst.put_u32(len | ((FOUR_BYTE_MARKER as u32) << 24));
    } else {
        dst.put_u8(FIVE_BYTE_MARKER);
        dst.put_u32(len);
    }
}

/// Returns the encoded prefix for `len` as its own buffer.
pub fn length_prefix(len: u32) -> Bytes {
    let mut buf = BytesMut::with_capacity(5);
    encode_length(len, &mut buf);
    buf.freeze()
}

/// Number of prefix bytes announced by a leading byte, or `None` for a byte that
/// matches no width class.
fn prefix_width(lead: u8) -> Option<usize> {
    match lead {
        0x00..=0x7F => Some(1),
        0x80..=0xBF => Some(2),
        0xC0..=0xDF => Some(3),
        0xE0..=0xEF => Some(4),
        FIVE_BYTE_MARKER => Some(5),
        _ => None,
    }
}

/// Decodes a length prefix from the front of `src` without consuming it.
///
/// Returns `Ok(None)` when `src` does not yet hold the whole prefix, and
/// `Ok(Some((length, prefix_bytes)))` otherwise.
pub fn decode_length(src: &[u8]) -> Result<Option<(u32, usize)>, ApiError> {
    let Some(&lead) = src.first() else {
        return Ok(None);
    };
    let width = prefix_width(lead).ok_or_else(|| {
        ApiError::Connection(format!("unrecognized length prefix byte 0x{lead:02X}"))
    })?;
    if src.len() < width {
        return Ok(None);
    }

    let len = match width {
        1 => lead as u32,
        2 => u16::from_be_bytes([src[0], src[1]]) as u32 ^ 0x8000,
        3 => u32::from_be_bytes([0, src[0], src[1], src[2]]) ^ 0x00C0_0000,
        4 => u32::from_be_bytes([src[0], src[1], src[2], src[3]]) ^ 0xE000_0000,
        _ => u32::from_be_bytes([src[1], src[2], src[3], src[4]]),
    };
    Ok(Some((len, width)))
}

/// Takes exactly `len` payload bytes from the front of `src`, or returns `None` and
/// leaves `src` untouched if fewer are buffered.
pub fn read_exact(src: &mut BytesMut, len: usize) -> Option<Bytes> {
    if src.len() < len {
        return None;
    }
    Some(src.split_to(len).freeze())
}

/// Decodes one complete word from `src`, consuming it.
///
/// Returns `Ok(None)` if more bytes are needed. An empty word decodes to an empty
/// string: the sentence terminator.
pub fn decode_word(src: &mut BytesMut) -> Result<Option<String>, ApiError> {
    let Some((len, width)) = decode_length(src)? else {
        return Ok(None);
    };
    if len > MAX_WORD_LEN {
        return Err(ApiError::InvalidResponse(format!(
            "word of {len} bytes exceeds the {MAX_WORD_LEN} byte limit"
        )));
    }
    if src.len() < width + len as usize {
        src.reserve(width + len as usize - src.len());
        return Ok(None);
    }

    src.advance(width);
    let payload = read_exact(src, len as usize).unwrap_or_default();
    Ok(Some(String::from_utf8_lossy(&payload).into_owned()))
}

/// Appends one word (prefix plus payload) to `dst`.
pub fn encode_word(word: &str, dst: &mut BytesMut) -> Result<(), ApiError> {
    let len = u32::try_from(word.len())
        .map_err(|_| ApiError::Internal(format!("word of {} bytes is too long", word.len())))?;
    dst.reserve(5 + word.len());
    encode_length(len, dst);
    dst.put_slice(word.as_bytes());
    Ok(())
}

/// Appends the zero-length terminator word.
pub fn encode_terminator(dst: &mut BytesMut) {
    dst.put_u8(0);
}
