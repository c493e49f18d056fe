// src/core/protocol/mod.rs

pub mod codec;
pub mod parser;
pub mod sentence;
pub mod word;

pub use codec::ApiCodec;
pub use parser::{ProtocolEvent, ResponseParser};
pub use sentence::{CommandSentence, build_packet};
