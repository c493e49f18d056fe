// src/core/mod.rs

//! Protocol-level building blocks: the wire codec, the response parser, the login
//! digest, and the request correlation table. Nothing here touches a socket.

pub mod auth;
pub mod correlation;
pub mod errors;
pub mod protocol;
pub mod row;

pub use correlation::{CommandResponse, RequestTable};
pub use errors::ApiError;
pub use row::{Attributes, Row};
