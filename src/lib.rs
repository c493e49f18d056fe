// src/lib.rs

pub mod config;
pub mod connection;
pub mod core;

// Re-export
pub use crate::connection::{ApiClient, SessionOptions};
pub use crate::core::{ApiError, Attributes, CommandResponse, Row};
