// src/connection/mod.rs

//! Owns the socket side of a session: transport setup (TCP or TLS), login, the
//! background read loop and the single teardown path.

mod client;
mod guard;
mod login;
mod reader;
mod session;
mod stream;
pub mod tls;

pub use client::ApiClient;
pub use session::{DEFAULT_COMMAND_TIMEOUT, DEFAULT_CONNECT_TIMEOUT, SessionOptions};
pub use stream::RouterStream;
pub use tls::{AcceptAnyCertificate, CertificateValidator, WebPkiCertificateValidator};
