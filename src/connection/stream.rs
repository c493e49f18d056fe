// src/connection/stream.rs

//! The byte stream a session runs over. The codec and read loop only see
//! `AsyncRead + AsyncWrite`, so TCP and TLS sessions share every code path above this.

use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

/// The transport under a session: plain TCP to the API port (8728 by default) or
/// TLS over TCP to the API-SSL port (8729).
///
/// The TLS stream is boxed since its buffers dwarf a bare `TcpStream`.
pub enum RouterStream {
    Tcp(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl RouterStream {
    /// Whether the handshake upgraded this connection, for the "established over" log.
    pub fn is_tls(&self) -> bool {
        matches!(self, RouterStream::Tls(_))
    }
}

impl AsyncRead for RouterStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            RouterStream::Tcp(s) => Pin::new(s).poll_read(cx, buf),
            RouterStream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for RouterStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<Result<usize, std::io::Error>> {
        match self.get_mut() {
            RouterStream::Tcp(s) => Pin::new(s).poll_write(cx, buf),
            RouterStream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), std::io::Error>> {
        match self.get_mut() {
            RouterStream::Tcp(s) => Pin::new(s).poll_flush(cx),
            RouterStream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<(), std::io::Error>> {
        match self.get_mut() {
            RouterStream::Tcp(s) => Pin::new(s).poll_shutdown(cx),
            RouterStream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}
