// src/connection/client.rs

//! `ApiClient`, the public face of a session.

use super::guard::{ConnectAttemptGuard, PendingRequestGuard};
use super::login::login;
use super::session::{ApiReader, ApiWriter, SessionOptions, Shared};
use super::stream::RouterStream;
use super::tls::{AcceptAnyCertificate, CertificateValidator, server_name, tls_connector};
use crate::core::protocol::{ApiCodec, CommandSentence};
use crate::core::{ApiError, CommandResponse, Row};
use futures::SinkExt;
use std::sync::Arc;
use tokio::io::split;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, warn};

/// One authenticated API session to a router.
///
/// All methods take `&self`; wrap the client in an `Arc` to issue commands from many
/// tasks at once. Commands are multiplexed over the single connection by tag.
///
/// ```no_run
/// # async fn demo() -> Result<(), rosapi::ApiError> {
/// let client = rosapi::ApiClient::new();
/// client.connect("192.168.88.1", 8728, false, "admin", "").await?;
/// let rows = client.execute("/interface/print", &[("?type", "ether")]).await?;
/// for row in rows {
///     println!("{:?}", row.get("name"));
/// }
/// client.close();
/// # Ok(())
/// # }
/// ```
pub struct ApiClient {
    shared: Arc<Shared>,
    options: SessionOptions,
}

impl ApiClient {
    pub fn new() -> Self {
        Self::with_options(SessionOptions::default())
    }

    pub fn with_options(options: SessionOptions) -> Self {
        Self {
            shared: Shared::new(),
            options,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.shared.live_generation().is_some()
    }

    /// Number of commands currently waiting for a reply.
    pub fn pending_commands(&self) -> usize {
        self.shared.pending_count()
    }

    /// Connects and logs in. With `use_tls`, any server certificate is accepted; use
    /// `connect_with_validator` to check it.
    pub async fn connect(
        &self,
        host: &str,
        port: u16,
        use_tls: bool,
        username: &str,
        password: &str,
    ) -> Result<(), ApiError> {
        self.connect_with_validator(
            host,
            port,
            use_tls,
            username,
            password,
            Arc::new(AcceptAnyCertificate),
        )
        .await
    }

    /// Connects and logs in, letting `validator` decide whether the router's TLS
    /// certificate is trusted. The validator is ignored when `use_tls` is false.
    pub async fn connect_with_validator(
        &self,
        host: &str,
        port: u16,
        use_tls: bool,
        username: &str,
        password: &str,
        validator: Arc<dyn CertificateValidator>,
    ) -> Result<(), ApiError> {
        self.shared.begin_connect()?;
        let mut attempt = ConnectAttemptGuard::new(self.shared.clone());

        let stream = self.open_transport(host, port, use_tls, validator).await?;
        let transport = if stream.is_tls() { "TLS" } else { "TCP" };
        let (read_half, write_half) = split(stream);
        let mut reader: ApiReader = FramedRead::new(read_half, ApiCodec::new());
        let mut writer: ApiWriter = FramedWrite::new(write_half, ApiCodec::new());

        // On error both halves drop here, closing the socket.
        login(
            &mut reader,
            &mut writer,
            username,
            password,
            self.options.command_timeout,
        )
        .await?;

        let generation = self.shared.go_live(reader, writer);
        attempt.set_handed_off();
        info!("Session to {host}:{port} established over {transport} (connection #{generation}).");
        Ok(())
    }

    async fn open_transport(
        &self,
        host: &str,
        port: u16,
        use_tls: bool,
        validator: Arc<dyn CertificateValidator>,
    ) -> Result<RouterStream, ApiError> {
        info!("Connecting to router at {host}:{port}");
        let tcp = match timeout(self.options.connect_timeout, TcpStream::connect((host, port)))
            .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(ApiError::Connection(format!(
                    "Failed to connect to {host}:{port}: {e}"
                )));
            }
            Err(_) => {
                return Err(ApiError::Connection(format!(
                    "Timed out connecting to {host}:{port} after {:?}",
                    self.options.connect_timeout
                )));
            }
        };
        tcp.set_nodelay(true)?;

        if !use_tls {
            return Ok(RouterStream::Tcp(tcp));
        }

        debug!("Establishing TLS session with {host}:{port}");
        let connector = tls_connector(validator)?;
        let domain = server_name(host)?;
        let tls = match timeout(self.options.connect_timeout, connector.connect(domain, tcp)).await
        {
            Ok(Ok(tls)) => tls,
            Ok(Err(e)) => return Err(ApiError::Tls(format!("TLS handshake failed: {e}"))),
            Err(_) => {
                return Err(ApiError::Tls(format!(
                    "Timed out during TLS handshake with {host}:{port} after {:?}",
                    self.options.connect_timeout
                )));
            }
        };
        Ok(RouterStream::Tls(Box::new(tls)))
    }

    /// Closes the session, failing every pending command. A no-op when not connected.
    pub fn close(&self) {
        if let Some(generation) = self.shared.live_generation() {
            info!("Closing session (connection #{generation}).");
            self.shared.disconnect(
                ApiError::Connection("disconnected by client".into()),
                generation,
            );
        }
    }

    /// Writes one command sentence without waiting for a reply.
    pub async fn send(
        &self,
        command: &str,
        tag: Option<&str>,
        attributes: &[(&str, &str)],
    ) -> Result<(), ApiError> {
        let mut sentence = CommandSentence::new(command).with_attributes(attributes);
        sentence.tag = tag.map(str::to_string);

        let (writer, _) = self.shared.writer()?;
        debug!(">>> {command} #{}", tag.unwrap_or("-"));
        writer.lock().await.send(sentence).await
    }

    /// Runs a command and returns its data rows.
    pub async fn execute(
        &self,
        command: &str,
        attributes: &[(&str, &str)],
    ) -> Result<Vec<Row>, ApiError> {
        Ok(self.execute_ex(command, attributes).await?.rows)
    }

    /// Runs a command and returns its data rows together with the attributes of its
    /// final `!done` reply.
    ///
    /// A trap fails only this command. A timeout, transport error or any other failure
    /// tears the whole session down, since every command shares the one stream.
    pub async fn execute_ex(
        &self,
        command: &str,
        attributes: &[(&str, &str)],
    ) -> Result<CommandResponse, ApiError> {
        let (tag, completion) = self.shared.register_request();
        let request = PendingRequestGuard::new(self.shared.clone(), tag);
        let (writer, generation) = self.shared.writer()?;

        let sentence = CommandSentence::new(command)
            .with_tag(request.tag())
            .with_attributes(attributes);
        debug!(">>> {command} #{}", request.tag());

        let outcome = timeout(self.options.command_timeout, async {
            writer.lock().await.send(sentence).await?;
            completion.await.unwrap_or_else(|_| {
                Err(ApiError::Internal(
                    "request was dropped without a reply".into(),
                ))
            })
        })
        .await
        .unwrap_or(Err(ApiError::Timeout));
        drop(request);

        match outcome {
            Ok(response) => Ok(response),
            Err(e @ ApiError::Trap { .. }) => Err(e),
            Err(ApiError::Timeout) => {
                warn!("Command '{command}' timed out, disconnecting.");
                self.shared.disconnect(ApiError::Timeout, generation);
                Err(ApiError::Timeout)
            }
            Err(e) => {
                self.shared
                    .disconnect(ApiError::Internal(e.to_string()), generation);
                Err(e)
            }
        }
    }
}

impl Default for ApiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ApiClient {
    fn drop(&mut self) {
        if let Some(generation) = self.shared.live_generation() {
            self.shared.disconnect(
                ApiError::Connection("session dropped".into()),
                generation,
            );
        }
    }
}
