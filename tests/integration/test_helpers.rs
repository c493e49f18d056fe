// tests/integration/test_helpers.rs

//! A scripted in-process router for integration tests.
//!
//! Each test spawns a listener on an ephemeral port and hands the accepted connection
//! to an async script that reads command sentences and writes replies, using the
//! crate's own word codec.

#![allow(dead_code)]

use bytes::BytesMut;
use rosapi::core::protocol::word::{decode_word, encode_terminator, encode_word};
use rosapi::{ApiClient, SessionOptions};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Once;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "secret";
pub const CHALLENGE: &str = "ebddd18303a54111e2dea05a92ab46b4";
/// `"00" + md5(0x00 ++ "secret" ++ CHALLENGE)`.
pub const CHALLENGE_RESPONSE: &str = "007319531c22b6b85e160d6ac355c1df2e";

static TRACING: Once = Once::new();

/// Installs a quiet test subscriber once per test binary.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("warn"))
            .with_test_writer()
            .try_init();
    });
}

/// One command sentence as received by the mock router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedCommand {
    pub command: String,
    pub tag: Option<String>,
    /// Attribute words with their `=`/`?` prefix stripped into `(name, value)`.
    pub attributes: Vec<(String, String)>,
    /// The raw words, command first, terminator excluded.
    pub words: Vec<String>,
}

impl ReceivedCommand {
    fn from_words(words: Vec<String>) -> Self {
        let command = words.first().cloned().unwrap_or_default();
        let mut tag = None;
        let mut attributes = Vec::new();
        for word in words.iter().skip(1) {
            if let Some(value) = word.strip_prefix(".tag=") {
                tag = Some(value.to_string());
            } else if let Some(rest) = word.strip_prefix('=') {
                let (name, value) = rest.split_once('=').unwrap_or((rest, ""));
                attributes.push((name.to_string(), value.to_string()));
            } else if let Some((name, value)) = word.split_once('=') {
                attributes.push((name.to_string(), value.to_string()));
            }
        }
        Self {
            command,
            tag,
            attributes,
            words,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn tag(&self) -> &str {
        self.tag.as_deref().expect("command carries a tag")
    }
}

/// The router side of one accepted connection.
pub struct RouterConn {
    stream: TcpStream,
    buf: BytesMut,
}

impl RouterConn {
    /// Reads the next command sentence. `None` once the client has closed the socket.
    pub async fn read_command(&mut self) -> Option<ReceivedCommand> {
        let mut words = Vec::new();
        loop {
            while let Some(word) = decode_word(&mut self.buf).expect("valid word framing") {
                if word.is_empty() {
                    return Some(ReceivedCommand::from_words(words));
                }
                words.push(word);
            }
            match self.stream.read_buf(&mut self.buf).await {
                Ok(0) | Err(_) => return None,
                Ok(_) => {}
            }
        }
    }

    /// Writes raw words followed by the terminator.
    pub async fn write_sentence(&mut self, words: &[&str]) {
        let mut out = BytesMut::new();
        for word in words {
            encode_word(word, &mut out).expect("word fits");
        }
        encode_terminator(&mut out);
        let _ = self.stream.write_all(&out).await;
    }

    /// Writes arbitrary bytes, for malformed-stream tests.
    pub async fn write_raw(&mut self, bytes: &[u8]) {
        let _ = self.stream.write_all(bytes).await;
    }

    async fn reply(&mut self, code: &str, tag: Option<&str>, attributes: &[(&str, &str)]) {
        let mut words = vec![code.to_string()];
        if let Some(tag) = tag {
            words.push(format!(".tag={tag}"));
        }
        words.extend(attributes.iter().map(|(k, v)| format!("={k}={v}")));
        let refs: Vec<&str> = words.iter().map(String::as_str).collect();
        self.write_sentence(&refs).await;
    }

    pub async fn reply_re(&mut self, tag: &str, attributes: &[(&str, &str)]) {
        self.reply("!re", Some(tag), attributes).await;
    }

    pub async fn reply_done(&mut self, tag: &str, attributes: &[(&str, &str)]) {
        self.reply("!done", Some(tag), attributes).await;
    }

    pub async fn reply_trap(&mut self, tag: &str, attributes: &[(&str, &str)]) {
        self.reply("!trap", Some(tag), attributes).await;
    }

    pub async fn reply_fatal(&mut self, message: &str) {
        self.write_sentence(&["!fatal", message]).await;
    }

    /// Answers a plain `/login` with `!done`.
    pub async fn accept_login(&mut self) -> ReceivedCommand {
        let login = self.read_command().await.expect("login sentence");
        assert_eq!(login.command, "/login");
        self.write_sentence(&["!done"]).await;
        login
    }

    /// Runs the challenge-response login and checks the digest the client sent.
    pub async fn accept_challenge_login(&mut self) {
        let first = self.read_command().await.expect("first login sentence");
        assert_eq!(first.command, "/login");
        self.write_sentence(&["!done", &format!("=ret={CHALLENGE}")])
            .await;

        let second = self.read_command().await.expect("second login sentence");
        assert_eq!(second.command, "/login");
        assert_eq!(second.attribute("name"), Some(USERNAME));
        assert_eq!(second.attribute("response"), Some(CHALLENGE_RESPONSE));
        self.write_sentence(&["!done"]).await;
    }

    /// Keeps reading until the client goes away.
    pub async fn drain(&mut self) {
        while self.read_command().await.is_some() {}
    }
}

/// A mock router listening on an ephemeral port, serving a single connection.
pub struct MockRouter {
    pub addr: SocketAddr,
    pub task: JoinHandle<()>,
}

impl MockRouter {
    pub async fn spawn<F, Fut>(script: F) -> Self
    where
        F: FnOnce(RouterConn) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        init_tracing();
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let task = tokio::spawn(async move {
            if let Ok((stream, _)) = listener.accept().await {
                script(RouterConn {
                    stream,
                    buf: BytesMut::with_capacity(4096),
                })
                .await;
            }
        });
        Self { addr, task }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Waits for the script to finish, surfacing any assertion it failed.
    pub async fn finish(self) {
        tokio::time::timeout(Duration::from_secs(5), self.task)
            .await
            .expect("router script finished in time")
            .expect("router script succeeded");
    }
}

/// A client with a short command timeout so failure tests stay fast.
pub fn test_client() -> ApiClient {
    ApiClient::with_options(SessionOptions {
        connect_timeout: Duration::from_secs(2),
        command_timeout: Duration::from_secs(5),
    })
}

pub async fn connect(client: &ApiClient, router: &MockRouter) {
    client
        .connect("127.0.0.1", router.port(), false, USERNAME, PASSWORD)
        .await
        .expect("connect to mock router");
}

/// Polls until the session reports disconnected, for teardowns that happen on the
/// read loop task.
pub async fn wait_disconnected(client: &ApiClient) {
    for _ in 0..200 {
        if !client.is_connected() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("session did not disconnect");
}
