// src/config.rs

//! Client configuration: loading from TOML, defaults, and validation.

use crate::connection::{
    AcceptAnyCertificate, CertificateValidator, DEFAULT_COMMAND_TIMEOUT, DEFAULT_CONNECT_TIMEOUT,
    SessionOptions, WebPkiCertificateValidator,
};
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::sync::Arc;
use std::time::Duration;

/// The API service's plain-text port.
pub const DEFAULT_API_PORT: u16 = 8728;
/// The API-SSL service's port.
pub const DEFAULT_API_SSL_PORT: u16 = 8729;

/// How the router's TLS certificate is checked.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CertificateVerification {
    /// Accept any certificate (routers usually run self-signed ones).
    #[default]
    None,
    /// Validate against the bundled WebPKI roots.
    Webpki,
    /// Validate against the CA certificates in `ca_path`.
    CaFile,
}

/// TLS settings for API-SSL.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub verify: CertificateVerification,
    /// PEM bundle used when `verify = "ca-file"`.
    #[serde(default)]
    pub ca_path: Option<String>,
}

/// The resolved client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub tls: TlsConfig,
    pub username: String,
    pub password: String,
    pub log_level: String,
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: DEFAULT_API_PORT,
            tls: TlsConfig::default(),
            username: default_username(),
            password: String::new(),
            log_level: default_log_level(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

/// A raw representation of the config file before defaults are resolved.
#[derive(Deserialize)]
struct RawConfig {
    #[serde(default = "default_host")]
    host: String,
    /// Left unset, the port follows `tls.enabled`.
    port: Option<u16>,
    #[serde(default)]
    tls: TlsConfig,
    #[serde(default = "default_username")]
    username: String,
    #[serde(default)]
    password: String,
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(with = "humantime_serde", default = "default_connect_timeout")]
    connect_timeout: Duration,
    #[serde(with = "humantime_serde", default = "default_command_timeout")]
    command_timeout: Duration,
}

fn default_host() -> String {
    "192.168.88.1".to_string()
}
fn default_username() -> String {
    "admin".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_connect_timeout() -> Duration {
    DEFAULT_CONNECT_TIMEOUT
}
fn default_command_timeout() -> Duration {
    DEFAULT_COMMAND_TIMEOUT
}

impl Config {
    /// Reads, parses and validates a TOML config file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        Self::from_toml(&contents).with_context(|| format!("Invalid config in '{path}'"))
    }

    /// Parses and validates a TOML document.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(contents).context("Failed to parse TOML")?;

        let port = raw.port.unwrap_or(if raw.tls.enabled {
            DEFAULT_API_SSL_PORT
        } else {
            DEFAULT_API_PORT
        });

        let config = Config {
            host: raw.host,
            port,
            tls: raw.tls,
            username: raw.username,
            password: raw.password,
            log_level: raw.log_level,
            connect_timeout: raw.connect_timeout,
            command_timeout: raw.command_timeout,
        };

        config.validate()?;
        Ok(config)
    }

    /// Checks the resolved configuration for logical consistency.
    fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(anyhow!("host cannot be empty"));
        }
        if self.port == 0 {
            return Err(anyhow!("port cannot be 0"));
        }
        if self.connect_timeout.is_zero() {
            return Err(anyhow!("connect_timeout must be greater than zero"));
        }
        if self.command_timeout.is_zero() {
            return Err(anyhow!("command_timeout must be greater than zero"));
        }
        if self.tls.verify == CertificateVerification::CaFile && self.tls.ca_path.is_none() {
            return Err(anyhow!("tls.ca_path is required when tls.verify = \"ca-file\""));
        }
        Ok(())
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            connect_timeout: self.connect_timeout,
            command_timeout: self.command_timeout,
        }
    }

    /// Builds the certificate validator selected by `tls.verify`.
    pub fn certificate_validator(&self) -> Result<Arc<dyn CertificateValidator>> {
        let validator: Arc<dyn CertificateValidator> = match self.tls.verify {
            CertificateVerification::None => Arc::new(AcceptAnyCertificate),
            CertificateVerification::Webpki => {
                Arc::new(WebPkiCertificateValidator::with_webpki_roots()?)
            }
            CertificateVerification::CaFile => {
                let path = self
                    .tls
                    .ca_path
                    .as_deref()
                    .ok_or_else(|| anyhow!("tls.ca_path is not set"))?;
                Arc::new(WebPkiCertificateValidator::from_pem_file(path)?)
            }
        };
        Ok(validator)
    }
}
