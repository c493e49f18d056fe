// src/connection/tls.rs

//! TLS setup for API-SSL sessions.
//!
//! Routers usually present self-signed certificates, so the session defaults to
//! accepting any certificate. Callers that need real validation pass their own
//! `CertificateValidator`, or one of the WebPKI-backed validators below.

use crate::core::ApiError;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tokio_rustls::TlsConnector;
use tokio_rustls::rustls;
use tokio_rustls::rustls::client::WebPkiServerVerifier;
use tokio_rustls::rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use tokio_rustls::rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use tokio_rustls::rustls::{DigitallySignedStruct, RootCertStore, SignatureScheme};

/// Decides whether a server certificate chain is acceptable.
///
/// Handshake signatures are always checked by the crypto provider; this trait only makes
/// the trust decision. Plain closures with the matching signature implement it.
pub trait CertificateValidator: Send + Sync {
    fn validate(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
    ) -> bool;
}

impl<F> CertificateValidator for F
where
    F: Fn(&CertificateDer<'_>, &[CertificateDer<'_>], &ServerName<'_>) -> bool + Send + Sync,
{
    fn validate(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
    ) -> bool {
        self(end_entity, intermediates, server_name)
    }
}

/// Accepts every certificate. The default for `ApiClient::connect`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAnyCertificate;

impl CertificateValidator for AcceptAnyCertificate {
    fn validate(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
    ) -> bool {
        true
    }
}

/// Standard chain and hostname validation against a root store.
#[derive(Debug, Clone)]
pub struct WebPkiCertificateValidator {
    verifier: Arc<WebPkiServerVerifier>,
}

impl WebPkiCertificateValidator {
    /// Trusts the Mozilla root program bundled in `webpki-roots`.
    pub fn with_webpki_roots() -> Result<Self, ApiError> {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        Self::from_roots(roots)
    }

    /// Trusts the CA certificates found in a PEM file, e.g. the router's own CA.
    pub fn from_pem_file(path: impl AsRef<Path>) -> Result<Self, ApiError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            ApiError::Tls(format!(
                "Failed to open CA file '{}': {e}",
                path.display()
            ))
        })?;
        let mut reader = BufReader::new(file);

        let mut roots = RootCertStore::empty();
        for cert in rustls_pemfile::certs(&mut reader) {
            roots.add(cert?)?;
        }
        if roots.is_empty() {
            return Err(ApiError::Tls(format!(
                "No certificates found in '{}'",
                path.display()
            )));
        }
        Self::from_roots(roots)
    }

    pub fn from_roots(roots: RootCertStore) -> Result<Self, ApiError> {
        let verifier = WebPkiServerVerifier::builder_with_provider(Arc::new(roots), crypto_provider())
            .build()
            .map_err(|e| ApiError::Tls(e.to_string()))?;
        Ok(Self { verifier })
    }
}

impl CertificateValidator for WebPkiCertificateValidator {
    fn validate(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
    ) -> bool {
        self.verifier
            .verify_server_cert(end_entity, intermediates, server_name, &[], UnixTime::now())
            .is_ok()
    }
}

/// Adapts a `CertificateValidator` to rustls' verifier interface.
struct ValidatorBridge {
    validator: Arc<dyn CertificateValidator>,
    provider: Arc<CryptoProvider>,
}

impl fmt::Debug for ValidatorBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorBridge").finish_non_exhaustive()
    }
}

impl ServerCertVerifier for ValidatorBridge {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        if self.validator.validate(end_entity, intermediates, server_name) {
            Ok(ServerCertVerified::assertion())
        } else {
            Err(rustls::Error::InvalidCertificate(
                rustls::CertificateError::ApplicationVerificationFailure,
            ))
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// The process-wide crypto provider if one was installed, otherwise aws-lc-rs.
fn crypto_provider() -> Arc<CryptoProvider> {
    CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
}

/// Builds a client connector whose trust decisions are made by `validator`.
pub fn tls_connector(validator: Arc<dyn CertificateValidator>) -> Result<TlsConnector, ApiError> {
    let provider = crypto_provider();
    let config = rustls::ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(ValidatorBridge {
            validator,
            provider,
        }))
        .with_no_client_auth();
    Ok(TlsConnector::from(Arc::new(config)))
}

/// Parses `host` (DNS name or IP literal) into the name presented during the handshake.
pub fn server_name(host: &str) -> Result<ServerName<'static>, ApiError> {
    ServerName::try_from(host)
        .map(|name| name.to_owned())
        .map_err(|_| ApiError::Tls(format!("Invalid TLS server name '{host}'")))
}
