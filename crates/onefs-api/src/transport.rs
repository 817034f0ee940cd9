// Transport construction.
//
// The dispatcher and the authenticator share one connection pool and one
// small runtime that drives it; this module owns the TLS, timeout, and
// user-agent settings they both use. Calls stay blocking: the dispatcher
// parks the caller's thread on the runtime for each round trip.

use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, RootCertStore, SignatureScheme};
use tokio::runtime::Runtime;

use crate::config::{TlsConfig, TlsVerification, TlsVersion};
use crate::error::Error;

const USER_AGENT: &str = concat!("onefs-api/", env!("CARGO_PKG_VERSION"));

/// Transport settings for building the shared HTTP client.
#[derive(Debug, Clone, Default)]
pub struct TransportConfig {
    pub tls: TlsConfig,
    pub timeout: Duration,
}

impl TransportConfig {
    pub fn new(tls: TlsConfig, timeout: Duration) -> Self {
        Self { tls, timeout }
    }

    /// Build a `reqwest` client from this config.
    ///
    /// Fails with [`Error::Tls`] when a custom CA cannot be loaded, the
    /// version range is empty, or a cipher suite name is unknown.
    pub fn build_client(&self) -> Result<Client, Error> {
        if self.tls.min_version > self.tls.max_version {
            return Err(Error::Tls(format!(
                "minimum TLS version {:?} is above maximum {:?}",
                self.tls.min_version, self.tls.max_version
            )));
        }

        let mut builder = Client::builder().user_agent(USER_AGENT);
        if !self.timeout.is_zero() {
            builder = builder.timeout(self.timeout);
        }

        builder = match self.tls.cipher_suites {
            // reqwest has no cipher suite knob; hand it a finished rustls config.
            Some(ref suites) => builder.use_preconfigured_tls(rustls_config(&self.tls, suites)?),
            None => self.configure_tls(builder)?,
        };

        builder
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }

    fn configure_tls(&self, builder: reqwest::ClientBuilder) -> Result<reqwest::ClientBuilder, Error> {
        let builder = builder
            .use_rustls_tls()
            .min_tls_version(self.tls.min_version.to_reqwest())
            .max_tls_version(self.tls.max_version.to_reqwest());

        Ok(match &self.tls.verification {
            TlsVerification::SystemDefaults => builder,
            TlsVerification::CustomCa(path) => {
                let cert_pem = read_ca(path)?;
                let cert = reqwest::Certificate::from_pem(&cert_pem)
                    .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
                builder.add_root_certificate(cert)
            }
            TlsVerification::DangerAcceptInvalid => builder.danger_accept_invalid_certs(true),
        })
    }
}

/// Runtime that drives the client's I/O on behalf of blocking callers.
///
/// One worker keeps pooled connections serviced between calls; callers
/// park on `block_on` for the duration of their own round trip.
pub(crate) fn build_runtime() -> Result<Runtime, Error> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .thread_name("onefs-io")
        .build()
        .map_err(Error::Runtime)
}

fn read_ca(path: &Path) -> Result<Vec<u8>, Error> {
    std::fs::read(path)
        .map_err(|e| Error::Tls(format!("failed to read CA cert {}: {e}", path.display())))
}

// ── Pinned cipher suites ─────────────────────────────────────────────

/// Build a complete rustls config limited to `suites`.
///
/// Suite names match rustls' `CipherSuite` names, e.g.
/// `TLS13_AES_128_GCM_SHA256` or `TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384`.
fn rustls_config(tls: &TlsConfig, suites: &[String]) -> Result<rustls::ClientConfig, Error> {
    let base = rustls::crypto::ring::default_provider();
    let cipher_suites = suites
        .iter()
        .map(|name| {
            base.cipher_suites
                .iter()
                .find(|suite| format!("{:?}", suite.suite()) == name.trim())
                .copied()
                .ok_or_else(|| Error::Tls(format!("unknown cipher suite {name:?}")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if cipher_suites.is_empty() {
        return Err(Error::Tls("cipher suite list is empty".into()));
    }

    let provider = Arc::new(CryptoProvider {
        cipher_suites,
        ..base
    });
    let versions: Vec<_> = [TlsVersion::Tls12, TlsVersion::Tls13]
        .into_iter()
        .filter(|v| (tls.min_version..=tls.max_version).contains(v))
        .map(TlsVersion::to_rustls)
        .collect();

    let builder = rustls::ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_protocol_versions(&versions)
        .map_err(|e| Error::Tls(format!("cipher suites do not fit the TLS versions: {e}")))?;

    let config = match &tls.verification {
        TlsVerification::SystemDefaults => {
            let mut roots = RootCertStore::empty();
            roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            builder.with_root_certificates(roots).with_no_client_auth()
        }
        TlsVerification::CustomCa(path) => {
            let mut roots = RootCertStore::empty();
            for cert in parse_certs(&read_ca(path)?)? {
                roots
                    .add(cert)
                    .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
            }
            builder.with_root_certificates(roots).with_no_client_auth()
        }
        TlsVerification::DangerAcceptInvalid => builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCert(provider)))
            .with_no_client_auth(),
    };
    Ok(config)
}

fn parse_certs(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>, Error> {
    let mut reader = BufReader::new(pem);
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
    if certs.is_empty() {
        return Err(Error::Tls("invalid CA cert: no certificates in PEM".into()));
    }
    Ok(certs)
}

/// Skips chain validation; handshake signatures are still checked.
#[derive(Debug)]
struct AcceptAnyCert(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
