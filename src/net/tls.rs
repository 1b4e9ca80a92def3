//! TLS material assembly for the primary listener.
//!
//! # Responsibilities
//! - Resolve and load the key store (certificate chain + private key)
//! - Apply protocol and cipher-suite allow-lists
//! - Demand and verify client certificates when mutual TLS is requested
//!
//! # Design Decisions
//! - A store that cannot be resolved is fatal, never a plaintext fallback
//! - Allow-lists replace the provider defaults; unknown entries are skipped
//!   with a warning, an allow-list with nothing usable is an error
//! - Stores are PEM; a configured store password is ignored

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::{VerifierBuilderError, WebPkiClientVerifier};
use rustls::{RootCertStore, ServerConfig, SupportedProtocolVersion};
use thiserror::Error;
use tokio_rustls::TlsAcceptor;

use crate::config::{StoreConfig, TlsConfig};
use crate::net::resource::{resolve_store, ResourceNotFound};

pub const KEY_STORE: &str = "keyStore";
pub const TRUST_STORE: &str = "trustStore";

/// ALPN protocols advertised by TLS listeners.
const ALPN: [&[u8]; 2] = [b"h2", b"http/1.1"];

#[derive(Debug, Error)]
pub enum TlsError {
    #[error(transparent)]
    NotFound(#[from] ResourceNotFound),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no certificates found in {path}")]
    NoCertificates { path: PathBuf },

    #[error("no private key found in {path}")]
    NoPrivateKey { path: PathBuf },

    #[error("none of the configured protocols are supported")]
    NoProtocols,

    #[error("none of the configured cipher suites are supported")]
    NoCipherSuites,

    #[error("invalid TLS configuration: {0}")]
    Rustls(#[from] rustls::Error),

    #[error("invalid client certificate verifier: {0}")]
    Verifier(#[from] VerifierBuilderError),
}

/// Leaf certificate presented by the client during the handshake.
///
/// Inserted into request extensions by the server for secure connections.
#[derive(Debug, Clone)]
pub struct PeerCertificate(pub CertificateDer<'static>);

/// Resolved TLS context owned by the primary listener.
#[derive(Clone)]
pub struct TlsMaterial {
    config: Arc<ServerConfig>,
    mutual: bool,
}

impl std::fmt::Debug for TlsMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsMaterial")
            .field("mutual", &self.mutual)
            .field("alpn", &self.config.alpn_protocols.len())
            .finish()
    }
}

impl TlsMaterial {
    /// Build the TLS context described by `tls`. Returns `None` when TLS is disabled.
    pub fn build(tls: &TlsConfig) -> Result<Option<Self>, TlsError> {
        if !tls.enabled {
            return Ok(None);
        }

        let provider = Arc::new(restrict_cipher_suites(
            rustls::crypto::ring::default_provider(),
            tls.cipher_suites.as_deref(),
        )?);
        let versions = protocol_versions(tls.protocols.as_deref())?;

        let key_store_path = resolve_store(KEY_STORE, tls.key_store.path.as_deref())?;
        warn_ignored_password(KEY_STORE, &tls.key_store);
        let certs = load_certificates(&key_store_path)?;
        let key = load_private_key(&key_store_path)?;

        let builder = ServerConfig::builder_with_provider(provider.clone())
            .with_protocol_versions(&versions)?;

        let builder = if tls.client_authentication {
            let roots = load_trust(TRUST_STORE, &tls.trust_store)?.roots;
            let verifier = WebPkiClientVerifier::builder_with_provider(roots, provider).build()?;
            builder.with_client_cert_verifier(verifier)
        } else {
            builder.with_no_client_auth()
        };

        let mut config = builder.with_single_cert(certs, key)?;
        config.alpn_protocols = ALPN.iter().map(|p| p.to_vec()).collect();

        Ok(Some(Self {
            config: Arc::new(config),
            mutual: tls.client_authentication,
        }))
    }

    pub fn acceptor(&self) -> TlsAcceptor {
        TlsAcceptor::from(self.config.clone())
    }

    /// Whether the handshake demands a client certificate.
    pub fn requires_client_certificate(&self) -> bool {
        self.mutual
    }
}

/// Trusted certificates loaded from a trust store.
#[derive(Debug, Clone)]
pub struct TrustAnchors {
    pub certificates: Vec<CertificateDer<'static>>,
    pub roots: Arc<RootCertStore>,
}

/// Resolve and load the trust store named `kind`.
pub fn load_trust(kind: &'static str, store: &StoreConfig) -> Result<TrustAnchors, TlsError> {
    let path = resolve_store(kind, store.path.as_deref())?;
    warn_ignored_password(kind, store);
    let certificates = load_certificates(&path)?;
    let mut roots = RootCertStore::empty();
    for cert in &certificates {
        roots.add(cert.clone())?;
    }
    Ok(TrustAnchors {
        certificates,
        roots: Arc::new(roots),
    })
}

fn warn_ignored_password(kind: &str, store: &StoreConfig) {
    if store.password.is_some() {
        tracing::warn!(store = kind, "{} stores are unencrypted, password ignored", store.store_type);
    }
}

/// Load every certificate in a PEM file.
pub fn load_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let mut reader = open(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificates {
            path: path.to_path_buf(),
        });
    }
    Ok(certs)
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    let mut reader = open(path)?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|source| TlsError::Read {
            path: path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| TlsError::NoPrivateKey {
            path: path.to_path_buf(),
        })
}

fn open(path: &Path) -> Result<BufReader<File>, TlsError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| TlsError::Read {
            path: path.to_path_buf(),
            source,
        })
}

fn protocol_versions(
    allowed: Option<&[String]>,
) -> Result<Vec<&'static SupportedProtocolVersion>, TlsError> {
    let Some(allowed) = allowed else {
        return Ok(rustls::DEFAULT_VERSIONS.to_vec());
    };

    let mut versions = Vec::new();
    for token in allowed {
        match token.as_str() {
            "TLSv1.3" | "1.3" => versions.push(&rustls::version::TLS13),
            "TLSv1.2" | "1.2" => versions.push(&rustls::version::TLS12),
            other => tracing::warn!(protocol = other, "Unsupported protocol skipped"),
        }
    }
    if versions.is_empty() {
        return Err(TlsError::NoProtocols);
    }
    Ok(versions)
}

fn restrict_cipher_suites(
    mut provider: CryptoProvider,
    allowed: Option<&[String]>,
) -> Result<CryptoProvider, TlsError> {
    let Some(allowed) = allowed else {
        return Ok(provider);
    };

    for token in allowed {
        if !provider
            .cipher_suites
            .iter()
            .any(|suite| suite_matches(&suite_name(suite), token))
        {
            tracing::warn!(cipher_suite = %token, "Unsupported cipher suite skipped");
        }
    }
    provider
        .cipher_suites
        .retain(|suite| allowed.iter().any(|token| suite_matches(&suite_name(suite), token)));

    if provider.cipher_suites.is_empty() {
        return Err(TlsError::NoCipherSuites);
    }
    Ok(provider)
}

fn suite_name(suite: &rustls::SupportedCipherSuite) -> String {
    format!("{:?}", suite.suite())
}

/// `TLS13_AES_128_GCM_SHA256` also answers to its IANA name `TLS_AES_128_GCM_SHA256`.
fn suite_matches(name: &str, token: &str) -> bool {
    name == token
        || name
            .strip_prefix("TLS13_")
            .is_some_and(|rest| token.strip_prefix("TLS_") == Some(rest))
}
