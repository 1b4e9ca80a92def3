//! Client-certificate authentication.
//!
//! Two filters, applied in order:
//! 1. [`extract_certificate`] finds the client certificate, either in a
//!    configured transport header (set by a TLS-terminating proxy) or in the
//!    TLS handshake itself. No usable certificate → 401.
//! 2. [`authenticate_certificate`] checks it against the client trust store:
//!    a byte-identical pinned certificate or a chain to one of its anchors.
//!    Anything else → 403.
//!
//! Header values may be URL-escaped PEM (`$ssl_client_escaped_cert` style)
//! or bare base64 DER.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine};
use rustls::pki_types::{CertificateDer, UnixTime};
use rustls::server::danger::ClientCertVerifier;
use rustls::server::{ParsedCertificate, WebPkiClientVerifier};
use sha2::{Digest, Sha256};

use crate::auth::{AuthError, Principal};
use crate::net::tls::{TrustAnchors, PeerCertificate};
use crate::observability::metrics;

pub const SCHEME: &str = "client-certificate";

/// Certificate found by the extraction filter.
#[derive(Debug, Clone)]
pub struct ClientCertificate(pub CertificateDer<'static>);

/// The client trust store, ready for verification.
pub struct ClientTrust {
    pinned: Vec<CertificateDer<'static>>,
    verifier: Arc<dyn ClientCertVerifier>,
}

impl std::fmt::Debug for ClientTrust {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientTrust")
            .field("certificates", &self.pinned.len())
            .finish()
    }
}

impl ClientTrust {
    pub fn new(anchors: TrustAnchors) -> Result<Self, AuthError> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let verifier = WebPkiClientVerifier::builder_with_provider(anchors.roots, provider)
            .build()
            .map_err(|e| AuthError::Trust(e.into()))?;
        Ok(Self {
            pinned: anchors.certificates,
            verifier,
        })
    }

    /// Whether `cert` is trusted.
    pub fn verify(&self, cert: &CertificateDer<'_>) -> bool {
        if self.pinned.iter().any(|pinned| pinned.as_ref() == cert.as_ref()) {
            return true;
        }
        match self.verifier.verify_client_cert(cert, &[], UnixTime::now()) {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(error = %e, "Client certificate rejected");
                false
            }
        }
    }
}

/// Decode a certificate carried in a transport header.
///
/// `None` unless the value holds a well-formed X.509 certificate.
pub fn decode_header_certificate(value: &str) -> Option<CertificateDer<'static>> {
    let unescaped = urlencoding::decode(value.trim()).ok()?;
    let certificate = if unescaped.contains("-----BEGIN") {
        rustls_pemfile::certs(&mut unescaped.as_bytes()).next()?.ok()?
    } else {
        let compact: String = unescaped.split_whitespace().collect();
        CertificateDer::from(STANDARD.decode(compact).ok()?)
    };
    ParsedCertificate::try_from(&certificate).ok()?;
    Some(certificate)
}

/// SHA-256 fingerprint used as the principal name.
pub fn fingerprint(cert: &CertificateDer<'_>) -> String {
    hex::encode(Sha256::digest(cert.as_ref()))
}

/// First filter: locate the client certificate.
pub async fn extract_certificate(
    State(header): State<Option<HeaderName>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let certificate = match &header {
        Some(name) => request
            .headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
            .and_then(decode_header_certificate),
        None => request
            .extensions()
            .get::<PeerCertificate>()
            .map(|peer| peer.0.clone()),
    };

    let Some(certificate) = certificate else {
        tracing::debug!(header = ?header, "No client certificate");
        metrics::record_authentication_failure(SCHEME, StatusCode::UNAUTHORIZED.as_u16());
        return StatusCode::UNAUTHORIZED.into_response();
    };

    request.extensions_mut().insert(ClientCertificate(certificate));
    next.run(request).await
}

/// Second filter: validate the extracted certificate against the trust store.
pub async fn authenticate_certificate(
    State(trust): State<Arc<ClientTrust>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(ClientCertificate(certificate)) =
        request.extensions().get::<ClientCertificate>().cloned()
    else {
        metrics::record_authentication_failure(SCHEME, StatusCode::UNAUTHORIZED.as_u16());
        return StatusCode::UNAUTHORIZED.into_response();
    };

    if !trust.verify(&certificate) {
        metrics::record_authentication_failure(SCHEME, StatusCode::FORBIDDEN.as_u16());
        return StatusCode::FORBIDDEN.into_response();
    }

    request.extensions_mut().insert(Principal {
        name: fingerprint(&certificate),
        scheme: SCHEME,
    });
    next.run(request).await
}
