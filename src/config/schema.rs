//! Configuration schema definitions.
//!
//! [`ServiceConfig`] is built once per process start by
//! [`ServiceConfig::from_args`](crate::config::ServiceConfig::from_args) and is
//! read-only from then on. Every subsystem takes it by reference.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use axum::http::HeaderName;
use serde::{Serialize, Serializer};

/// Documented default values.
pub mod defaults {
    pub const HOST: &str = "0.0.0.0";
    pub const PORT: u16 = 8080;
    pub const SSL_PORT: u16 = 8443;
    pub const PATH: &str = "/";
    pub const HEALTH_PORT: u16 = 8008;
    pub const JMX_PORT: u16 = 1999;
    pub const KEY_STORE_PATH: &str = "keystore.pem";
    pub const CONFIG_DIR: &str = "";
    pub const HSQLDB_DIR: &str = "hsqldb";
}

/// Root configuration for the service bootstrap.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceConfig {
    /// Directory holding the persistence property files.
    pub config_dir: PathBuf,

    /// Primary service listener.
    pub listener: ListenerConfig,

    /// Transport security of the primary listener.
    pub tls: TlsConfig,

    /// Request authentication on the primary listener.
    pub authentication: AuthenticationMode,

    /// Health listener.
    pub health: HealthConfig,

    /// Remote management connector.
    pub management: ManagementConfig,

    /// Embedded data-store server.
    pub embedded_store: EmbeddedStoreConfig,
}

/// Primary listener configuration.
#[derive(Debug, Clone, Serialize)]
pub struct ListenerConfig {
    /// Bind host (wildcard by default).
    pub host: String,

    /// Bind port. Depends on whether TLS is enabled when not given.
    pub port: u16,

    /// Path prefix the service is mounted under. Always starts with `/`.
    pub path: String,

    /// Maximum concurrent connections. Unlimited when absent.
    pub connection_limit: Option<usize>,
}

/// TLS configuration for the primary listener.
#[derive(Debug, Clone, Serialize)]
pub struct TlsConfig {
    pub enabled: bool,

    /// Inclusive protocol allow-list. Implementation defaults when absent.
    pub protocols: Option<Vec<String>>,

    /// Inclusive cipher-suite allow-list. Implementation defaults when absent.
    pub cipher_suites: Option<Vec<String>>,

    pub key_store: StoreConfig,

    /// Demand a client certificate during the handshake.
    pub client_authentication: bool,

    /// Roots used to verify client certificates when
    /// `client_authentication` is set.
    pub trust_store: StoreConfig,
}

/// A key or trust store reference: `{type, path, password}`.
///
/// An absent path is meaningful: it disables whatever trust resolution
/// depends on the store.
#[derive(Clone, Serialize)]
pub struct StoreConfig {
    pub store_type: StoreType,
    pub path: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

impl StoreConfig {
    /// A store with only its type set.
    pub fn unset() -> Self {
        Self {
            store_type: StoreType::default(),
            path: None,
            password: None,
        }
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("store_type", &self.store_type)
            .field("path", &self.path)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Supported store encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum StoreType {
    /// PEM bundle: certificates, plus a private key for key stores.
    #[default]
    Pem,
}

impl FromStr for StoreType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("pem") {
            Ok(StoreType::Pem)
        } else {
            Err(format!("unsupported store type, supported: {}", StoreType::Pem))
        }
    }
}

impl fmt::Display for StoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreType::Pem => f.write_str("PEM"),
        }
    }
}

/// How requests on the primary listener are authenticated.
///
/// Client-certificate authentication can only be represented together with
/// TLS; the combination without it is rejected during validation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AuthenticationMode {
    Disabled,
    Basic,
    ClientCertificate {
        /// Transport header carrying the client certificate. When absent
        /// the certificate presented in the TLS handshake is used.
        #[serde(serialize_with = "serialize_header")]
        header: Option<HeaderName>,
        trust_store: StoreConfig,
    },
}

fn serialize_header<S: Serializer>(header: &Option<HeaderName>, s: S) -> Result<S::Ok, S::Error> {
    match header {
        Some(name) => s.serialize_some(name.as_str()),
        None => s.serialize_none(),
    }
}

/// Health listener configuration.
#[derive(Debug, Clone, Serialize)]
pub struct HealthConfig {
    pub enabled: bool,
    pub port: u16,
}

/// Remote management connector configuration.
#[derive(Debug, Clone, Serialize)]
pub struct ManagementConfig {
    pub enabled: bool,
    pub port: u16,
    pub access_file: Option<PathBuf>,
    pub password_file: Option<PathBuf>,
}

/// Embedded data-store configuration.
#[derive(Debug, Clone, Serialize)]
pub struct EmbeddedStoreConfig {
    pub enabled: bool,
    /// Data directory handed to the store process.
    pub directory: PathBuf,
}

/// Host to print in status lines: the wildcard address is shown as `localhost`.
pub fn display_host(host: &str) -> &str {
    if host == defaults::HOST {
        "localhost"
    } else {
        host
    }
}
