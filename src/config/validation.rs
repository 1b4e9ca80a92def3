//! Configuration validation.
//!
//! Turns raw [`CliArgs`] into a [`ServiceConfig`]. Defaulting is total: every
//! field has a documented fallback. Validation is a pure function of the
//! input and reports the first offending option by name.

use std::path::PathBuf;

use axum::http::HeaderName;
use thiserror::Error;

use crate::config::cli::{opt, CliArgs};
use crate::config::schema::{
    defaults, AuthenticationMode, EmbeddedStoreConfig, HealthConfig, ListenerConfig,
    ManagementConfig, ServiceConfig, StoreConfig, StoreType, TlsConfig,
};

/// Malformed or contradictory configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for option '{option}': {reason}")]
    InvalidValue {
        option: &'static str,
        value: String,
        reason: String,
    },

    #[error("option '{option}' requires '{requires}'")]
    MissingRequirement {
        option: &'static str,
        requires: &'static str,
    },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    fn invalid(option: &'static str, value: &str, reason: impl ToString) -> Self {
        ConfigError::InvalidValue {
            option,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl ServiceConfig {
    /// Build a validated configuration from raw command-line options.
    pub fn from_args(args: &CliArgs) -> Result<Self, ConfigError> {
        let ssl = args.ssl.unwrap_or(false);
        let client_authentication = args.client_authentication.unwrap_or(false);
        let authentication = args.authentication.unwrap_or(false);

        let default_port = if ssl { defaults::SSL_PORT } else { defaults::PORT };
        let listener = ListenerConfig {
            host: args.host.clone().unwrap_or_else(|| defaults::HOST.to_string()),
            port: parse_port(opt::PORT, args.port.as_deref(), default_port)?,
            path: parse_path(args.path.as_deref())?,
            connection_limit: parse_connection_limit(args.connection_limit.as_deref())?,
        };

        let tls = TlsConfig {
            enabled: ssl,
            protocols: parse_list(args.protocols.as_deref()),
            cipher_suites: parse_list(args.cipher_suites.as_deref()),
            key_store: StoreConfig {
                store_type: parse_store_type(opt::KEY_STORE_TYPE, args.key_store_type.as_deref())?,
                path: Some(
                    args.key_store_path
                        .clone()
                        .unwrap_or_else(|| defaults::KEY_STORE_PATH.to_string()),
                ),
                password: args.key_store_password.clone(),
            },
            client_authentication,
            trust_store: StoreConfig {
                store_type: parse_store_type(opt::TRUST_STORE_TYPE, args.trust_store_type.as_deref())?,
                path: args.trust_store_path.clone(),
                password: args.trust_store_password.clone(),
            },
        };

        let authentication = match (authentication, client_authentication, ssl) {
            (false, _, _) => AuthenticationMode::Disabled,
            (true, false, _) => AuthenticationMode::Basic,
            (true, true, true) => AuthenticationMode::ClientCertificate {
                header: parse_header(args.client_certificate_header.as_deref())?,
                trust_store: StoreConfig {
                    store_type: parse_store_type(
                        opt::CLIENT_TRUST_STORE_TYPE,
                        args.client_trust_store_type.as_deref(),
                    )?,
                    path: args.client_trust_store_path.clone(),
                    password: args.client_trust_store_password.clone(),
                },
            },
            (true, true, false) => {
                return Err(ConfigError::MissingRequirement {
                    option: opt::CLIENT_AUTHENTICATION,
                    requires: opt::SSL,
                })
            }
        };

        let health = HealthConfig {
            enabled: args.health.unwrap_or(false),
            port: parse_port(opt::HEALTH_PORT, args.health_port.as_deref(), defaults::HEALTH_PORT)?,
        };

        let management = ManagementConfig {
            enabled: args.jmx.unwrap_or(false),
            port: parse_port(opt::JMX_PORT, args.jmx_port.as_deref(), defaults::JMX_PORT)?,
            access_file: args.jmx_access_file.as_ref().map(PathBuf::from),
            password_file: args.jmx_password_file.as_ref().map(PathBuf::from),
        };

        let embedded_store = EmbeddedStoreConfig {
            enabled: args.hsqldb.unwrap_or(false),
            directory: PathBuf::from(args.hsqldb_dir.as_deref().unwrap_or(defaults::HSQLDB_DIR)),
        };

        Ok(Self {
            config_dir: PathBuf::from(args.config_dir.as_deref().unwrap_or(defaults::CONFIG_DIR)),
            listener,
            tls,
            authentication,
            health,
            management,
            embedded_store,
        })
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from(defaults::CONFIG_DIR),
            listener: ListenerConfig {
                host: defaults::HOST.to_string(),
                port: defaults::PORT,
                path: defaults::PATH.to_string(),
                connection_limit: None,
            },
            tls: TlsConfig {
                enabled: false,
                protocols: None,
                cipher_suites: None,
                key_store: StoreConfig {
                    store_type: StoreType::Pem,
                    path: Some(defaults::KEY_STORE_PATH.to_string()),
                    password: None,
                },
                client_authentication: false,
                trust_store: StoreConfig::unset(),
            },
            authentication: AuthenticationMode::Disabled,
            health: HealthConfig {
                enabled: false,
                port: defaults::HEALTH_PORT,
            },
            management: ManagementConfig {
                enabled: false,
                port: defaults::JMX_PORT,
                access_file: None,
                password_file: None,
            },
            embedded_store: EmbeddedStoreConfig {
                enabled: false,
                directory: PathBuf::from(defaults::HSQLDB_DIR),
            },
        }
    }
}

fn parse_port(option: &'static str, value: Option<&str>, default: u16) -> Result<u16, ConfigError> {
    match value {
        None => Ok(default),
        Some(v) => v.trim().parse::<u16>().map_err(|e| ConfigError::invalid(option, v, e)),
    }
}

fn parse_path(value: Option<&str>) -> Result<String, ConfigError> {
    let Some(path) = value else {
        return Ok(defaults::PATH.to_string());
    };
    if !path.starts_with('/') {
        return Err(ConfigError::invalid(opt::PATH, path, "must start with '/'"));
    }
    if path.contains(['{', '}', '*', '?', '#']) {
        return Err(ConfigError::invalid(opt::PATH, path, "must be a literal path"));
    }
    let trimmed = path.trim_end_matches('/');
    Ok(if trimmed.is_empty() { "/".to_string() } else { trimmed.to_string() })
}

fn parse_connection_limit(value: Option<&str>) -> Result<Option<usize>, ConfigError> {
    let Some(v) = value else {
        return Ok(None);
    };
    match v.trim().parse::<usize>() {
        Ok(0) => Err(ConfigError::invalid(opt::CONNECTION_LIMIT, v, "must be greater than zero")),
        Ok(limit) => Ok(Some(limit)),
        Err(e) => Err(ConfigError::invalid(opt::CONNECTION_LIMIT, v, e)),
    }
}

/// Comma-separated tokens, trimmed. Empty input means "not configured".
fn parse_list(value: Option<&str>) -> Option<Vec<String>> {
    let tokens: Vec<String> = value?
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect();
    (!tokens.is_empty()).then_some(tokens)
}

fn parse_store_type(option: &'static str, value: Option<&str>) -> Result<StoreType, ConfigError> {
    match value {
        None => Ok(StoreType::default()),
        Some(v) => v.parse().map_err(|reason: String| ConfigError::invalid(option, v, reason)),
    }
}

fn parse_header(value: Option<&str>) -> Result<Option<HeaderName>, ConfigError> {
    value
        .map(|v| {
            HeaderName::from_bytes(v.trim().as_bytes())
                .map_err(|e| ConfigError::invalid(opt::CLIENT_CERTIFICATE_HEADER, v, e))
        })
        .transpose()
}
