//! Command-line surface.
//!
//! Flag names follow the operator-facing camelCase convention (`--keyStorePath`,
//! `--healthPort`, ...). Numeric options are captured as raw strings; turning
//! them into typed values is the job of [`crate::config::validation`], which
//! reports failures against the option name.

use clap::{ArgAction, CommandFactory, Parser};

/// Option names as they appear on the command line.
pub mod opt {
    pub const PORT: &str = "port";
    pub const PATH: &str = "path";
    pub const HEALTH_PORT: &str = "healthPort";
    pub const CONNECTION_LIMIT: &str = "connectionLimit";
    pub const KEY_STORE_TYPE: &str = "keyStoreType";
    pub const CLIENT_AUTHENTICATION: &str = "clientAuthentication";
    pub const CLIENT_CERTIFICATE_HEADER: &str = "clientCertificateHeader";
    pub const TRUST_STORE_TYPE: &str = "trustStoreType";
    pub const CLIENT_TRUST_STORE_TYPE: &str = "clientTrustStoreType";
    pub const SSL: &str = "ssl";
    pub const JMX_PORT: &str = "jmxPort";
}

/// Raw command-line options. Absent values fall back to the documented
/// defaults when converted into a [`ServiceConfig`](crate::config::ServiceConfig).
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "service-bootstrap", version)]
#[command(about = "Secure service bootstrap: TLS listeners, authentication and auxiliary processes")]
pub struct CliArgs {
    /// set host [default: 0.0.0.0]
    #[arg(long)]
    pub host: Option<String>,

    /// set port [default: <8080|8443>]
    #[arg(long)]
    pub port: Option<String>,

    /// set path [default: /]
    #[arg(long)]
    pub path: Option<String>,

    /// start health service
    #[arg(long, num_args = 0..=1, default_missing_value = "true", action = ArgAction::Set, value_name = "BOOL")]
    pub health: Option<bool>,

    /// set health service port [default: 8008]
    #[arg(long = "healthPort")]
    pub health_port: Option<String>,

    /// set connection limit [default: <none>]
    #[arg(long = "connectionLimit")]
    pub connection_limit: Option<String>,

    /// enable SSL
    #[arg(long, num_args = 0..=1, default_missing_value = "true", action = ArgAction::Set, value_name = "BOOL")]
    pub ssl: Option<bool>,

    /// set SSL protocols, comma separated [default: <none>]
    #[arg(long)]
    pub protocols: Option<String>,

    /// set SSL cipher suites, comma separated [default: <none>]
    #[arg(long = "cipherSuites")]
    pub cipher_suites: Option<String>,

    /// set keystore type [default: PEM]
    #[arg(long = "keyStoreType")]
    pub key_store_type: Option<String>,

    /// set keystore path [default: keystore.pem]
    #[arg(long = "keyStorePath")]
    pub key_store_path: Option<String>,

    /// set keystore password [default: <none>]
    #[arg(long = "keyStorePassword")]
    pub key_store_password: Option<String>,

    /// enable SSL client authentication
    #[arg(long = "clientAuthentication", num_args = 0..=1, default_missing_value = "true", action = ArgAction::Set, value_name = "BOOL")]
    pub client_authentication: Option<bool>,

    /// set client certificate header [default: <none>]
    #[arg(long = "clientCertificateHeader")]
    pub client_certificate_header: Option<String>,

    /// set truststore type [default: PEM]
    #[arg(long = "trustStoreType")]
    pub trust_store_type: Option<String>,

    /// set truststore path [default: <none>]
    #[arg(long = "trustStorePath")]
    pub trust_store_path: Option<String>,

    /// set truststore password [default: <none>]
    #[arg(long = "trustStorePassword")]
    pub trust_store_password: Option<String>,

    /// enable basic | client certificate authentication
    #[arg(long, num_args = 0..=1, default_missing_value = "true", action = ArgAction::Set, value_name = "BOOL")]
    pub authentication: Option<bool>,

    /// set client truststore type [default: PEM]
    #[arg(long = "clientTrustStoreType")]
    pub client_trust_store_type: Option<String>,

    /// set client truststore path [default: <none>]
    #[arg(long = "clientTrustStorePath")]
    pub client_trust_store_path: Option<String>,

    /// set client truststore password [default: <none>]
    #[arg(long = "clientTrustStorePassword")]
    pub client_trust_store_password: Option<String>,

    /// set config directory [default: <startup_directory>]
    #[arg(long = "configDir")]
    pub config_dir: Option<String>,

    /// start remote management server
    #[arg(long, num_args = 0..=1, default_missing_value = "true", action = ArgAction::Set, value_name = "BOOL")]
    pub jmx: Option<bool>,

    /// set remote management port [default: 1999]
    #[arg(long = "jmxPort")]
    pub jmx_port: Option<String>,

    /// set remote management access file [default: <none>]
    #[arg(long = "jmxAccessFile")]
    pub jmx_access_file: Option<String>,

    /// set remote management password file [default: <none>]
    #[arg(long = "jmxPasswordFile")]
    pub jmx_password_file: Option<String>,

    /// start embedded HSQLDB server
    #[arg(long, num_args = 0..=1, default_missing_value = "true", action = ArgAction::Set, value_name = "BOOL")]
    pub hsqldb: Option<bool>,

    /// set HSQLDB location [default: hsqldb]
    #[arg(long = "hsqldbDir")]
    pub hsqldb_dir: Option<String>,
}

impl CliArgs {
    /// Usage line printed along with configuration errors.
    pub fn usage() -> String {
        Self::command().render_usage().to_string()
    }
}
