//! Authentication subsystem.
//!
//! # Data Flow
//! ```text
//! AuthenticationMode (validated config)
//!     → AuthenticationPlan::select
//!         Disabled          → None
//!         Basic             → realm.rs (provision if missing) → basic.rs filter
//!         ClientCertificate → client trust store → client_cert.rs filters
//!     → AuthenticationPlan::apply (wraps the primary service router)
//! ```
//!
//! # Design Decisions
//! - The plan is selected once at startup and never re-evaluated
//! - Provisioning is the only blocking step and only runs when the
//!   credentials file is missing
//! - Client-certificate filters are ordered: extraction before validation

pub mod basic;
pub mod client_cert;
pub mod prompt;
pub mod realm;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{http::HeaderName, middleware, Router};
use thiserror::Error;
use tokio::runtime::{Handle, RuntimeFlavor};

use crate::config::AuthenticationMode;
use crate::net::tls::{load_trust, TlsError};

pub use client_cert::ClientTrust;
pub use prompt::{ConsolePrompt, CredentialPrompt, EnvCredentials};
pub use realm::Realm;

/// Trust store name used in status lines and errors.
pub const CLIENT_TRUST_STORE: &str = "clientTrustStore";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("failed to access credentials file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read credentials: {0}")]
    Prompt(#[source] std::io::Error),

    #[error("invalid username `{0}`")]
    InvalidUsername(String),

    #[error("credentials rejected: {0}")]
    RejectedPassword(String),

    #[error(transparent)]
    Trust(#[from] TlsError),
}

/// Identity established by an authentication filter, available to handlers
/// as a request extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub name: String,
    pub scheme: &'static str,
}

/// Which filter chain protects the primary listener.
#[derive(Debug, Clone)]
pub enum AuthenticationPlan {
    None,
    Basic {
        credentials_file: PathBuf,
        realm: Arc<Realm>,
    },
    ClientCertificate {
        header_name: Option<HeaderName>,
        trust: Arc<ClientTrust>,
    },
}

impl AuthenticationPlan {
    /// Resolve the plan for `mode`.
    ///
    /// Basic authentication provisions `credentials_file` through `prompt`
    /// when it does not exist yet.
    pub fn select(
        mode: &AuthenticationMode,
        credentials_file: &Path,
        prompt: &mut dyn CredentialPrompt,
    ) -> Result<Self, AuthError> {
        let plan = match mode {
            AuthenticationMode::Disabled => AuthenticationPlan::None,
            AuthenticationMode::Basic => {
                without_blocking_workers(|| {
                    realm::ensure_credentials_file(credentials_file, prompt)
                })?;
                let realm = Realm::load(credentials_file)?;
                if realm.is_empty() {
                    tracing::warn!(
                        path = %credentials_file.display(),
                        "Credentials file has no users"
                    );
                }
                AuthenticationPlan::Basic {
                    credentials_file: credentials_file.to_path_buf(),
                    realm: Arc::new(realm),
                }
            }
            AuthenticationMode::ClientCertificate {
                header,
                trust_store,
            } => {
                let anchors = load_trust(CLIENT_TRUST_STORE, trust_store)?;
                AuthenticationPlan::ClientCertificate {
                    header_name: header.clone(),
                    trust: Arc::new(ClientTrust::new(anchors)?),
                }
            }
        };
        tracing::info!(authentication = plan.name(), "Authentication configured");
        Ok(plan)
    }

    pub fn name(&self) -> &'static str {
        match self {
            AuthenticationPlan::None => "none",
            AuthenticationPlan::Basic { .. } => basic::SCHEME,
            AuthenticationPlan::ClientCertificate { .. } => client_cert::SCHEME,
        }
    }

    /// Wrap `router` with this plan's filters.
    pub fn apply(&self, router: Router) -> Router {
        match self {
            AuthenticationPlan::None => router,
            AuthenticationPlan::Basic { realm, .. } => {
                router.layer(middleware::from_fn_with_state(realm.clone(), basic::require_basic))
            }
            // Layers added later run first: extraction wraps authentication.
            AuthenticationPlan::ClientCertificate { header_name, trust } => router
                .layer(middleware::from_fn_with_state(
                    trust.clone(),
                    client_cert::authenticate_certificate,
                ))
                .layer(middleware::from_fn_with_state(
                    header_name.clone(),
                    client_cert::extract_certificate,
                )),
        }
    }
}

/// Run a blocking prompt. On a multi-threaded runtime the current worker
/// hands its tasks to another thread first.
fn without_blocking_workers<T>(f: impl FnOnce() -> T) -> T {
    match Handle::try_current().map(|handle| handle.runtime_flavor()) {
        Ok(RuntimeFlavor::MultiThread) => tokio::task::block_in_place(f),
        _ => f(),
    }
}
