//! Remote management connector.
//!
//! # Data Flow
//! ```text
//! ManagementConfig
//!     → access.rs (optional role/password control)
//!     → router(): /jmxrmi, /jmxrmi/metrics, /jmxrmi/shutdown
//!     → served on the `management` listener
//! ```
//!
//! # Design Decisions
//! - The connector reports on the live server through [`ManagementState`],
//!   which startup fills in as listeners and auxiliary processes come up
//! - Shutdown through the connector uses the same coordinator as signals

pub mod access;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::config::schema::display_host;
use crate::config::ServiceConfig;
use crate::http::routes::{instrument, not_found, restrict_to};
use crate::lifecycle::auxiliary::AuxiliaryProcess;
use crate::lifecycle::Shutdown;
use crate::net::listener::{ListenerInfo, MANAGEMENT};
use crate::observability::metrics;

pub use access::{AccessControl, AccessLevel};

pub const SERVICE_PATH: &str = "/jmxrmi";

#[derive(Debug, Error)]
pub enum ManagementError {
    #[error("failed to read management file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// `service:jmx:http://<host>:<port>/jmxrmi`
pub fn service_url(host: &str, port: u16) -> String {
    format!("service:jmx:http://{}:{}{}", display_host(host), port, SERVICE_PATH)
}

/// Live view of the running server, shared with the management handlers.
#[derive(Debug, Clone)]
pub struct ManagementState {
    config: Arc<ServiceConfig>,
    started_at: Instant,
    listeners: Arc<RwLock<Vec<ListenerInfo>>>,
    auxiliary: Arc<RwLock<Vec<AuxiliaryProcess>>>,
    shutdown: Shutdown,
}

impl ManagementState {
    pub fn new(config: Arc<ServiceConfig>, shutdown: Shutdown) -> Self {
        Self {
            config,
            started_at: Instant::now(),
            listeners: Arc::default(),
            auxiliary: Arc::default(),
            shutdown,
        }
    }

    pub async fn register_listener(&self, info: ListenerInfo) {
        self.listeners.write().await.push(info);
    }

    pub async fn register_auxiliary(&self, process: AuxiliaryProcess) {
        self.auxiliary.write().await.push(process);
    }
}

/// Router of the management listener.
pub fn router(state: ManagementState, access: Option<AccessControl>) -> Router {
    let routes = Router::new()
        .route(SERVICE_PATH, get(status))
        .route(&format!("{}/metrics", SERVICE_PATH), get(render_metrics))
        .route(&format!("{}/shutdown", SERVICE_PATH), post(shutdown))
        .fallback(not_found)
        .with_state(state);

    let routes = match access {
        Some(control) => routes.layer(middleware::from_fn_with_state(
            Arc::new(control),
            access::require_access,
        )),
        None => routes,
    };
    instrument(restrict_to(MANAGEMENT, routes))
}

async fn status(State(state): State<ManagementState>) -> impl IntoResponse {
    let listeners = state.listeners.read().await.clone();
    let auxiliary: Vec<_> = state
        .auxiliary
        .read()
        .await
        .iter()
        .map(AuxiliaryProcess::status)
        .collect();
    let url = listeners
        .iter()
        .find(|listener| listener.name == MANAGEMENT)
        .map(|listener| service_url(&listener.host, listener.port));

    Json(json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "url": url,
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "shutting_down": state.shutdown.is_triggered(),
        "config": &*state.config,
        "listeners": listeners,
        "auxiliary": auxiliary,
    }))
}

async fn render_metrics() -> impl IntoResponse {
    match metrics::render() {
        Some(text) => (StatusCode::OK, text),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed".to_string()),
    }
}

async fn shutdown(State(state): State<ManagementState>) -> impl IntoResponse {
    tracing::info!("Shutdown requested through management endpoint");
    state.shutdown.trigger();
    (StatusCode::ACCEPTED, Json(json!({ "status": "shutting down" })))
}
