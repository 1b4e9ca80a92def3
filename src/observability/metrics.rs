//! Metrics collection and exposition.
//!
//! # Metrics
//! - `bootstrap_connections_accepted_total` (counter): by listener
//! - `bootstrap_active_connections` (gauge): by listener
//! - `bootstrap_tls_handshake_failures_total` (counter): by listener
//! - `bootstrap_authentication_failures_total` (counter): by scheme and status
//!
//! The Prometheus recorder is process-global and installed at most once.

use std::sync::OnceLock;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

static PROMETHEUS: OnceLock<Option<PrometheusHandle>> = OnceLock::new();

/// Install the Prometheus recorder, returning its handle.
///
/// `None` when another recorder already owns the process.
pub fn init_metrics() -> Option<&'static PrometheusHandle> {
    PROMETHEUS
        .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::warn!(error = %e, "Metrics recorder not installed");
                None
            }
        })
        .as_ref()
}

/// Prometheus text exposition of every recorded metric.
pub fn render() -> Option<String> {
    PROMETHEUS.get().and_then(Option::as_ref).map(PrometheusHandle::render)
}

pub fn record_connection_accepted(listener: &'static str) {
    counter!("bootstrap_connections_accepted_total", "listener" => listener).increment(1);
}

pub fn record_active_connections(listener: &'static str, active: u64) {
    gauge!("bootstrap_active_connections", "listener" => listener).set(active as f64);
}

pub fn record_tls_handshake_failure(listener: &'static str) {
    counter!("bootstrap_tls_handshake_failures_total", "listener" => listener).increment(1);
}

pub fn record_authentication_failure(scheme: &'static str, status: u16) {
    counter!(
        "bootstrap_authentication_failures_total",
        "scheme" => scheme,
        "status" => status.to_string()
    )
    .increment(1);
}
