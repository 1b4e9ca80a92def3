//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters and gauges via the metrics facade)
//!
//! Consumers:
//!     → stdout (fmt layer, filtered by RUST_LOG)
//!     → management listener (/jmxrmi/metrics, Prometheus text)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every request span
//! - Metric updates are cheap (atomic increments) and no-ops until a
//!   recorder is installed

pub mod logging;
pub mod metrics;
