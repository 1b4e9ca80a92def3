//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     persistence properties → embedded store → management connector
//!     → TLS material → authentication plan → listeners → serve
//!
//! Shutdown (shutdown.rs):
//!     Signal or management request → stop accepting → drain → stop auxiliaries
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Strictly sequential startup: each stage's failure aborts every later stage
//! - All-or-nothing: a failure after anything started stops what did start
//! - The caller joins the running server until it is stopped

pub mod auxiliary;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use auxiliary::{AuxiliaryKind, AuxiliaryProcess, AuxiliaryStatus};
pub use shutdown::Shutdown;
pub use startup::{Bootstrap, BootstrapError, RunningServer};
