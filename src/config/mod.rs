//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! command line
//!     → cli.rs (clap, raw option values)
//!     → validation.rs (defaults, typed values, contradictory flags)
//!     → ServiceConfig (validated, immutable)
//!     → read by reference from every subsystem
//!
//! config directory
//!     → loader.rs (layered persistence properties)
//!     → PersistenceProperties → auxiliary process manager
//! ```
//!
//! # Design Decisions
//! - Config is built once and never written back
//! - Every option has a documented default; absent trust-store paths stay absent
//! - Errors name the offending option

pub mod cli;
pub mod loader;
pub mod schema;
pub mod validation;

pub use cli::CliArgs;
pub use loader::{load_persistence, PersistenceProperties};
pub use schema::{
    AuthenticationMode, EmbeddedStoreConfig, HealthConfig, ListenerConfig, ManagementConfig,
    ServiceConfig, StoreConfig, StoreType, TlsConfig,
};
pub use validation::ConfigError;
