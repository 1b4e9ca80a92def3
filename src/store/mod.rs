//! Embedded data-store subsystem.
//!
//! # Data Flow
//! ```text
//! PersistenceProperties.jdbc.url
//!     → connection_string.rs (lenient {host, port, database})
//!     → embedded.rs (loopback check, launch plan)
//!     → external store process, supervised until shutdown
//! ```

pub mod connection_string;
pub mod embedded;

pub use connection_string::ConnectionString;
pub use embedded::{is_loopback, start_embedded_store, EmbeddedStoreLaunch, StoreError};
