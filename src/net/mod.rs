//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! configured store paths
//!     → resource.rs (filesystem, then bundled resources)
//!     → tls.rs (TlsMaterial: certs, key, allow-lists, client verifier)
//!
//! Incoming TCP connection
//!     → listener.rs (named listener, optional connection limit)
//!     → tls.rs acceptor (secure listeners only)
//!     → connection.rs (per-listener tracking)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - TLS material belongs to the primary listener only
//! - A connection limit, when configured, is installed on the primary listener only
//! - Each connection is tracked for graceful shutdown

pub mod connection;
pub mod listener;
pub mod resource;
pub mod tls;

pub use listener::{Listener, ListenerError, ListenerInfo, Transport};
pub use resource::ResourceNotFound;
pub use tls::{PeerCertificate, TlsError, TlsMaterial};
