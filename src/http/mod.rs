//! HTTP serving subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (net::listener)
//!     → server.rs (TLS handshake, HTTP/1.1 + HTTP/2, listener tagging)
//!     → routes.rs (listener guard, authentication plan, service or health)
//!     → Send to client
//! ```

pub mod routes;
pub mod server;

pub use routes::{default_service, health_router, primary_router, ListenerName};
pub use server::HttpServer;
