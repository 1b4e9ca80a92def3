//! Secure service bootstrap library.

pub mod auth;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod management;
pub mod net;
pub mod observability;
pub mod store;

pub use config::schema::ServiceConfig;
pub use lifecycle::{Bootstrap, BootstrapError, RunningServer, Shutdown};
