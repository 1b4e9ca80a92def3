//! Secure service bootstrap.
//!
//! # Architecture Overview
//!
//! ```text
//!     command line ──▶ config ──▶ ServiceConfig
//!                                     │
//!            ┌────────────────────────┼──────────────────────────┐
//!            ▼                        ▼                          ▼
//!     store (embedded)        net::tls + auth            management
//!     auxiliary process       TLS material,              auxiliary process
//!                             authentication plan
//!            │                        │                          │
//!            └────────────────────────┼──────────────────────────┘
//!                                     ▼
//!                    lifecycle::startup (web, health listeners)
//!                                     │
//!                                     ▼
//!                    http::server ──▶ http::routes ──▶ service
//! ```
//!
//! Every startup failure is fatal and exits with status 1.

use clap::error::ErrorKind;
use clap::Parser;

use service_bootstrap::auth::prompt::default_prompt;
use service_bootstrap::config::{CliArgs, ServiceConfig};
use service_bootstrap::lifecycle::signals::spawn_signal_handler;
use service_bootstrap::observability::logging::init_logging;
use service_bootstrap::Bootstrap;

#[tokio::main]
async fn main() {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    init_logging();

    let config = match ServiceConfig::from_args(&args) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            eprintln!("{}\n\n{}", e, CliArgs::usage());
            std::process::exit(1);
        }
    };

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "service-bootstrap starting");

    let mut prompt = default_prompt();
    let server = match Bootstrap::new(config).start(prompt.as_mut()).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            eprintln!("{}", e);
            std::process::exit(e.exit_code());
        }
    };

    let signals = spawn_signal_handler(server.shutdown_handle());
    server.join().await;
    signals.abort();
}
