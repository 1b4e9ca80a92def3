//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use service_bootstrap::auth::CredentialPrompt;
use service_bootstrap::config::{ServiceConfig, StoreConfig};
use service_bootstrap::{Bootstrap, RunningServer};

pub fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
}

pub fn store(name: &str) -> StoreConfig {
    StoreConfig {
        path: Some(fixture(name)),
        ..StoreConfig::unset()
    }
}

/// Loopback config on ephemeral ports, persistence read from `dir`.
pub fn local_config(dir: &Path) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.config_dir = dir.to_path_buf();
    config.listener.host = "127.0.0.1".to_string();
    config.listener.port = 0;
    config.health.port = 0;
    config.management.port = 0;
    config
}

/// Config with TLS terminated by the fixture server certificate.
pub fn tls_config(dir: &Path) -> ServiceConfig {
    let mut config = local_config(dir);
    config.tls.enabled = true;
    config.tls.key_store = store("server.pem");
    config
}

/// Prompt that must never be consulted.
pub struct NoPrompt;

impl CredentialPrompt for NoPrompt {
    fn read_username(&mut self, _default: &str) -> io::Result<String> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "no prompt in tests"))
    }

    fn read_password(&mut self, _label: &str) -> io::Result<String> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "no prompt in tests"))
    }

    fn notify(&mut self, _message: &str) {}

    fn is_interactive(&self) -> bool {
        false
    }
}

pub async fn start(config: ServiceConfig) -> RunningServer {
    Bootstrap::new(config).start(&mut NoPrompt).await.unwrap()
}

pub async fn stop(server: RunningServer) {
    server.shutdown();
    tokio::time::timeout(Duration::from_secs(10), server.join())
        .await
        .expect("server did not stop");
}

pub fn url(addr: SocketAddr, path: &str) -> String {
    format!("http://{}{}", addr, path)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

/// Client trusting the fixture CA, resolving `localhost` to `addr`,
/// optionally presenting the identity in fixture `identity`.
pub fn tls_client(addr: SocketAddr, identity: Option<&str>) -> reqwest::Client {
    let ca = std::fs::read(fixture("ca.pem")).unwrap();
    let mut builder = reqwest::Client::builder()
        .use_rustls_tls()
        .add_root_certificate(reqwest::Certificate::from_pem(&ca).unwrap())
        .resolve("localhost", addr)
        .timeout(Duration::from_secs(5));
    if let Some(name) = identity {
        let pem = std::fs::read(fixture(name)).unwrap();
        builder = builder.identity(reqwest::Identity::from_pem(&pem).unwrap());
    }
    builder.build().unwrap()
}

pub fn tls_url(addr: SocketAddr, path: &str) -> String {
    format!("https://localhost:{}{}", addr.port(), path)
}
