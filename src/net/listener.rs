//! Named TCP listeners with optional connection limits.
//!
//! # Responsibilities
//! - Bind a named listener to `host:port`
//! - Accept incoming TCP connections
//! - Enforce the connection limit via a semaphore, when one is configured
//!
//! When the limit is reached new connections wait in the kernel backlog until
//! a slot frees up.

use std::net::SocketAddr;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::schema::display_host;

pub const WEB: &str = "web";
pub const HEALTH: &str = "health";
pub const MANAGEMENT: &str = "management";

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to bind {name} listener on {address}: {source}")]
    Bind {
        name: &'static str,
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to accept on {name} listener: {source}")]
    Accept {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Transport security of a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Plain,
    Secure,
}

impl Transport {
    pub fn scheme(&self) -> &'static str {
        match self {
            Transport::Plain => "http",
            Transport::Secure => "https",
        }
    }
}

/// `{name, host, port, transport}` of a bound listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListenerInfo {
    pub name: &'static str,
    pub host: String,
    pub port: u16,
    pub transport: Transport,
    /// Maximum concurrent connections, `None` when unlimited.
    pub connection_limit: Option<usize>,
}

impl ListenerInfo {
    /// `scheme://display-host:port`
    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.transport.scheme(), display_host(&self.host), self.port)
    }
}

/// A bound TCP listener.
pub struct Listener {
    inner: TcpListener,
    local_addr: SocketAddr,
    info: ListenerInfo,
    connection_limit: Option<Arc<Semaphore>>,
}

impl Listener {
    /// Bind `name` to `host:port`. Port 0 picks an ephemeral port.
    pub async fn bind(
        name: &'static str,
        host: &str,
        port: u16,
        transport: Transport,
        connection_limit: Option<usize>,
    ) -> Result<Self, ListenerError> {
        let address = format!("{}:{}", host, port);
        let bind_error = |source| ListenerError::Bind {
            name,
            address: address.clone(),
            source,
        };

        let inner = TcpListener::bind((host, port)).await.map_err(bind_error)?;
        let local_addr = inner.local_addr().map_err(bind_error)?;

        tracing::info!(
            listener = name,
            address = %local_addr,
            transport = ?transport,
            connection_limit = ?connection_limit,
            "Listener bound"
        );

        Ok(Self {
            inner,
            local_addr,
            info: ListenerInfo {
                name,
                host: host.to_string(),
                port: local_addr.port(),
                transport,
                connection_limit,
            },
            connection_limit: connection_limit.map(|limit| Arc::new(Semaphore::new(limit))),
        })
    }

    /// Accept a connection, waiting for a free slot first when limited.
    ///
    /// The permit must be held for the connection's lifetime.
    pub async fn accept(
        &self,
    ) -> Result<(TcpStream, SocketAddr, Option<ConnectionPermit>), ListenerError> {
        let permit = match &self.connection_limit {
            // The semaphore is never closed.
            Some(limit) => limit
                .clone()
                .acquire_owned()
                .await
                .ok()
                .map(|permit| ConnectionPermit { _permit: permit }),
            None => None,
        };

        let (stream, addr) = self.inner.accept().await.map_err(|source| ListenerError::Accept {
            name: self.info.name,
            source,
        })?;

        tracing::debug!(
            listener = self.info.name,
            peer_addr = %addr,
            available_permits = ?self.available_permits(),
            "Connection accepted"
        );

        Ok((stream, addr, permit))
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn info(&self) -> &ListenerInfo {
        &self.info
    }

    pub fn name(&self) -> &'static str {
        self.info.name
    }

    /// Free connection slots, `None` when unlimited.
    pub fn available_permits(&self) -> Option<usize> {
        self.connection_limit.as_ref().map(|s| s.available_permits())
    }
}

/// A connection slot, released when dropped.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: OwnedSemaphorePermit,
}
