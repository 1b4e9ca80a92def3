//! HTTP serving for one listener.
//!
//! # Responsibilities
//! - Run the accept loop of a bound [`Listener`]
//! - Perform the TLS handshake on secure listeners
//! - Serve HTTP/1.1 and HTTP/2 on each connection with the listener's router
//! - Tag requests with the listener name, peer address and client certificate
//! - Stop accepting on shutdown, then drain in-flight connections
//!
//! # Design Decisions
//! - Own accept loop (instead of `axum::serve`) so connection limits and
//!   peer certificates are visible per connection
//! - A failed handshake only affects its own connection

use std::net::SocketAddr;
use std::time::Duration;

use axum::{extract::ConnectInfo, Router};
use hyper::{body::Incoming, Request};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsAcceptor;
use tower::ServiceExt;

use crate::http::routes::ListenerName;
use crate::lifecycle::Shutdown;
use crate::net::connection::ConnectionTracker;
use crate::net::listener::{Listener, ListenerInfo};
use crate::net::tls::{PeerCertificate, TlsMaterial};
use crate::observability::metrics;

/// How long a client may take to complete the TLS handshake.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// How long shutdown waits for in-flight connections.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// A listener together with the router it serves.
pub struct HttpServer {
    listener: Listener,
    router: Router,
    tls: Option<TlsAcceptor>,
    tracker: ConnectionTracker,
}

impl HttpServer {
    pub fn new(listener: Listener, router: Router) -> Self {
        let tracker = ConnectionTracker::new(listener.name());
        Self {
            listener,
            router,
            tls: None,
            tracker,
        }
    }

    /// Terminate TLS on this listener.
    pub fn with_tls(mut self, material: &TlsMaterial) -> Self {
        self.tls = Some(material.acceptor());
        self
    }

    pub fn info(&self) -> &ListenerInfo {
        self.listener.info()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    /// Accept and serve connections until `shutdown` fires.
    pub async fn run(self, shutdown: Shutdown) {
        let name = self.listener.name();
        tracing::info!(listener = name, url = %self.info().url(), "Listener started");

        loop {
            tokio::select! {
                _ = shutdown.wait() => break,
                accepted = self.listener.accept() => {
                    let (stream, peer, permit) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            tracing::warn!(error = %e, "Accept failed");
                            tokio::time::sleep(Duration::from_millis(100)).await;
                            continue;
                        }
                    };
                    metrics::record_connection_accepted(name);
                    let guard = self.tracker.track();
                    let connection = Connection {
                        listener: name,
                        peer,
                        router: self.router.clone(),
                        shutdown: shutdown.clone(),
                    };
                    let tls = self.tls.clone();
                    tokio::spawn(async move {
                        let _permit = permit;
                        tracing::trace!(connection_id = %guard.id(), peer_addr = %peer, "Serving connection");
                        connection.serve(stream, tls).await;
                        drop(guard);
                    });
                }
            }
        }

        if !self.tracker.drain(DRAIN_TIMEOUT).await {
            tracing::warn!(
                listener = name,
                active = self.tracker.active_count(),
                "Connections still open after drain timeout"
            );
        }
        tracing::info!(listener = name, "Listener stopped");
    }
}

/// Per-connection context.
struct Connection {
    listener: &'static str,
    peer: SocketAddr,
    router: Router,
    shutdown: Shutdown,
}

impl Connection {
    async fn serve(self, stream: TcpStream, tls: Option<TlsAcceptor>) {
        let Some(acceptor) = tls else {
            return self.serve_io(stream, None).await;
        };

        match tokio::time::timeout(HANDSHAKE_TIMEOUT, acceptor.accept(stream)).await {
            Ok(Ok(stream)) => {
                let peer_certificate = stream
                    .get_ref()
                    .1
                    .peer_certificates()
                    .and_then(|certs| certs.first())
                    .cloned()
                    .map(PeerCertificate);
                self.serve_io(stream, peer_certificate).await;
            }
            Ok(Err(e)) => {
                metrics::record_tls_handshake_failure(self.listener);
                tracing::debug!(listener = self.listener, peer_addr = %self.peer, error = %e, "TLS handshake failed");
            }
            Err(_) => {
                metrics::record_tls_handshake_failure(self.listener);
                tracing::debug!(listener = self.listener, peer_addr = %self.peer, "TLS handshake timed out");
            }
        }
    }

    async fn serve_io<I>(self, io: I, peer_certificate: Option<PeerCertificate>)
    where
        I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let Connection {
            listener,
            peer,
            router,
            shutdown,
        } = self;

        let service = hyper::service::service_fn(move |mut request: Request<Incoming>| {
            let extensions = request.extensions_mut();
            extensions.insert(ListenerName(listener));
            extensions.insert(ConnectInfo(peer));
            if let Some(certificate) = &peer_certificate {
                extensions.insert(certificate.clone());
            }
            router.clone().oneshot(request)
        });

        let builder = auto::Builder::new(TokioExecutor::new());
        let connection = builder.serve_connection(TokioIo::new(io), service);
        tokio::pin!(connection);

        let result = tokio::select! {
            result = connection.as_mut() => result,
            _ = shutdown.wait() => {
                connection.as_mut().graceful_shutdown();
                connection.await
            }
        };
        if let Err(e) = result {
            tracing::debug!(listener, peer_addr = %peer, error = %e, "Connection closed with error");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::routes::{health_router, HEALTH_PATH};
    use crate::net::listener::{Transport, HEALTH};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn serves_until_shutdown() {
        let listener = Listener::bind(HEALTH, "127.0.0.1", 0, Transport::Plain, None)
            .await
            .unwrap();
        let addr = listener.local_addr();
        let shutdown = Shutdown::new();
        let task = tokio::spawn(HttpServer::new(listener, health_router()).run(shutdown.clone()));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(format!("GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n", HEALTH_PATH).as_bytes())
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("\"status\":\"UP\""));

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
        assert!(TcpStream::connect(addr).await.is_err());
    }
}
