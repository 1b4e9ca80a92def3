//! Startup orchestration.
//!
//! # Responsibilities
//! - Load persistence properties from the config directory
//! - Start auxiliary processes (embedded store, remote management)
//! - Build TLS material and the authentication plan
//! - Bind the primary and health listeners, then begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Stages run in order, not concurrently
//! - Listeners are spawned last, after every bind succeeded
//! - A failure after something started stops it again before returning

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::auth::realm::REALM_FILE;
use crate::auth::{AuthError, AuthenticationPlan, CredentialPrompt};
use crate::config::{load_persistence, ConfigError, ServiceConfig};
use crate::http::routes::{self, HEALTH_PATH};
use crate::http::server::HttpServer;
use crate::lifecycle::auxiliary::{AuxiliaryKind, AuxiliaryProcess};
use crate::lifecycle::Shutdown;
use crate::management::{self, AccessControl, ManagementError, ManagementState};
use crate::net::listener::{Listener, ListenerError, ListenerInfo, Transport, HEALTH, MANAGEMENT, WEB};
use crate::net::tls::{TlsError, TlsMaterial};
use crate::observability::metrics;
use crate::store::{start_embedded_store, EmbeddedStoreLaunch, StoreError};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Tls(#[from] TlsError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Management(#[from] ManagementError),

    #[error("server failed to start: {0}")]
    Startup(#[from] ListenerError),
}

impl BootstrapError {
    /// Process exit status. Every bootstrap failure is fatal.
    pub fn exit_code(&self) -> i32 {
        1
    }
}

/// Builder for a running server.
pub struct Bootstrap {
    config: Arc<ServiceConfig>,
    service: Router,
    credentials_file: PathBuf,
}

impl Bootstrap {
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            config: Arc::new(config),
            service: routes::default_service(),
            credentials_file: PathBuf::from(REALM_FILE),
        }
    }

    /// Application router mounted under `<path>/service`.
    pub fn with_service(mut self, service: Router) -> Self {
        self.service = service;
        self
    }

    pub fn with_credentials_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_file = path.into();
        self
    }

    /// Run every startup stage and start serving.
    ///
    /// `prompt` is only consulted when basic authentication is enabled and
    /// the credentials file does not exist yet.
    pub async fn start(
        self,
        prompt: &mut dyn CredentialPrompt,
    ) -> Result<RunningServer, BootstrapError> {
        metrics::init_metrics();

        let shutdown = Shutdown::new();
        let mut tasks = Vec::new();
        match self.launch(prompt, &shutdown, &mut tasks).await {
            Ok(running) => Ok(running),
            Err(e) => {
                if !tasks.is_empty() {
                    tracing::warn!(error = %e, "Startup failed, stopping started components");
                    shutdown.trigger();
                    for task in tasks {
                        let _ = task.await;
                    }
                }
                Err(e)
            }
        }
    }

    async fn launch(
        &self,
        prompt: &mut dyn CredentialPrompt,
        shutdown: &Shutdown,
        tasks: &mut Vec<JoinHandle<()>>,
    ) -> Result<RunningServer, BootstrapError> {
        let config = &self.config;
        tracing::info!("Using config directory {}", config.config_dir.display());
        let properties = load_persistence(&config.config_dir)?;

        let state = ManagementState::new(config.clone(), shutdown.clone());
        let mut auxiliary = Vec::new();

        if let Some(launch) = EmbeddedStoreLaunch::plan(config, &properties)? {
            let (process, task) = start_embedded_store(&launch, shutdown.clone())?;
            tasks.push(task);
            state.register_auxiliary(process.clone()).await;
            auxiliary.push(process);
        }

        let mut servers = Vec::new();

        if config.management.enabled {
            let access = AccessControl::from_config(&config.management)?;
            let listener = Listener::bind(
                MANAGEMENT,
                &config.listener.host,
                config.management.port,
                Transport::Plain,
                None,
            )
            .await?;
            tracing::info!(
                "Remote management available at {}",
                management::service_url(&listener.info().host, listener.info().port)
            );
            let process = AuxiliaryProcess::started(AuxiliaryKind::RemoteManagement);
            state.register_auxiliary(process.clone()).await;
            auxiliary.push(process.clone());
            servers.push((
                HttpServer::new(listener, management::router(state.clone(), access)),
                Some(process),
            ));
        }

        let tls = TlsMaterial::build(&config.tls)?;
        let plan = AuthenticationPlan::select(&config.authentication, &self.credentials_file, prompt)?;

        let transport = if tls.is_some() {
            Transport::Secure
        } else {
            Transport::Plain
        };
        let web = Listener::bind(
            WEB,
            &config.listener.host,
            config.listener.port,
            transport,
            config.listener.connection_limit,
        )
        .await?;
        tracing::info!(
            "Service configured on {}{}",
            web.info().url(),
            routes::service_mount(&config.listener.path)
        );
        let mut primary = HttpServer::new(
            web,
            routes::primary_router(&config.listener.path, self.service.clone(), &plan),
        );
        if let Some(material) = &tls {
            primary = primary.with_tls(material);
        }
        servers.push((primary, None));

        if config.health.enabled {
            let health = Listener::bind(
                HEALTH,
                &config.listener.host,
                config.health.port,
                Transport::Plain,
                None,
            )
            .await?;
            tracing::info!("Health check available on {}{}", health.info().url(), HEALTH_PATH);
            servers.push((HttpServer::new(health, routes::health_router()), None));
        }

        tracing::info!("Starting server...");
        let mut listeners = Vec::with_capacity(servers.len());
        for (server, process) in servers {
            let info = server.info().clone();
            listeners.push((info.clone(), server.local_addr()));
            state.register_listener(info).await;

            let shutdown = shutdown.clone();
            tasks.push(tokio::spawn(async move {
                server.run(shutdown).await;
                if let Some(process) = process {
                    process.mark_stopped();
                }
            }));
        }
        tracing::info!("Server started.");

        Ok(RunningServer {
            shutdown: shutdown.clone(),
            listeners,
            auxiliary,
            tasks: std::mem::take(tasks),
        })
    }
}

/// Handle to a started server.
pub struct RunningServer {
    shutdown: Shutdown,
    listeners: Vec<(ListenerInfo, SocketAddr)>,
    auxiliary: Vec<AuxiliaryProcess>,
    tasks: Vec<JoinHandle<()>>,
}

impl RunningServer {
    pub fn listeners(&self) -> impl Iterator<Item = &ListenerInfo> {
        self.listeners.iter().map(|(info, _)| info)
    }

    /// Bound address of the listener called `name`.
    pub fn local_addr(&self, name: &str) -> Option<SocketAddr> {
        self.listeners
            .iter()
            .find(|(info, _)| info.name == name)
            .map(|(_, addr)| *addr)
    }

    pub fn auxiliary(&self) -> &[AuxiliaryProcess] {
        &self.auxiliary
    }

    /// Coordinator that stops this server, for signal handlers and tests.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }

    /// Block until the server has been stopped and every task finished.
    pub async fn join(self) {
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Server task failed");
            }
        }
        tracing::info!("Server stopped.");
    }
}
