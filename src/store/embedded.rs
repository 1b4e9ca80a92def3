//! Embedded data-store server lifecycle.
//!
//! # Responsibilities
//! - Decide whether the embedded store runs (driver + flag)
//! - Refuse any bind host outside the loopback allow-list
//! - Spawn the external store process and stop it on shutdown
//!
//! # Design Decisions
//! - An unparseable connection URL means "no embedded store", not an error
//! - The bind-host check runs before anything is spawned
//! - The process is killed when the server shuts down

use std::path::Path;
use std::process::Stdio;

use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use crate::config::{PersistenceProperties, ServiceConfig};
use crate::lifecycle::auxiliary::{AuxiliaryKind, AuxiliaryProcess};
use crate::lifecycle::Shutdown;
use crate::store::connection_string::ConnectionString;

/// Hosts the embedded store may bind to.
pub const LOOPBACK_HOSTS: [&str; 2] = ["localhost", "127.0.0.1"];

/// Whether `host` is in the loopback allow-list.
pub fn is_loopback(host: &str) -> bool {
    LOOPBACK_HOSTS.contains(&host)
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Cannot start embedded store on {host}. Use {} instead.", .allowed.join("|"))]
    BindPolicyViolation {
        host: String,
        allowed: Vec<&'static str>,
    },

    #[error("failed to start embedded store `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Everything needed to start the embedded store process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedStoreLaunch {
    pub program: String,
    pub base_args: Vec<String>,
    pub database: String,
    pub port: Option<u16>,
    /// `file:<dir>/<database>`
    pub location: String,
}

impl EmbeddedStoreLaunch {
    /// Resolve the launch plan.
    ///
    /// Returns `Ok(None)` when the embedded store is not requested, the
    /// persistence driver is a different one, or the connection URL carries
    /// no usable host and database.
    pub fn plan(
        config: &ServiceConfig,
        properties: &PersistenceProperties,
    ) -> Result<Option<Self>, StoreError> {
        if !(config.embedded_store.enabled && properties.uses_embedded_store()) {
            return Ok(None);
        }

        let connection = ConnectionString::parse(&properties.jdbc.url);
        let (Some(host), Some(database)) = (connection.host, connection.database) else {
            tracing::warn!(
                url = %properties.jdbc.url,
                "Connection URL has no host and database, embedded store not started"
            );
            return Ok(None);
        };

        if !is_loopback(&host) {
            return Err(StoreError::BindPolicyViolation {
                host,
                allowed: LOOPBACK_HOSTS.to_vec(),
            });
        }

        Ok(Some(Self {
            program: properties.embedded_store.program.clone(),
            base_args: properties.embedded_store.args.clone(),
            location: location(&config.embedded_store.directory, &database),
            database,
            port: connection.port,
        }))
    }

    /// Full argument list: configured prefix followed by the store options.
    pub fn arguments(&self) -> Vec<String> {
        let mut args = self.base_args.clone();
        args.extend([
            "--database.0".to_string(),
            self.location.clone(),
            "--dbname.0".to_string(),
            self.database.clone(),
        ]);
        if let Some(port) = self.port {
            args.extend(["--port".to_string(), port.to_string()]);
        }
        args.extend(["--no_system_exit".to_string(), "true".to_string()]);
        args
    }

    fn spawn(&self) -> Result<Child, StoreError> {
        Command::new(&self.program)
            .args(self.arguments())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| StoreError::Spawn {
                program: self.program.clone(),
                source,
            })
    }
}

fn location(directory: &Path, database: &str) -> String {
    format!("file:{}/{}", directory.display(), database)
}

/// Spawn the store and supervise it until it exits or shutdown is signalled.
pub fn start_embedded_store(
    launch: &EmbeddedStoreLaunch,
    shutdown: Shutdown,
) -> Result<(AuxiliaryProcess, JoinHandle<()>), StoreError> {
    let mut child = launch.spawn()?;
    let process = AuxiliaryProcess::started(AuxiliaryKind::EmbeddedStore);

    tracing::info!(
        pid = child.id(),
        database = %launch.database,
        location = %launch.location,
        port = ?launch.port,
        "Embedded store started"
    );

    let supervised = process.clone();
    let task = tokio::spawn(async move {
        tokio::select! {
            status = child.wait() => {
                tracing::warn!(status = ?status, "Embedded store exited");
            }
            _ = shutdown.wait() => {
                if let Err(e) = child.kill().await {
                    tracing::warn!(error = %e, "Failed to stop embedded store");
                }
                tracing::info!("Embedded store stopped");
            }
        }
        supervised.mark_stopped();
    });

    Ok((process, task))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::{EmbeddedStoreCommand, JdbcProperties};
    use std::path::PathBuf;
    use std::time::Duration;

    fn properties(url: &str) -> PersistenceProperties {
        PersistenceProperties {
            jdbc: JdbcProperties {
                driver_class_name: crate::config::loader::EMBEDDED_STORE_DRIVER.to_string(),
                url: url.to_string(),
            },
            embedded_store: EmbeddedStoreCommand {
                program: "sh".to_string(),
                args: vec!["-c".to_string(), "sleep 30".to_string(), "embedded-store".to_string()],
            },
        }
    }

    fn enabled_config() -> ServiceConfig {
        let mut config = ServiceConfig::default();
        config.embedded_store.enabled = true;
        config.embedded_store.directory = PathBuf::from("/var/lib/store");
        config
    }

    #[test]
    fn loopback_allow_list() {
        assert!(is_loopback("localhost"));
        assert!(is_loopback("127.0.0.1"));
        assert!(!is_loopback("10.0.0.5"));
        assert!(!is_loopback("0.0.0.0"));
    }

    #[test]
    fn not_requested_without_flag() {
        let config = ServiceConfig::default();
        let plan = EmbeddedStoreLaunch::plan(&config, &properties("jdbc:hsqldb:hsql://localhost:9001/fs"));
        assert_eq!(plan.unwrap(), None);
    }

    #[test]
    fn not_requested_for_other_driver() {
        let mut props = properties("jdbc:postgresql://localhost:5432/fs");
        props.jdbc.driver_class_name = "org.postgresql.Driver".to_string();
        assert_eq!(EmbeddedStoreLaunch::plan(&enabled_config(), &props).unwrap(), None);
    }

    #[test]
    fn unparseable_url_skips_store() {
        let plan = EmbeddedStoreLaunch::plan(&enabled_config(), &properties("not-a-url"));
        assert_eq!(plan.unwrap(), None);
    }

    #[test]
    fn non_loopback_host_is_a_policy_violation() {
        let err = EmbeddedStoreLaunch::plan(
            &enabled_config(),
            &properties("jdbc:hsqldb:hsql://10.0.0.5:9001/fs"),
        )
        .unwrap_err();
        match &err {
            StoreError::BindPolicyViolation { host, allowed } => {
                assert_eq!(host, "10.0.0.5");
                assert_eq!(allowed, &vec!["localhost", "127.0.0.1"]);
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(
            err.to_string(),
            "Cannot start embedded store on 10.0.0.5. Use localhost|127.0.0.1 instead."
        );
    }

    #[test]
    fn out_of_range_port_does_not_bypass_policy() {
        let err = EmbeddedStoreLaunch::plan(
            &enabled_config(),
            &properties("jdbc:hsqldb:hsql://10.0.0.5:99999/fs"),
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::BindPolicyViolation { ref host, .. } if host == "10.0.0.5"));

        let plan = EmbeddedStoreLaunch::plan(
            &enabled_config(),
            &properties("jdbc:hsqldb:hsql://localhost:99999/fs"),
        )
        .unwrap()
        .unwrap();
        assert_eq!(plan.port, None);
        assert!(!plan.arguments().contains(&"--port".to_string()));
    }

    #[test]
    fn launch_arguments() {
        let plan = EmbeddedStoreLaunch::plan(
            &enabled_config(),
            &properties("jdbc:hsqldb:hsql://localhost:9001/fs"),
        )
        .unwrap()
        .unwrap();
        assert_eq!(plan.location, "file:/var/lib/store/fs");
        assert_eq!(
            plan.arguments(),
            vec![
                "-c", "sleep 30", "embedded-store",
                "--database.0", "file:/var/lib/store/fs",
                "--dbname.0", "fs",
                "--port", "9001",
                "--no_system_exit", "true",
            ]
        );
    }

    #[test]
    fn port_omitted_when_absent() {
        let plan = EmbeddedStoreLaunch::plan(
            &enabled_config(),
            &properties("jdbc:hsqldb:hsql://127.0.0.1/fs"),
        )
        .unwrap()
        .unwrap();
        assert!(!plan.arguments().contains(&"--port".to_string()));
    }

    #[tokio::test]
    async fn store_is_stopped_on_shutdown() {
        let plan = EmbeddedStoreLaunch::plan(
            &enabled_config(),
            &properties("jdbc:hsqldb:hsql://localhost:9001/fs"),
        )
        .unwrap()
        .unwrap();
        let shutdown = Shutdown::new();
        let (process, task) = start_embedded_store(&plan, shutdown.clone()).unwrap();
        assert!(process.is_running());

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
        assert!(!process.is_running());
    }

    #[test]
    fn missing_program_fails_to_spawn() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let _guard = runtime.enter();
        let mut plan = EmbeddedStoreLaunch::plan(
            &enabled_config(),
            &properties("jdbc:hsqldb:hsql://localhost:9001/fs"),
        )
        .unwrap()
        .unwrap();
        plan.program = "/nonexistent/store-server".to_string();
        let err = start_embedded_store(&plan, Shutdown::new()).unwrap_err();
        assert!(matches!(err, StoreError::Spawn { .. }));
    }
}
