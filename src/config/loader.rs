//! Persistence properties loading from disk.
//!
//! Layers, lowest precedence first:
//! 1. built-in defaults
//! 2. `<configDir>/persistence.advanced.toml`
//! 3. `<configDir>/persistence.toml`
//!
//! Missing files are skipped. A present file that fails to read or parse is
//! a configuration error.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::validation::ConfigError;

pub const ADVANCED_FILE: &str = "persistence.advanced.toml";
pub const FILE: &str = "persistence.toml";

/// Driver name that selects the embedded store.
pub const EMBEDDED_STORE_DRIVER: &str = "org.hsqldb.jdbcDriver";

/// Persistence connection info consumed by the auxiliary process manager.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersistenceProperties {
    pub jdbc: JdbcProperties,
    pub embedded_store: EmbeddedStoreCommand,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JdbcProperties {
    pub driver_class_name: String,
    pub url: String,
}

/// Command line prefix of the external store server.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbeddedStoreCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for PersistenceProperties {
    fn default() -> Self {
        Self {
            jdbc: JdbcProperties {
                driver_class_name: EMBEDDED_STORE_DRIVER.to_string(),
                url: "jdbc:hsqldb:hsql://localhost:9001/fs".to_string(),
            },
            embedded_store: EmbeddedStoreCommand {
                program: "java".to_string(),
                args: vec![
                    "-cp".to_string(),
                    "hsqldb.jar".to_string(),
                    "org.hsqldb.server.Server".to_string(),
                ],
            },
        }
    }
}

/// One file's worth of overrides.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PersistenceLayer {
    pub jdbc: JdbcLayer,
    pub embedded_store: EmbeddedStoreLayer,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JdbcLayer {
    pub driver_class_name: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmbeddedStoreLayer {
    pub program: Option<String>,
    pub args: Option<Vec<String>>,
}

impl PersistenceLayer {
    pub fn apply_to(self, properties: &mut PersistenceProperties) {
        if let Some(driver) = self.jdbc.driver_class_name {
            properties.jdbc.driver_class_name = driver;
        }
        if let Some(url) = self.jdbc.url {
            properties.jdbc.url = url;
        }
        if let Some(program) = self.embedded_store.program {
            properties.embedded_store.program = program;
        }
        if let Some(args) = self.embedded_store.args {
            properties.embedded_store.args = args;
        }
    }
}

impl PersistenceProperties {
    /// Whether the configured driver is the embedded store's driver.
    pub fn uses_embedded_store(&self) -> bool {
        self.jdbc.driver_class_name == EMBEDDED_STORE_DRIVER
    }
}

/// Load the layered persistence properties from `config_dir`.
pub fn load_persistence(config_dir: &Path) -> Result<PersistenceProperties, ConfigError> {
    let mut properties = PersistenceProperties::default();
    for name in [ADVANCED_FILE, FILE] {
        let path = config_dir.join(name);
        if let Some(layer) = load_layer(&path)? {
            tracing::info!(path = %path.display(), "Loaded persistence properties");
            layer.apply_to(&mut properties);
        }
    }
    Ok(properties)
}

fn load_layer(path: &Path) -> Result<Option<PersistenceLayer>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content)
        .map(Some)
        .map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
}
