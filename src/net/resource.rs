//! Key and trust store resource resolution.
//!
//! A configured store path is tried as a filesystem path first, then against
//! the bundled resource roots, in order:
//! 1. `<directory of the running executable>/resources/`
//! 2. the `resources/` directory shipped with the crate

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Directory name of the bundled resources.
pub const RESOURCE_DIR: &str = "resources";

/// A store that could not be found by any lookup strategy.
#[derive(Debug, Error)]
#[error("{kind} {} not found", .path.as_deref().unwrap_or("<none>"))]
pub struct ResourceNotFound {
    /// Which store was being resolved (`keyStore`, `trustStore`, ...).
    pub kind: &'static str,
    /// The configured path, if any.
    pub path: Option<String>,
}

/// Resolve `path` for the store named `kind`.
///
/// An absent path fails immediately; callers only resolve stores they need.
pub fn resolve_store(kind: &'static str, path: Option<&str>) -> Result<PathBuf, ResourceNotFound> {
    let not_found = || ResourceNotFound {
        kind,
        path: path.map(String::from),
    };
    let configured = path.ok_or_else(not_found)?;
    let resolved = resolve_in(configured, &bundled_roots()).ok_or_else(not_found)?;
    tracing::info!(store = kind, path = %resolved.display(), "Using {}", kind);
    Ok(resolved)
}

fn resolve_in(path: &str, roots: &[PathBuf]) -> Option<PathBuf> {
    let direct = Path::new(path);
    if direct.is_file() {
        return Some(direct.to_path_buf());
    }
    if direct.is_absolute() {
        return None;
    }
    roots
        .iter()
        .map(|root| root.join(path))
        .find(|candidate| candidate.is_file())
}

fn bundled_roots() -> Vec<PathBuf> {
    let mut roots = Vec::with_capacity(2);
    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        roots.push(dir.join(RESOURCE_DIR));
    }
    roots.push(Path::new(env!("CARGO_MANIFEST_DIR")).join(RESOURCE_DIR));
    roots
}
