//! Access control for the management endpoint.
//!
//! Two whitespace-separated files, `#` starts a comment:
//!
//! ```text
//! # access file           # password file
//! monitor readonly        monitor m0nitor-pass
//! control readwrite       control c0ntrol-pass
//! ```
//!
//! Control is only enabled when both files are configured.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::auth::basic::decode_basic;
use crate::auth::realm::constant_time_eq;
use crate::config::ManagementConfig;
use crate::management::ManagementError;
use crate::observability::metrics;

const CHALLENGE: &str = "Basic realm=\"management\"";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AccessLevel {
    ReadOnly,
    ReadWrite,
}

impl AccessLevel {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "readonly" => Some(AccessLevel::ReadOnly),
            "readwrite" => Some(AccessLevel::ReadWrite),
            _ => None,
        }
    }

    /// Level needed for a request with `method`.
    pub fn required_for(method: &Method) -> Self {
        if method == Method::GET || method == Method::HEAD {
            AccessLevel::ReadOnly
        } else {
            AccessLevel::ReadWrite
        }
    }
}

/// Roles, their passwords and their access levels.
#[derive(Debug, Clone, Default)]
pub struct AccessControl {
    passwords: HashMap<String, String>,
    levels: HashMap<String, AccessLevel>,
}

impl AccessControl {
    /// Load access control for `config`. `None` unless both files are set.
    pub fn from_config(config: &ManagementConfig) -> Result<Option<Self>, ManagementError> {
        match (&config.access_file, &config.password_file) {
            (Some(access), Some(passwords)) => {
                Ok(Some(Self::parse(&read(access)?, &read(passwords)?)))
            }
            (Some(path), None) | (None, Some(path)) => {
                tracing::warn!(
                    path = %path.display(),
                    "Management access control needs both an access file and a password file, ignoring {}",
                    path.display()
                );
                Ok(None)
            }
            (None, None) => Ok(None),
        }
    }

    pub fn parse(access: &str, passwords: &str) -> Self {
        let levels = entries(access)
            .filter_map(|(role, value)| match AccessLevel::parse(value) {
                Some(level) => Some((role.to_string(), level)),
                None => {
                    tracing::warn!(role = %role, access = %value, "Unknown management access level");
                    None
                }
            })
            .collect();
        let passwords = entries(passwords)
            .map(|(role, password)| (role.to_string(), password.to_string()))
            .collect();
        Self { passwords, levels }
    }

    /// Access level of `role` when `password` matches.
    pub fn authorize(&self, role: &str, password: &str) -> Option<AccessLevel> {
        let stored = self.passwords.get(role)?;
        if !constant_time_eq(stored, password) {
            return None;
        }
        self.levels.get(role).copied()
    }
}

fn read(path: &Path) -> Result<String, ManagementError> {
    fs::read_to_string(path).map_err(|source| ManagementError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn entries(content: &str) -> impl Iterator<Item = (&str, &str)> {
    content
        .lines()
        .map(|line| line.split('#').next().unwrap_or_default().trim())
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            Some((parts.next()?, parts.next()?))
        })
}

/// Require credentials with enough access for the request method.
pub async fn require_access(
    State(control): State<Arc<AccessControl>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let level = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(decode_basic)
        .and_then(|(role, password)| control.authorize(&role, &password));

    match level {
        None => {
            metrics::record_authentication_failure("management", StatusCode::UNAUTHORIZED.as_u16());
            let mut response = StatusCode::UNAUTHORIZED.into_response();
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static(CHALLENGE));
            response
        }
        Some(level) if level < AccessLevel::required_for(request.method()) => {
            metrics::record_authentication_failure("management", StatusCode::FORBIDDEN.as_u16());
            StatusCode::FORBIDDEN.into_response()
        }
        Some(_) => next.run(request).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const ACCESS: &str = "# roles\nmonitor readonly\ncontrol readwrite\nbogus superuser\n";
    const PASSWORDS: &str = "monitor m0nitor-pass # trailing comment\ncontrol c0ntrol-pass\n";

    #[test]
    fn parses_levels_and_passwords() {
        let control = AccessControl::parse(ACCESS, PASSWORDS);
        assert_eq!(control.authorize("monitor", "m0nitor-pass"), Some(AccessLevel::ReadOnly));
        assert_eq!(control.authorize("control", "c0ntrol-pass"), Some(AccessLevel::ReadWrite));
        assert_eq!(control.authorize("control", "wrong"), None);
        assert_eq!(control.authorize("control", "c0ntrol-pas"), None);
        assert_eq!(control.authorize("control", "c0ntrol-passX"), None);
        assert_eq!(control.authorize("bogus", "anything"), None);
    }

    #[test]
    fn required_level_follows_method() {
        assert_eq!(AccessLevel::required_for(&Method::GET), AccessLevel::ReadOnly);
        assert_eq!(AccessLevel::required_for(&Method::POST), AccessLevel::ReadWrite);
        assert!(AccessLevel::ReadOnly < AccessLevel::ReadWrite);
    }

    #[test]
    fn both_files_are_needed() {
        let dir = tempfile::tempdir().unwrap();
        let access = dir.path().join("jmx.access");
        let passwords = dir.path().join("jmx.password");
        fs::write(&access, ACCESS).unwrap();
        fs::write(&passwords, PASSWORDS).unwrap();

        let mut config = ManagementConfig {
            enabled: true,
            port: 0,
            access_file: Some(access),
            password_file: None,
        };
        assert!(AccessControl::from_config(&config).unwrap().is_none());

        config.password_file = Some(passwords);
        assert!(AccessControl::from_config(&config).unwrap().is_some());

        config.password_file = Some(PathBuf::from("/no/such/jmx.password"));
        assert!(matches!(
            AccessControl::from_config(&config),
            Err(ManagementError::Io { .. })
        ));
    }
}
