//! Credentials file handling.
//!
//! File format, one user per line:
//!
//! ```text
//! username: <credential>,<role>[,<role>...]
//! ```
//!
//! `<credential>` is either `SHA256:<hex digest>` (what provisioning writes)
//! or an untagged plaintext password. Blank lines and `#` comments are skipped.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::auth::prompt::CredentialPrompt;
use crate::auth::AuthError;

/// Default credentials file, relative to the working directory.
pub const REALM_FILE: &str = "realm.properties";
pub const REALM_NAME: &str = "Realm";
pub const DEFAULT_USERNAME: &str = "admin";
pub const MIN_PASSWORD_LENGTH: usize = 8;
/// Role given to provisioned users.
pub const PROVISIONED_ROLE: &str = "user";
/// Roles allowed through the basic authentication constraint.
pub const ALLOWED_ROLES: [&str; 2] = ["user", "admin"];

const SHA256_TAG: &str = "SHA256:";
const UNSUPPORTED_TAGS: [&str; 2] = ["MD5:", "CRYPT:"];

/// A stored credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// Lowercase hex SHA-256 digest.
    Sha256(String),
    Plain(String),
    /// Tagged with an algorithm this service cannot verify. Never matches.
    Unsupported(String),
}

impl Credential {
    pub fn parse(raw: &str) -> Self {
        if let Some(digest) = raw.strip_prefix(SHA256_TAG) {
            return Credential::Sha256(digest.to_ascii_lowercase());
        }
        match UNSUPPORTED_TAGS.iter().find(|tag| raw.starts_with(*tag)) {
            Some(tag) => Credential::Unsupported(tag.trim_end_matches(':').to_string()),
            None => Credential::Plain(raw.to_string()),
        }
    }

    pub fn verify(&self, password: &str) -> bool {
        match self {
            Credential::Sha256(digest) => constant_time_eq(digest, &sha256_hex(password)),
            Credential::Plain(stored) => constant_time_eq(stored, password),
            Credential::Unsupported(_) => false,
        }
    }
}

/// Compare secrets without stopping at the first differing byte.
pub(crate) fn constant_time_eq(a: &str, b: &str) -> bool {
    a.len() == b.len()
        && a
            .bytes()
            .zip(b.bytes())
            .fold(0u8, |acc, (x, y)| acc | (x ^ y))
            == 0
}

fn sha256_hex(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// `SHA256:<hex digest>` of `password`.
pub fn hash_password(password: &str) -> String {
    format!("{}{}", SHA256_TAG, sha256_hex(password))
}

#[derive(Debug, Clone)]
struct UserEntry {
    credential: Credential,
    roles: Vec<String>,
}

/// Users loaded from a credentials file.
#[derive(Debug, Clone, Default)]
pub struct Realm {
    users: HashMap<String, UserEntry>,
}

impl Realm {
    pub fn load(path: &Path) -> Result<Self, AuthError> {
        let content = fs::read_to_string(path).map_err(|source| AuthError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&content))
    }

    pub fn parse(content: &str) -> Self {
        let mut users = HashMap::new();
        for line in content.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((username, rest)) = line.split_once([':', '=']) else {
                tracing::warn!(line = %line, "Malformed credentials line skipped");
                continue;
            };
            let mut fields = rest.split(',').map(str::trim);
            let credential = Credential::parse(fields.next().unwrap_or_default());
            if let Credential::Unsupported(tag) = &credential {
                tracing::warn!(
                    user = %username.trim(),
                    tag = %tag,
                    "Unsupported credential, user cannot log in"
                );
            }
            let roles = fields.filter(|r| !r.is_empty()).map(String::from).collect();
            users.insert(username.trim().to_string(), UserEntry { credential, roles });
        }
        Self { users }
    }

    /// Roles of `username` when `password` matches.
    pub fn authenticate(&self, username: &str, password: &str) -> Option<&[String]> {
        let entry = self.users.get(username)?;
        entry
            .credential
            .verify(password)
            .then_some(entry.roles.as_slice())
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

/// Make sure the credentials file exists, provisioning it through `prompt`
/// when it does not.
pub fn ensure_credentials_file(
    path: &Path,
    prompt: &mut dyn CredentialPrompt,
) -> Result<(), AuthError> {
    if path.exists() {
        tracing::info!(path = %path.display(), "Using file {}", path.display());
        return Ok(());
    }

    prompt.notify(&format!(
        "No credentials file found at {}. Create the administrator account.",
        path.display()
    ));
    let username = prompt.read_username(DEFAULT_USERNAME).map_err(AuthError::Prompt)?;
    if username.is_empty()
        || username.contains([':', '=', ',', '#'])
        || username.contains(char::is_whitespace)
    {
        return Err(AuthError::InvalidUsername(username));
    }
    let password = read_confirmed_password(prompt)?;

    tracing::info!(path = %path.display(), "Writing to file {}", path.display());
    let line = format!("{}: {},{}\n", username, hash_password(&password), PROVISIONED_ROLE);
    fs::write(path, line).map_err(|source| AuthError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_confirmed_password(prompt: &mut dyn CredentialPrompt) -> Result<String, AuthError> {
    loop {
        let password = prompt.read_password("Password").map_err(AuthError::Prompt)?;
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            let reason = format!("Password must be at least {} characters.", MIN_PASSWORD_LENGTH);
            if !prompt.is_interactive() {
                return Err(AuthError::RejectedPassword(reason));
            }
            prompt.notify(&reason);
            continue;
        }

        let confirmation = prompt.read_password("Confirm password").map_err(AuthError::Prompt)?;
        if password == confirmation {
            return Ok(password);
        }
        if !prompt.is_interactive() {
            return Err(AuthError::RejectedPassword("Passwords do not match.".to_string()));
        }
        prompt.notify("Passwords do not match, try again.");
    }
}
