//! Credential input for first-run provisioning.
//!
//! [`CredentialPrompt`] is the only blocking interaction in the bootstrap.
//! [`ConsolePrompt`] reads from the terminal with masked password input;
//! [`EnvCredentials`] answers from environment variables for unattended
//! deployments.

use std::io::{self, BufRead, Write};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};

pub const USERNAME_ENV: &str = "SERVICE_ADMIN_USERNAME";
pub const PASSWORD_ENV: &str = "SERVICE_ADMIN_PASSWORD";

/// Line-based source of a username and passwords.
pub trait CredentialPrompt: Send {
    /// Read a username; empty input selects `default`.
    fn read_username(&mut self, default: &str) -> io::Result<String>;

    /// Read one password entry without echoing it.
    fn read_password(&mut self, label: &str) -> io::Result<String>;

    /// Show a message to whoever is answering.
    fn notify(&mut self, message: &str);

    /// Whether a rejected answer can be asked for again.
    fn is_interactive(&self) -> bool {
        true
    }
}

/// Interactive terminal prompt.
#[derive(Debug, Default)]
pub struct ConsolePrompt;

impl CredentialPrompt for ConsolePrompt {
    fn read_username(&mut self, default: &str) -> io::Result<String> {
        let mut stdout = io::stdout();
        write!(stdout, "Username [{}]: ", default)?;
        stdout.flush()?;

        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        let name = line.trim();
        Ok(if name.is_empty() { default } else { name }.to_string())
    }

    fn read_password(&mut self, label: &str) -> io::Result<String> {
        let mut stdout = io::stdout();
        write!(stdout, "{}: ", label)?;
        stdout.flush()?;

        let password = {
            let _raw = RawModeGuard::enable()?;
            read_masked(&mut stdout)?
        };
        writeln!(stdout)?;
        Ok(password)
    }

    fn notify(&mut self, message: &str) {
        println!("{}", message);
    }
}

fn read_masked(out: &mut impl Write) -> io::Result<String> {
    let mut password = String::new();
    loop {
        let Event::Key(KeyEvent {
            code,
            modifiers,
            kind,
            ..
        }) = event::read()?
        else {
            continue;
        };
        if kind == KeyEventKind::Release {
            continue;
        }
        match code {
            KeyCode::Enter => return Ok(password),
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                return Err(io::Error::new(io::ErrorKind::Interrupted, "input cancelled"));
            }
            KeyCode::Backspace => {
                if password.pop().is_some() {
                    write!(out, "\x08 \x08")?;
                    out.flush()?;
                }
            }
            KeyCode::Char(c) if !modifiers.contains(KeyModifiers::CONTROL) => {
                password.push(c);
                write!(out, "*")?;
                out.flush()?;
            }
            _ => {}
        }
    }
}

/// Restores cooked mode on drop, including on early return.
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

/// Credentials taken from [`USERNAME_ENV`] and [`PASSWORD_ENV`].
///
/// Every password entry answers with the same value, so confirmation
/// always matches.
#[derive(Clone)]
pub struct EnvCredentials {
    username: Option<String>,
    password: String,
}

impl std::fmt::Debug for EnvCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl EnvCredentials {
    /// `None` unless the password variable is set.
    pub fn from_env() -> Option<Self> {
        let password = std::env::var(PASSWORD_ENV).ok()?;
        Some(Self {
            username: std::env::var(USERNAME_ENV).ok().filter(|u| !u.trim().is_empty()),
            password,
        })
    }
}

impl CredentialPrompt for EnvCredentials {
    fn read_username(&mut self, default: &str) -> io::Result<String> {
        Ok(self.username.clone().unwrap_or_else(|| default.to_string()))
    }

    fn read_password(&mut self, _label: &str) -> io::Result<String> {
        Ok(self.password.clone())
    }

    fn notify(&mut self, message: &str) {
        tracing::warn!("{}", message);
    }

    fn is_interactive(&self) -> bool {
        false
    }
}

/// Select the environment provider when configured, the console otherwise.
pub fn default_prompt() -> Box<dyn CredentialPrompt> {
    match EnvCredentials::from_env() {
        Some(credentials) => Box::new(credentials),
        None => Box::new(ConsolePrompt),
    }
}
