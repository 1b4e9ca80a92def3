//! Auxiliary processes started alongside the listeners.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

/// What an auxiliary process is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuxiliaryKind {
    EmbeddedStore,
    RemoteManagement,
}

impl fmt::Display for AuxiliaryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuxiliaryKind::EmbeddedStore => f.write_str("embedded-store"),
            AuxiliaryKind::RemoteManagement => f.write_str("remote-management"),
        }
    }
}

/// Handle to a started auxiliary process. Clones share the running flag.
#[derive(Debug, Clone)]
pub struct AuxiliaryProcess {
    kind: AuxiliaryKind,
    running: Arc<AtomicBool>,
}

impl AuxiliaryProcess {
    /// A process that has just been started.
    pub fn started(kind: AuxiliaryKind) -> Self {
        Self {
            kind,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn kind(&self) -> AuxiliaryKind {
        self.kind
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn mark_stopped(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn status(&self) -> AuxiliaryStatus {
        AuxiliaryStatus {
            kind: self.kind,
            running: self.is_running(),
        }
    }
}

/// Point-in-time view of an auxiliary process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AuxiliaryStatus {
    pub kind: AuxiliaryKind,
    pub running: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_running_flag() {
        let process = AuxiliaryProcess::started(AuxiliaryKind::EmbeddedStore);
        let observer = process.clone();
        assert!(observer.is_running());
        process.mark_stopped();
        assert_eq!(
            observer.status(),
            AuxiliaryStatus {
                kind: AuxiliaryKind::EmbeddedStore,
                running: false
            }
        );
    }
}
