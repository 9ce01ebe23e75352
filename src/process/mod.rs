//! Child process management for the watcher and the worker.
//!
//! This module wraps one OS child per [`ManagedProcess`], classifies how it
//! ended with [`ExitOutcome`], and tracks the supervisor's bookkeeping for
//! it in a [`ProcessRecord`].

mod managed;
mod outcome;
mod record;

pub use managed::*;
pub use outcome::*;
pub use record::*;

use std::fmt;

/// Which of the two supervised children a value refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessRole {
    /// The configuration renderer (confd).
    Watcher,
    /// The service consuming the rendered configuration.
    Worker,
}

impl ProcessRole {
    /// The other child.
    #[must_use]
    pub fn counterpart(self) -> Self {
        match self {
            Self::Watcher => Self::Worker,
            Self::Worker => Self::Watcher,
        }
    }
}

impl fmt::Display for ProcessRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Watcher => f.write_str("watcher"),
            Self::Worker => f.write_str("worker"),
        }
    }
}

/// Signals the supervisor sends to its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// Ask the process to stop (SIGTERM).
    Terminate,
    /// Ask the process to reload its configuration (SIGHUP).
    Reload,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Terminate => f.write_str("SIGTERM"),
            Self::Reload => f.write_str("SIGHUP"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counterpart_is_symmetric() {
        assert_eq!(ProcessRole::Watcher.counterpart(), ProcessRole::Worker);
        assert_eq!(ProcessRole::Worker.counterpart(), ProcessRole::Watcher);
    }

    #[test]
    fn test_display_names() {
        assert_eq!(ProcessRole::Watcher.to_string(), "watcher");
        assert_eq!(SignalKind::Reload.to_string(), "SIGHUP");
        assert_eq!(SignalKind::Terminate.to_string(), "SIGTERM");
    }
}
