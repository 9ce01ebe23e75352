//! Supervisor-side bookkeeping for one child.

use tokio::time::Instant;

use super::{ExitOutcome, ProcessRole};

/// What the supervisor knows about one child.
///
/// `signaled` goes from false to true at most once and `exit` is filled in
/// at most once, when the exit notification arrives.
#[derive(Debug, Clone)]
pub struct ProcessRecord {
    role: ProcessRole,
    started_at: Instant,
    signaled: bool,
    exit: Option<ExitOutcome>,
}

impl ProcessRecord {
    #[must_use]
    pub fn new(role: ProcessRole, started_at: Instant) -> Self {
        Self {
            role,
            started_at,
            signaled: false,
            exit: None,
        }
    }

    #[must_use]
    pub fn role(&self) -> ProcessRole {
        self.role
    }

    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    #[must_use]
    pub fn is_signaled(&self) -> bool {
        self.signaled
    }

    #[must_use]
    pub fn has_exited(&self) -> bool {
        self.exit.is_some()
    }

    #[must_use]
    pub fn exit(&self) -> Option<&ExitOutcome> {
        self.exit.as_ref()
    }

    /// Set the signaled flag.
    ///
    /// Returns `true` only for the call that performed the transition.
    pub fn mark_signaled(&mut self) -> bool {
        if self.signaled {
            return false;
        }
        self.signaled = true;
        true
    }

    /// Store the exit outcome.
    ///
    /// Returns `false` and keeps the first outcome if one was already recorded.
    pub fn record_exit(&mut self, outcome: ExitOutcome) -> bool {
        if let Some(existing) = &self.exit {
            tracing::warn!(
                role = %self.role,
                existing = %existing,
                ignored = %outcome,
                "Duplicate exit notification"
            );
            return false;
        }
        self.exit = Some(outcome);
        true
    }

    /// Flattened exit code, 0 if the process has not exited.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        self.exit.as_ref().map_or(0, ExitOutcome::code)
    }
}
