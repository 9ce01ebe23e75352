//! Supervisor phase state machine.

/// Lifecycle phase of the supervisor.
///
/// Phases are ordered; the supervisor only ever moves forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SupervisorPhase {
    /// Watcher running, worker not yet launched.
    #[default]
    Settling,
    /// Both children running.
    Running,
    /// Shutdown in progress.
    Draining,
    /// Every launched child has exited.
    Terminated,
}

/// Phase tracking plus counters for the end-of-run summary.
#[derive(Debug, Clone, Default)]
pub struct SupervisorStateMachine {
    phase: SupervisorPhase,
    changes: usize,
    stale_changes: usize,
    reloads: usize,
}

impl SupervisorStateMachine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn phase(&self) -> SupervisorPhase {
        self.phase
    }

    /// Move to `new_phase`.
    ///
    /// Returns `false` without changing anything when `new_phase` is not
    /// ahead of the current phase.
    pub fn transition(&mut self, new_phase: SupervisorPhase) -> bool {
        if new_phase <= self.phase {
            tracing::trace!(current = ?self.phase, rejected = ?new_phase, "Ignoring phase transition");
            return false;
        }
        tracing::debug!(from = ?self.phase, to = ?new_phase, "Phase transition");
        self.phase = new_phase;
        true
    }

    pub fn record_change(&mut self) {
        self.changes = self.changes.saturating_add(1);
    }

    pub fn record_stale_change(&mut self) {
        self.stale_changes = self.stale_changes.saturating_add(1);
    }

    pub fn record_reload(&mut self) {
        self.reloads = self.reloads.saturating_add(1);
    }

    #[must_use]
    pub fn stats(&self) -> SupervisorStats {
        SupervisorStats {
            changes: self.changes,
            stale_changes: self.stale_changes,
            reloads: self.reloads,
        }
    }
}

/// Counters collected over one supervisor run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SupervisorStats {
    /// Change markers seen on the watcher stream.
    pub changes: usize,
    /// Changes dropped because they predate the worker launch.
    pub stale_changes: usize,
    /// Reload signals sent to the worker.
    pub reloads: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_settling() {
        let machine = SupervisorStateMachine::new();
        assert_eq!(machine.phase(), SupervisorPhase::Settling);
        assert_eq!(machine.stats(), SupervisorStats::default());
    }

    #[test]
    fn test_never_regresses() {
        let mut machine = SupervisorStateMachine::new();
        assert!(machine.transition(SupervisorPhase::Running));
        assert!(machine.transition(SupervisorPhase::Draining));
        assert!(!machine.transition(SupervisorPhase::Running));
        assert!(!machine.transition(SupervisorPhase::Draining));
        assert_eq!(machine.phase(), SupervisorPhase::Draining);
    }

    #[test]
    fn test_may_skip_running() {
        let mut machine = SupervisorStateMachine::new();
        assert!(machine.transition(SupervisorPhase::Draining));
        assert!(machine.transition(SupervisorPhase::Terminated));
    }

    #[test]
    fn test_counters() {
        let mut machine = SupervisorStateMachine::new();
        machine.record_change();
        machine.record_change();
        machine.record_stale_change();
        machine.record_reload();
        assert_eq!(
            machine.stats(),
            SupervisorStats {
                changes: 2,
                stale_changes: 1,
                reloads: 1,
            }
        );
    }
}
