//! The supervisor's decision logic.
//!
//! [`SupervisorCore`] owns the phase, both [`ProcessRecord`]s and the
//! settle [`ChangeDebouncer`]. It never touches the OS: every input is an
//! event or a timer expiry, every output is a list of [`Action`]s for the
//! runner to carry out.

use std::time::Duration;

use tokio::time::Instant;

use crate::process::{ExitOutcome, ProcessRecord, ProcessRole, SignalKind};
use crate::supervisor::{SupervisorEvent, SupervisorPhase, SupervisorStateMachine, SupervisorStats};
use crate::watcher::{ChangeDebouncer, ChangeEvent};

/// Side effect requested by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Start the worker, then report back through
    /// [`SupervisorCore::worker_launched`].
    LaunchWorker,
    /// Deliver a signal to a child.
    Signal { role: ProcessRole, kind: SignalKind },
}

/// Pick the supervisor's exit code from the two children's codes.
///
/// The worker's failure wins over the watcher's.
#[must_use]
pub fn resolve_exit_code(watcher: i32, worker: i32) -> i32 {
    if worker != 0 {
        worker
    } else if watcher != 0 {
        watcher
    } else {
        0
    }
}

/// Event-driven state machine coordinating the watcher and the worker.
#[derive(Debug, Clone)]
pub struct SupervisorCore {
    state: SupervisorStateMachine,
    debouncer: ChangeDebouncer,
    watcher: ProcessRecord,
    worker: Option<ProcessRecord>,
}

impl SupervisorCore {
    /// Create the core for a watcher launched at `watcher_started_at`.
    ///
    /// The settle window starts immediately, whether or not the watcher has
    /// reported any change yet.
    #[must_use]
    pub fn new(settle_window: Duration, watcher_started_at: Instant) -> Self {
        let mut debouncer = ChangeDebouncer::new(settle_window);
        debouncer.arm(watcher_started_at);
        Self {
            state: SupervisorStateMachine::new(),
            debouncer,
            watcher: ProcessRecord::new(ProcessRole::Watcher, watcher_started_at),
            worker: None,
        }
    }

    #[must_use]
    pub fn phase(&self) -> SupervisorPhase {
        self.state.phase()
    }

    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.phase() == SupervisorPhase::Terminated
    }

    /// When the pending settle or reload window elapses, if one is armed.
    #[must_use]
    pub fn settle_deadline(&self) -> Option<Instant> {
        self.debouncer.deadline()
    }

    #[must_use]
    pub fn watcher(&self) -> &ProcessRecord {
        &self.watcher
    }

    #[must_use]
    pub fn worker(&self) -> Option<&ProcessRecord> {
        self.worker.as_ref()
    }

    #[must_use]
    pub fn stats(&self) -> SupervisorStats {
        self.state.stats()
    }

    /// Resolved exit code; only meaningful once terminated.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        resolve_exit_code(
            self.watcher.exit_code(),
            self.worker.as_ref().map_or(0, ProcessRecord::exit_code),
        )
    }

    /// React to one inbox message.
    pub fn handle(&mut self, event: SupervisorEvent) -> Vec<Action> {
        match event {
            SupervisorEvent::Changed(change) => {
                self.on_change(change);
                Vec::new()
            }
            SupervisorEvent::StreamClosed(role) => {
                tracing::debug!(%role, "Output stream closed, awaiting exit status");
                Vec::new()
            }
            SupervisorEvent::Exited { role, outcome } => self.on_exit(role, outcome),
            SupervisorEvent::TerminateRequested => self.on_terminate_requested(),
        }
    }

    /// React to the settle timer firing at `now`.
    ///
    /// A timer that is no longer armed, or whose deadline has moved past
    /// `now`, is ignored.
    pub fn on_window_elapsed(&mut self, now: Instant) -> Vec<Action> {
        match self.phase() {
            SupervisorPhase::Settling if self.debouncer.take_elapsed(now) => {
                tracing::info!("Watcher settled, starting worker");
                vec![Action::LaunchWorker]
            }
            SupervisorPhase::Running if self.debouncer.take_elapsed(now) => {
                self.state.record_reload();
                tracing::info!("Reloading worker now");
                vec![Action::Signal {
                    role: ProcessRole::Worker,
                    kind: SignalKind::Reload,
                }]
            }
            SupervisorPhase::Settling | SupervisorPhase::Running => Vec::new(),
            SupervisorPhase::Draining | SupervisorPhase::Terminated => {
                self.debouncer.disarm();
                Vec::new()
            }
        }
    }

    /// Record that the worker was started at `at`.
    ///
    /// Only the first call while settling has any effect.
    pub fn worker_launched(&mut self, at: Instant) {
        if self.worker.is_some() || self.phase() != SupervisorPhase::Settling {
            tracing::warn!(phase = ?self.phase(), "Ignoring unexpected worker launch");
            return;
        }
        self.worker = Some(ProcessRecord::new(ProcessRole::Worker, at));
        self.state.transition(SupervisorPhase::Running);
    }

    fn on_change(&mut self, change: ChangeEvent) {
        self.state.record_change();
        match (self.phase(), self.worker.as_ref()) {
            (SupervisorPhase::Settling, _) => {
                tracing::info!("Watcher updated a config file, waiting to start worker");
                self.debouncer.arm(change.detected_at());
            }
            (SupervisorPhase::Running, Some(worker))
                if change.detected_at() > worker.started_at() =>
            {
                tracing::info!("Watcher updated a config file, waiting to reload worker");
                self.debouncer.arm(change.detected_at());
            }
            (SupervisorPhase::Running, _) => {
                self.state.record_stale_change();
                tracing::debug!("Ignoring change detected before the worker started");
            }
            (SupervisorPhase::Draining | SupervisorPhase::Terminated, _) => {
                tracing::debug!("Ignoring change while shutting down");
            }
        }
    }

    fn on_terminate_requested(&mut self) -> Vec<Action> {
        if self.is_terminated() {
            return Vec::new();
        }
        tracing::info!("Termination requested, signaling watcher and worker unconditionally");
        self.enter_draining();

        let mut actions = Vec::new();
        for record in std::iter::once(&mut self.watcher).chain(self.worker.as_mut()) {
            record.mark_signaled();
            if !record.has_exited() {
                actions.push(Action::Signal {
                    role: record.role(),
                    kind: SignalKind::Terminate,
                });
            }
        }
        self.check_terminated();
        actions
    }

    fn on_exit(&mut self, role: ProcessRole, outcome: ExitOutcome) -> Vec<Action> {
        let Some(record) = self.record_mut(role) else {
            tracing::warn!(%role, %outcome, "Exit reported for a process that was never launched");
            return Vec::new();
        };
        let solicited = record.is_signaled();
        let code = outcome.code();
        if !record.record_exit(outcome.clone()) {
            return Vec::new();
        }
        record.mark_signaled();

        if outcome.success() {
            tracing::info!(%role, solicited, "{role} {outcome}");
        } else {
            tracing::warn!(%role, solicited, code, "{role} {outcome}");
        }

        self.enter_draining();

        let mut actions = Vec::new();
        if let Some(other) = self.record_mut(role.counterpart()) {
            if !other.has_exited() && other.mark_signaled() {
                tracing::info!(role = %other.role(), "Signaling {} after {role} exit", other.role());
                actions.push(Action::Signal {
                    role: other.role(),
                    kind: SignalKind::Terminate,
                });
            }
        }
        self.check_terminated();
        actions
    }

    fn record_mut(&mut self, role: ProcessRole) -> Option<&mut ProcessRecord> {
        match role {
            ProcessRole::Watcher => Some(&mut self.watcher),
            ProcessRole::Worker => self.worker.as_mut(),
        }
    }

    fn enter_draining(&mut self) {
        self.debouncer.disarm();
        self.state.transition(SupervisorPhase::Draining);
    }

    fn check_terminated(&mut self) {
        let worker_done = self.worker.as_ref().map_or(true, ProcessRecord::has_exited);
        if self.phase() == SupervisorPhase::Draining && self.watcher.has_exited() && worker_done {
            tracing::info!("Watcher and worker ended, exiting now");
            self.state.transition(SupervisorPhase::Terminated);
        }
    }
}
