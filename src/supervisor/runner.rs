//! Supervisor runner for the watcher and worker processes.
//!
//! This module connects the process launcher, the notification tap and the
//! [`SupervisorCore`] together in a single event loop.

use std::time::Duration;

use tokio::sync::mpsc::{self, Sender};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::SidecarConfig;
use crate::process::{
    ExitOutcome, LaunchError, LaunchSpec, ManagedProcess, ProcessRole, SignalKind,
};
use crate::supervisor::{Action, SupervisorCore, SupervisorEvent, SupervisorStats};
use crate::watcher::{settled, DEFAULT_SETTLE_WINDOW};

/// Capacity of the coordinator inbox.
///
/// Large enough that the stderr pump never waits on a busy coordinator.
pub const DEFAULT_INBOX_CAPACITY: usize = 1024;

/// Error type for supervisor operations.
#[derive(thiserror::Error, Debug)]
pub enum SupervisorError {
    /// One of the children could not be started.
    #[error(transparent)]
    Launch(#[from] LaunchError),
}

/// Outcome of a supervised run.
#[derive(Debug, Clone)]
pub struct SupervisorReport {
    /// Code the supervisor should exit with.
    pub exit_code: i32,
    /// How the watcher ended.
    pub watcher: Option<ExitOutcome>,
    /// How the worker ended; `None` if it was never launched.
    pub worker: Option<ExitOutcome>,
    /// Counters for the run.
    pub stats: SupervisorStats,
}

/// The launched children, indexed by role.
struct Children {
    watcher: ManagedProcess,
    worker: Option<ManagedProcess>,
}

impl Children {
    fn get(&self, role: ProcessRole) -> Option<&ManagedProcess> {
        match role {
            ProcessRole::Watcher => Some(&self.watcher),
            ProcessRole::Worker => self.worker.as_ref(),
        }
    }

    fn signal(&self, role: ProcessRole, kind: SignalKind) {
        let Some(process) = self.get(role) else {
            tracing::debug!(%role, signal = %kind, "No process to signal");
            return;
        };
        if let Err(e) = process.signal(kind) {
            tracing::debug!(%role, signal = %kind, error = %e, "Signal not delivered");
        }
    }
}

/// Runs the watcher and the worker side by side.
#[derive(Debug, Clone)]
pub struct Supervisor {
    watcher: LaunchSpec,
    worker: LaunchSpec,
    settle_window: Duration,
    cancel: Option<CancellationToken>,
}

impl Supervisor {
    /// Create a supervisor for the given watcher and worker.
    ///
    /// The watcher's stderr is always captured so its change markers can be
    /// seen.
    #[must_use]
    pub fn new(watcher: LaunchSpec, worker: LaunchSpec) -> Self {
        Self {
            watcher: watcher.capture_stderr(),
            worker,
            settle_window: DEFAULT_SETTLE_WINDOW,
            cancel: None,
        }
    }

    /// Create a supervisor from loaded configuration and the worker command line.
    #[must_use]
    pub fn from_config(config: &SidecarConfig, program: &str, args: &[String]) -> Self {
        let watcher = LaunchSpec::new(&config.watcher.binary).args(config.watcher.args());
        Self::new(watcher, LaunchSpec::new(program).args(args.iter().cloned()))
            .with_settle_window(config.settle_window())
    }

    /// Set the quiet period used before launch and before each reload.
    #[must_use]
    pub fn with_settle_window(mut self, window: Duration) -> Self {
        self.settle_window = window;
        self
    }

    /// Set a cancellation token; cancelling it requests termination.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    #[must_use]
    pub fn settle_window(&self) -> Duration {
        self.settle_window
    }

    /// Launch the watcher, then supervise both children until they exit.
    ///
    /// # Errors
    ///
    /// Returns `SupervisorError::Launch` if either child fails to start. A
    /// watcher that is already running gets a best-effort termination signal
    /// first.
    pub async fn run(self) -> Result<SupervisorReport, SupervisorError> {
        let (tx, mut rx) = mpsc::channel(DEFAULT_INBOX_CAPACITY);
        let cancel = self.cancel.clone().unwrap_or_default();

        let watcher = ManagedProcess::launch(ProcessRole::Watcher, self.watcher.clone(), tx.clone())?;
        tracing::info!(
            window = ?self.settle_window,
            "Watcher started, waiting for it to settle before starting worker"
        );

        let mut core = SupervisorCore::new(self.settle_window, watcher.started_at());
        let mut children = Children {
            watcher,
            worker: None,
        };
        let mut termination_requested = false;

        while !core.is_terminated() {
            let deadline = core.settle_deadline();
            let actions = tokio::select! {
                biased;

                () = cancel.cancelled(), if !termination_requested => {
                    termination_requested = true;
                    tracing::info!("Received termination request");
                    core.handle(SupervisorEvent::TerminateRequested)
                }
                // `tx` lives until the loop ends, so the inbox never closes.
                Some(event) = rx.recv() => core.handle(event),
                () = settled(deadline) => core.on_window_elapsed(Instant::now()),
            };

            for action in actions {
                self.perform(action, &mut core, &mut children, &tx)?;
            }
        }

        let report = SupervisorReport {
            exit_code: core.exit_code(),
            watcher: core.watcher().exit().cloned(),
            worker: core.worker().and_then(|w| w.exit().cloned()),
            stats: core.stats(),
        };
        tracing::info!(
            exit_code = report.exit_code,
            changes = report.stats.changes,
            reloads = report.stats.reloads,
            "Supervisor finished"
        );
        Ok(report)
    }

    fn perform(
        &self,
        action: Action,
        core: &mut SupervisorCore,
        children: &mut Children,
        tx: &Sender<SupervisorEvent>,
    ) -> Result<(), SupervisorError> {
        match action {
            Action::LaunchWorker => {
                match ManagedProcess::launch(ProcessRole::Worker, self.worker.clone(), tx.clone()) {
                    Ok(worker) => {
                        core.worker_launched(worker.started_at());
                        children.worker = Some(worker);
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to launch worker");
                        children.signal(ProcessRole::Watcher, SignalKind::Terminate);
                        return Err(e.into());
                    }
                }
            }
            Action::Signal { role, kind } => children.signal(role, kind),
        }
        Ok(())
    }
}
