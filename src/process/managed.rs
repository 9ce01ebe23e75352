//! Launching, signaling and awaiting one child process.

use std::io;
use std::process::Stdio;

use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::mpsc::{self, Sender};
use tokio::time::Instant;

use super::{ExitOutcome, ProcessRole, SignalKind};
use crate::supervisor::SupervisorEvent;
use crate::watcher::NotificationTap;

/// Error type for launching a child process.
#[derive(thiserror::Error, Debug)]
pub enum LaunchError {
    /// The binary was not found.
    #[error("{role} binary not found: {program}")]
    NotFound { role: ProcessRole, program: String },
    /// Permission denied when spawning.
    #[error("permission denied launching {role}: {program}")]
    PermissionDenied { role: ProcessRole, program: String },
    /// Other I/O error.
    #[error("failed to launch {role} {program}: {source}")]
    Io {
        role: ProcessRole,
        program: String,
        #[source]
        source: io::Error,
    },
}

impl LaunchError {
    /// Create a `LaunchError` from an I/O error, classifying common cases.
    fn from_io(role: ProcessRole, program: &str, err: io::Error) -> Self {
        let program = program.to_string();
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound { role, program },
            io::ErrorKind::PermissionDenied => Self::PermissionDenied { role, program },
            _ => Self::Io {
                role,
                program,
                source: err,
            },
        }
    }

    /// The child that failed to launch.
    #[must_use]
    pub fn role(&self) -> ProcessRole {
        match self {
            Self::NotFound { role, .. }
            | Self::PermissionDenied { role, .. }
            | Self::Io { role, .. } => *role,
        }
    }
}

/// Error type for signal delivery.
#[derive(thiserror::Error, Debug)]
pub enum SignalError {
    /// The child has been reaped; nothing is left to signal.
    #[error("{0} has already exited")]
    Exited(ProcessRole),
    /// The kernel refused the signal.
    #[cfg(unix)]
    #[error("failed to deliver {kind} to {role}: {source}")]
    Delivery {
        role: ProcessRole,
        kind: SignalKind,
        #[source]
        source: nix::errno::Errno,
    },
    /// Signals cannot be sent on this platform.
    #[cfg(not(unix))]
    #[error("signal delivery is not supported on this platform")]
    Unsupported,
}

/// Program, arguments and stream wiring for a child.
#[derive(Debug, Clone, Default)]
pub struct LaunchSpec {
    program: String,
    args: Vec<String>,
    capture_stderr: bool,
}

impl LaunchSpec {
    /// Create a spec for the given program with no arguments.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    /// Append arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Pipe stderr through a [`NotificationTap`] instead of inheriting it.
    #[must_use]
    pub fn capture_stderr(mut self) -> Self {
        self.capture_stderr = true;
        self
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    #[must_use]
    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    #[must_use]
    pub fn captures_stderr(&self) -> bool {
        self.capture_stderr
    }
}

/// A running child process.
///
/// The `tokio::process::Child` itself is owned by a background waiter task
/// which posts exactly one [`SupervisorEvent::Exited`] to the inbox. Signal
/// requests are handed to that task, which resolves the pid through
/// `Child::id` at delivery time, so a reaped child is never signaled. When
/// stderr is captured the same task first drains it through a
/// [`NotificationTap`], so every change event reaches the inbox before the
/// exit does.
#[derive(Debug)]
pub struct ManagedProcess {
    role: ProcessRole,
    pid: Option<u32>,
    spec: LaunchSpec,
    started_at: Instant,
    signals: mpsc::UnboundedSender<SignalKind>,
}

impl ManagedProcess {
    /// Spawn the child and its waiter task.
    ///
    /// Stdin and stdout are always inherited; stderr is inherited unless the
    /// spec captures it.
    ///
    /// # Errors
    ///
    /// Returns `LaunchError` if the process fails to spawn.
    pub fn launch(
        role: ProcessRole,
        spec: LaunchSpec,
        inbox: Sender<SupervisorEvent>,
    ) -> Result<Self, LaunchError> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit());
        if spec.capture_stderr {
            cmd.stderr(Stdio::piped());
        } else {
            cmd.stderr(Stdio::inherit());
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| LaunchError::from_io(role, &spec.program, e))?;
        let started_at = Instant::now();
        let pid = child.id();
        let stderr = child.stderr.take();

        tracing::info!(
            %role,
            pid,
            program = %spec.program,
            args = ?spec.args,
            "Process launched"
        );

        let (signals, signal_rx) = mpsc::unbounded_channel();
        tokio::spawn(wait_for_exit(role, child, stderr, inbox, signal_rx));

        Ok(Self {
            role,
            pid,
            spec,
            started_at,
            signals,
        })
    }

    #[must_use]
    pub fn role(&self) -> ProcessRole {
        self.role
    }

    /// Process id captured at launch.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.pid
    }

    #[must_use]
    pub fn spec(&self) -> &LaunchSpec {
        &self.spec
    }

    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Ask the waiter task to signal the child.
    ///
    /// Delivery is fire-and-forget: the call never waits for the child to
    /// react. Failures after this point are logged by the waiter task.
    ///
    /// # Errors
    ///
    /// Returns `SignalError::Exited` once the child has been reaped.
    pub fn signal(&self, kind: SignalKind) -> Result<(), SignalError> {
        self.signals
            .send(kind)
            .map_err(|_| SignalError::Exited(self.role))
    }
}

/// Body of the waiter task: pump stderr, serve signal requests, report exit.
async fn wait_for_exit(
    role: ProcessRole,
    mut child: Child,
    stderr: Option<ChildStderr>,
    inbox: Sender<SupervisorEvent>,
    mut signals: mpsc::UnboundedReceiver<SignalKind>,
) {
    let pump = async {
        if let Some(stderr) = stderr {
            NotificationTap::new(stderr, tokio::io::stderr())
                .forward(&inbox)
                .await;
            let _ = inbox.send(SupervisorEvent::StreamClosed(role)).await;
        }
    };
    tokio::pin!(pump);
    let mut pumping = true;

    let status = loop {
        tokio::select! {
            () = &mut pump, if pumping => pumping = false,
            status = child.wait(), if !pumping => break status,
            Some(kind) = signals.recv() => match deliver(role, child.id(), kind) {
                Ok(()) => tracing::info!(%role, signal = %kind, "Signal sent"),
                Err(e) => tracing::debug!(%role, signal = %kind, error = %e, "Signal not delivered"),
            },
        }
    };

    // Requests still queued were made against a process that is now gone.
    drop(signals);
    let outcome = ExitOutcome::from_wait(status);
    let _ = inbox.send(SupervisorEvent::Exited { role, outcome }).await;
}

#[cfg(unix)]
fn deliver(role: ProcessRole, pid: Option<u32>, kind: SignalKind) -> Result<(), SignalError> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let pid = pid.ok_or(SignalError::Exited(role))?;
    let signal = match kind {
        SignalKind::Terminate => Signal::SIGTERM,
        SignalKind::Reload => Signal::SIGHUP,
    };
    let nix_pid = Pid::from_raw(i32::try_from(pid).unwrap_or(i32::MAX));
    kill(nix_pid, signal).map_err(|source| SignalError::Delivery { role, kind, source })
}

#[cfg(not(unix))]
fn deliver(_role: ProcessRole, _pid: Option<u32>, _kind: SignalKind) -> Result<(), SignalError> {
    Err(SignalError::Unsupported)
}
