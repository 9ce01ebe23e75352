//! Messages delivered to the supervisor's inbox.

use crate::process::{ExitOutcome, ProcessRole};
use crate::watcher::ChangeEvent;

/// Everything the coordinator reacts to, apart from its own settle timer.
///
/// Background tasks only ever send these; they never touch supervisor state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorEvent {
    /// The watcher reported that a managed file was rewritten.
    Changed(ChangeEvent),
    /// A captured output stream reached EOF.
    StreamClosed(ProcessRole),
    /// A child exited.
    Exited {
        role: ProcessRole,
        outcome: ExitOutcome,
    },
    /// The supervisor was asked to shut down.
    TerminateRequested,
}
