//! Fixed exit codes for failures that happen before or while launching.
//!
//! These never overlap each other. A normal run exits with the resolved
//! child status instead.

use crate::supervisor::SupervisorError;

/// Provisioning files or loading configuration failed.
pub const PROVISION_FAILED: i32 = 32;

/// The watcher or the worker could not be started.
pub const LAUNCH_FAILED: i32 = 33;

/// No worker program was given on the command line.
pub const USAGE: i32 = 64;

/// Exit code for a supervisor error.
#[must_use]
pub fn for_supervisor_error(err: &SupervisorError) -> i32 {
    match err {
        SupervisorError::Launch(_) => LAUNCH_FAILED,
    }
}
