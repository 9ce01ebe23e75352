//! Classification of how a child process ended.

use std::fmt;
use std::io;
use std::process::ExitStatus;

/// Exit code reported for a child that was terminated by a signal.
pub const SIGNALED_EXIT_CODE: i32 = 254;

/// Exit code reported when waiting on a child failed and its state is unknown.
pub const INDETERMINATE_EXIT_CODE: i32 = 253;

/// How a child process ended.
///
/// Kept as a tagged value until the supervisor exits; [`ExitOutcome::code`]
/// flattens it to the integer the supervisor reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitOutcome {
    /// The process exited on its own with this status code.
    Exited(i32),
    /// The process was terminated by a signal.
    Signaled(Option<i32>),
    /// Waiting on the process failed.
    Indeterminate(String),
}

impl ExitOutcome {
    /// Classify the result of waiting on a child.
    #[must_use]
    pub fn from_wait(result: io::Result<ExitStatus>) -> Self {
        match result {
            Ok(status) => Self::from_status(status),
            Err(e) => Self::Indeterminate(e.to_string()),
        }
    }

    /// Classify a collected exit status.
    #[must_use]
    pub fn from_status(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Self::Exited(code);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            Self::Signaled(status.signal())
        }

        #[cfg(not(unix))]
        {
            Self::Signaled(None)
        }
    }

    /// Flatten to the status code the supervisor propagates.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Self::Exited(code) if *code >= 0 => *code,
            Self::Exited(_) | Self::Signaled(_) => SIGNALED_EXIT_CODE,
            Self::Indeterminate(_) => INDETERMINATE_EXIT_CODE,
        }
    }

    /// Whether the process ended with status 0.
    #[must_use]
    pub fn success(&self) -> bool {
        self.code() == 0
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exited(0) => f.write_str("ended normally"),
            Self::Exited(code) => write!(f, "ended with status {code}"),
            Self::Signaled(Some(signal)) => write!(f, "terminated by signal {signal}"),
            Self::Signaled(None) => f.write_str("terminated by a signal"),
            Self::Indeterminate(reason) => write!(f, "could not be waited on: {reason}"),
        }
    }
}
