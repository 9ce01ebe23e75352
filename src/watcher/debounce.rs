//! Quiet-window debouncing of change events.

use std::time::Duration;

use tokio::time::Instant;

/// Quiet period used when nothing else is configured.
pub const DEFAULT_SETTLE_WINDOW: Duration = Duration::from_secs(1);

/// Coalesces bursts of change events into a single trigger.
///
/// Each [`arm`](Self::arm) replaces any pending deadline with
/// `now + window`. The trigger fires once, when a caller observes the
/// deadline has passed through [`take_elapsed`](Self::take_elapsed), and the
/// debouncer is then disarmed until the next event.
#[derive(Debug, Clone)]
pub struct ChangeDebouncer {
    window: Duration,
    deadline: Option<Instant>,
}

impl Default for ChangeDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_SETTLE_WINDOW)
    }
}

impl ChangeDebouncer {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Start a new window at `now`, superseding any pending one.
    pub fn arm(&mut self, now: Instant) -> Instant {
        let deadline = now + self.window;
        self.deadline = Some(deadline);
        deadline
    }

    /// Drop any pending trigger.
    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Consume the trigger if the window has elapsed by `now`.
    pub fn take_elapsed(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Resolve when `deadline` passes, or never when there is none.
///
/// Build a fresh future for every wait so a superseded deadline is simply
/// dropped.
pub async fn settled(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
