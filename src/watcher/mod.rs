//! Watching the configuration renderer for changes.
//!
//! The [`NotificationTap`] turns the watcher's stderr into [`ChangeEvent`]s
//! and the [`ChangeDebouncer`] coalesces bursts of them into one trigger.

mod debounce;
mod tap;

pub use debounce::*;
pub use tap::*;
