//! confd sidecar - run a service next to confd and reload it on change.

pub mod config;
pub mod exit_code;
pub mod process;
pub mod supervisor;
pub mod watcher;
