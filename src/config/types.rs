//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default confd binary, looked up on `PATH`.
pub const DEFAULT_WATCHER_BINARY: &str = "confd";

/// Default confd configuration directory.
pub const DEFAULT_CONFDIR: &str = "/etc/confd";

/// Default confd backend.
pub const DEFAULT_BACKEND: &str = "consul";

/// Default quiet period before launching or reloading the worker.
pub const DEFAULT_SETTLE_WINDOW_MS: u64 = 1000;

/// How to run confd.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Path to the confd binary.
    pub binary: String,
    /// Directory holding `conf.d/` and `templates/`.
    pub confdir: PathBuf,
    /// Name of the data backend.
    pub backend: String,
    /// Value passed as `-node`, if any.
    pub node: Option<String>,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            binary: DEFAULT_WATCHER_BINARY.to_string(),
            confdir: PathBuf::from(DEFAULT_CONFDIR),
            backend: DEFAULT_BACKEND.to_string(),
            node: None,
        }
    }
}

impl WatcherConfig {
    /// Build the confd command-line flags.
    #[must_use]
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            format!("-confdir={}", self.confdir.display()),
            format!("-backend={}", self.backend),
            "-watch".to_string(),
        ];

        if let Some(node) = &self.node {
            args.push(format!("-node={node}"));
        }

        args
    }
}

/// Configuration for the sidecar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SidecarConfig {
    /// confd settings.
    pub watcher: WatcherConfig,
    /// Quiet period in milliseconds.
    pub settle_window_ms: u64,
}

impl Default for SidecarConfig {
    fn default() -> Self {
        Self {
            watcher: WatcherConfig::default(),
            settle_window_ms: DEFAULT_SETTLE_WINDOW_MS,
        }
    }
}

impl SidecarConfig {
    #[must_use]
    pub fn settle_window(&self) -> Duration {
        Duration::from_millis(self.settle_window_ms)
    }
}
