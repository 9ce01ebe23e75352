//! Configuration file loader and environment overrides.

use std::ffi::OsString;
use std::path::PathBuf;

use super::SidecarConfig;

/// Prefix shared by every variable the sidecar reads.
pub const ENV_PREFIX: &str = "CONFD_";

/// Environment variable holding the confd binary path.
pub const ENV_WATCHER_BINARY: &str = "CONFD_PATH";
/// Environment variable holding the confd configuration directory.
pub const ENV_CONFDIR: &str = "CONFD_CONFDIR";
/// Environment variable naming the confd backend.
pub const ENV_BACKEND: &str = "CONFD_BACKEND";
/// Environment variable passed to confd as `-node`.
pub const ENV_NODE: &str = "CONFD_NODE";
/// Environment variable overriding the settle window, in milliseconds.
pub const ENV_SETTLE_WINDOW_MS: &str = "CONFD_SIDECAR_SETTLE_MS";

/// Configuration loader that searches multiple locations.
#[derive(Debug)]
pub struct ConfigLoader {
    /// Search paths in order of priority.
    search_paths: Vec<PathBuf>,
    /// Whether a missing file is an error.
    required: bool,
}

impl ConfigLoader {
    /// Create a new config loader with default search paths.
    #[must_use]
    pub fn new() -> Self {
        let mut search_paths = Vec::new();

        // 1. Current directory: .confd-sidecar.toml
        search_paths.push(PathBuf::from(".confd-sidecar.toml"));

        // 2. User config directory: ~/.config/confd-sidecar/config.toml
        if let Some(config_dir) = dirs::config_dir() {
            search_paths.push(config_dir.join("confd-sidecar").join("config.toml"));
        }

        Self {
            search_paths,
            required: false,
        }
    }

    /// Create a config loader for one explicitly requested file.
    ///
    /// Unlike the default search, a missing file is reported as an error.
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            search_paths: vec![path],
            required: true,
        }
    }

    /// Load configuration from the first available file, or return defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed, or if
    /// an explicitly requested file does not exist.
    pub fn load(&self) -> Result<SidecarConfig, ConfigError> {
        if let Some(path) = self.find_config_file() {
            tracing::debug!(path = %path.display(), "Loading config file");
            return Self::load_from_path(&path);
        }

        if self.required {
            if let Some(path) = self.search_paths.first() {
                return Err(ConfigError::NotFound { path: path.clone() });
            }
        }

        tracing::debug!("No config file found, using defaults");
        Ok(SidecarConfig::default())
    }

    /// Load configuration, then apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if loading fails or an override is malformed.
    pub fn load_with_env<I, K, V>(&self, vars: I) -> Result<SidecarConfig, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut config = self.load()?;
        config.apply_env(vars)?;
        Ok(config)
    }

    /// Load configuration from a specific path.
    fn load_from_path(path: &PathBuf) -> Result<SidecarConfig, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.clone(),
            source: e,
        })
    }

    /// Get the search paths for debugging.
    #[must_use]
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Find the first config file that exists.
    #[must_use]
    pub fn find_config_file(&self) -> Option<PathBuf> {
        self.search_paths.iter().find(|p| p.exists()).cloned()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Collect the environment entries usable as configuration.
///
/// Entries with a name or value that is not valid UTF-8 are skipped, except
/// that a `CONFD_*` variable with such a value is rejected.
///
/// # Errors
///
/// Returns `ConfigError::NotUnicode` for a `CONFD_*` variable whose value is
/// not valid UTF-8.
pub fn utf8_environment<I>(vars: I) -> Result<Vec<(String, String)>, ConfigError>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    let mut env = Vec::new();
    for (key, value) in vars {
        let Ok(key) = key.into_string() else {
            tracing::debug!("Skipping environment variable with a non UTF-8 name");
            continue;
        };
        match value.into_string() {
            Ok(value) => env.push((key, value)),
            Err(value) if key.starts_with(ENV_PREFIX) => {
                return Err(ConfigError::NotUnicode {
                    variable: key,
                    value: value.to_string_lossy().into_owned(),
                });
            }
            Err(_) => {
                tracing::debug!(variable = %key, "Skipping environment variable with a non UTF-8 value");
            }
        }
    }
    Ok(env)
}

impl SidecarConfig {
    /// Override settings from `CONFD_*` environment variables.
    ///
    /// Empty values count as unset.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the settle window is not a
    /// number of milliseconds.
    pub fn apply_env<I, K, V>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (key, value) in vars {
            let key = key.as_ref();
            let value: String = value.into();
            if value.is_empty() {
                continue;
            }
            match key {
                ENV_WATCHER_BINARY => self.watcher.binary = value,
                ENV_CONFDIR => self.watcher.confdir = PathBuf::from(value),
                ENV_BACKEND => self.watcher.backend = value,
                ENV_NODE => self.watcher.node = Some(value),
                ENV_SETTLE_WINDOW_MS => {
                    self.settle_window_ms =
                        value.parse().map_err(|_| ConfigError::InvalidValue {
                            variable: key.to_string(),
                            value: value.clone(),
                        })?;
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid value for {variable}: {value}")]
    InvalidValue { variable: String, value: String },

    #[error("{variable} is not valid UTF-8: {value}")]
    NotUnicode { variable: String, value: String },
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_config_loader_default_paths() {
        let loader = ConfigLoader::new();
        assert!(!loader.search_paths().is_empty());
        assert!(loader.search_paths()[0].ends_with(".confd-sidecar.toml"));
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let loader = ConfigLoader::with_path(PathBuf::from("/nonexistent/path.toml"));
        let err = loader.load().unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn test_load_from_file_then_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sidecar.toml");
        std::fs::write(
            &path,
            "settle_window_ms = 500\n[watcher]\nbackend = \"etcd\"\nnode = \"http://etcd:2379\"\n",
        )
        .unwrap();

        let config = ConfigLoader::with_path(path)
            .load_with_env([(ENV_BACKEND, "vault"), ("HOME", "/root")])
            .unwrap();

        assert_eq!(config.watcher.backend, "vault");
        assert_eq!(config.watcher.node.as_deref(), Some("http://etcd:2379"));
        assert_eq!(config.settle_window(), Duration::from_millis(500));
    }

    #[test]
    fn test_parse_error_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "settle_window_ms = \"soon\"").unwrap();

        let err = ConfigLoader::with_path(path).load().unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = SidecarConfig::default();
        config
            .apply_env([
                (ENV_WATCHER_BINARY, "/opt/confd/bin/confd"),
                (ENV_CONFDIR, "/srv/confd"),
                (ENV_NODE, "consul:8500"),
                (ENV_SETTLE_WINDOW_MS, "2500"),
            ])
            .unwrap();

        assert_eq!(config.watcher.binary, "/opt/confd/bin/confd");
        assert_eq!(config.watcher.confdir, PathBuf::from("/srv/confd"));
        assert_eq!(config.watcher.backend, "consul");
        assert_eq!(config.watcher.node.as_deref(), Some("consul:8500"));
        assert_eq!(config.settle_window(), Duration::from_millis(2500));
    }

    #[test]
    fn test_empty_env_values_are_ignored() {
        let mut config = SidecarConfig::default();
        config
            .apply_env([(ENV_CONFDIR, ""), (ENV_NODE, "")])
            .unwrap();
        assert_eq!(config, SidecarConfig::default());
    }

    #[test]
    fn test_invalid_settle_window() {
        let mut config = SidecarConfig::default();
        let err = config
            .apply_env([(ENV_SETTLE_WINDOW_MS, "1s")])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid value for CONFD_SIDECAR_SETTLE_MS: 1s"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_environment_entries_are_skipped() {
        use std::os::unix::ffi::OsStringExt;

        let env = utf8_environment([
            (OsString::from("LANG"), OsString::from_vec(b"caf\xe9".to_vec())),
            (OsString::from_vec(b"X\xff".to_vec()), OsString::from("1")),
            (OsString::from(ENV_BACKEND), OsString::from("etcd")),
        ])
        .unwrap();

        assert_eq!(env, vec![(ENV_BACKEND.to_string(), "etcd".to_string())]);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_confd_value_is_rejected() {
        use std::os::unix::ffi::OsStringExt;

        let err = utf8_environment([(
            OsString::from(ENV_CONFDIR),
            OsString::from_vec(b"/etc/\xffconfd".to_vec()),
        )])
        .unwrap_err();

        assert!(matches!(&err, ConfigError::NotUnicode { variable, .. } if variable == ENV_CONFDIR));
    }
}
