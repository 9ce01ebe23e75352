//! Writing confd resource files from environment variables.
//!
//! Each `CONFD_CONFDFILE[_<x>]` or `CONFD_TEMPLATE[_<x>]` variable holds a
//! file name on its first line and the file content after it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Prefix of variables provisioning `conf.d/` resources.
pub const CONFDFILE_PREFIX: &str = "CONFD_CONFDFILE";

/// Prefix of variables provisioning `templates/` files.
pub const TEMPLATE_PREFIX: &str = "CONFD_TEMPLATE";

/// Kind of file to provision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProvisionKind {
    /// Template resource under `conf.d/`.
    ConfdFile,
    /// Template source under `templates/`.
    Template,
}

impl ProvisionKind {
    /// Subdirectory of the confd directory this kind lives in.
    #[must_use]
    pub fn subdir(self) -> &'static str {
        match self {
            Self::ConfdFile => "conf.d",
            Self::Template => "templates",
        }
    }

    /// Classify an environment variable name.
    #[must_use]
    pub fn from_variable(name: &str) -> Option<Self> {
        [(CONFDFILE_PREFIX, Self::ConfdFile), (TEMPLATE_PREFIX, Self::Template)]
            .into_iter()
            .find(|(prefix, _)| {
                name.strip_prefix(prefix)
                    .is_some_and(|rest| rest.is_empty() || rest.starts_with('_'))
            })
            .map(|(_, kind)| kind)
    }
}

/// One file to write before starting confd.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionFile {
    pub kind: ProvisionKind,
    pub name: String,
    pub content: String,
}

/// Errors that can occur while provisioning files.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("{variable} does not name a file")]
    EmptyName { variable: String },

    #[error("{variable} names an invalid file: {name}")]
    InvalidName { variable: String, name: String },

    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// The set of files requested through the environment.
///
/// A later variable naming the same file replaces the earlier one.
#[derive(Debug, Clone, Default)]
pub struct Provisioning {
    files: BTreeMap<(ProvisionKind, String), String>,
}

impl Provisioning {
    /// Collect provisioning requests from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable's first line is empty or is not a
    /// plain file name.
    pub fn from_env<I, K, V>(vars: I) -> Result<Self, ProvisionError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut files = BTreeMap::new();
        for (key, value) in vars {
            let key = key.as_ref();
            let Some(kind) = ProvisionKind::from_variable(key) else {
                continue;
            };
            let (name, content) = value.as_ref().split_once('\n').unwrap_or((value.as_ref(), ""));

            if name.is_empty() {
                return Err(ProvisionError::EmptyName {
                    variable: key.to_string(),
                });
            }
            if name.contains('/') || name == "." || name == ".." {
                return Err(ProvisionError::InvalidName {
                    variable: key.to_string(),
                    name: name.to_string(),
                });
            }

            files.insert((kind, name.to_string()), content.to_string());
        }
        Ok(Self { files })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Requested files, `conf.d/` entries first, each group sorted by name.
    #[must_use]
    pub fn files(&self) -> Vec<ProvisionFile> {
        self.files
            .iter()
            .map(|((kind, name), content)| ProvisionFile {
                kind: *kind,
                name: name.clone(),
                content: content.clone(),
            })
            .collect()
    }

    /// Write every requested file under `confdir`, creating directories as needed.
    ///
    /// Returns the paths written.
    ///
    /// # Errors
    ///
    /// Returns an error on the first directory or file that cannot be written.
    pub fn write_all(&self, confdir: &Path) -> Result<Vec<PathBuf>, ProvisionError> {
        let mut written = Vec::with_capacity(self.files.len());
        for ((kind, name), content) in &self.files {
            let folder = confdir.join(kind.subdir());
            std::fs::create_dir_all(&folder).map_err(|e| ProvisionError::CreateDir {
                path: folder.clone(),
                source: e,
            })?;

            let path = folder.join(name);
            tracing::info!(kind = kind.subdir(), file = %name, "Creating / updating confd file");
            std::fs::write(&path, content).map_err(|e| ProvisionError::Write {
                path: path.clone(),
                source: e,
            })?;
            written.push(path);
        }
        Ok(written)
    }
}
