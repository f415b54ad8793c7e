//! Error types for doclib-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Underlying I/O failure, with the path that caused it.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load, with the file path and serde_yaml line context.
    #[error("failed to parse registry at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Another live operation holds the registry lock.
    #[error("registry at {path} is locked by another operation (owner pid in {lock})")]
    Locked { path: PathBuf, lock: PathBuf },

    /// `save` was handed a lock taken for a different document.
    #[error("lock {lock} does not guard registry at {path}")]
    WrongLock { path: PathBuf, lock: PathBuf },
}

/// Errors raised while resolving or validating settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// An explicitly requested settings file does not exist.
    #[error("settings file not found at {path}")]
    NotFound { path: PathBuf },

    /// `dirs` could not resolve a default directory.
    #[error("cannot determine {what}; set it explicitly in the settings file")]
    NoDefaultDir { what: &'static str },

    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RegistryError {
    RegistryError::Io {
        path: path.into(),
        source,
    }
}
