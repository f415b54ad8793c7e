//! Error types for doclib-sync.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from the filesystem port.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from the version-control port.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    #[error("repository at {path} has no working directory")]
    Bare { path: PathBuf },

    #[error("path {path} is outside the repository at {workdir}")]
    OutsideWorkdir { path: PathBuf, workdir: PathBuf },

    #[error("branch `{0}` does not exist")]
    BranchNotFound(String),

    /// The merge produced conflicts; nothing was committed.
    #[error("merging `{branch}` produced conflicts")]
    MergeConflict { branch: String },

    #[error("could not create repository directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from the ticket lookup port.
#[derive(Debug, Error)]
pub enum TicketError {
    #[error("no ticket site configured (set `jira_site`)")]
    NotConfigured,

    #[error("ticket request failed: {0}")]
    Http(String),

    #[error("unexpected ticket response: {0}")]
    Parse(String),
}

/// Errors from the interactive prompt port.
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("prompt cancelled")]
    Cancelled,

    #[error("prompt failed: {0}")]
    Failed(String),
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
