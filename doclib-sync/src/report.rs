//! Operation reports: an ordered list of signals per operation.
//!
//! Failures are additive. An operation keeps going after a non-fatal failure
//! and the report's [`Status`] is `Failed` as soon as any failure signal is
//! present.

use std::fmt;
use std::path::PathBuf;

use doclib_core::registry::LoadStatus;
use doclib_core::types::{OperationName, ProductCode, Signature, TicketId};

use crate::fs::CopyOutcome;

/// Something that happened during an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    // -- registry ----------------------------------------------------------
    RegistryLoaded(LoadStatus),
    RegistryLoadFailed { reason: String },
    RegistrySaved { path: PathBuf, records: usize },
    RegistrySaveFailed { reason: String },
    Registered(Signature),
    AlreadyRegistered(Signature),

    // -- files -------------------------------------------------------------
    Collected { files: usize },
    NothingCollected { root: PathBuf },
    WalkFailed { root: PathBuf, reason: String },
    LibraryUpdated(CopyOutcome),
    CheckedOut(CopyOutcome),
    CopyFailed { from: PathBuf, to: PathBuf, reason: String },

    // -- tickets -----------------------------------------------------------
    TicketFound(TicketId),
    TicketNotFound(TicketId),
    TicketLookupFailed { reason: String },
    TicketProjectMismatch { ticket: TicketId, product: ProductCode },
    SummaryUpdated { summary: String },
    SummaryUpdateFailed { reason: String },

    // -- repositories ------------------------------------------------------
    Committed { repository: PathBuf, message: String },
    NothingToCommit { repository: PathBuf },
    BranchCheckedOut { repository: PathBuf, branch: String },
    RepositoryFailed { repository: PathBuf, reason: String },
    WorkspaceDirty { repository: PathBuf },
    FeatureBranchNotFound { ticket: TicketId },
    FeatureBranchAmbiguous { candidates: Vec<String> },
    FeatureBranchChosen { branch: String, candidates: Vec<String> },
    Merged { branch: String },
    AlreadyMerged { branch: String },
    MergeConflict { branch: String },

    // -- merge pass --------------------------------------------------------
    MergeTargetFormatMismatch(Signature),
    DocumentUnreadable { path: PathBuf, reason: String },
    Propagated { from: PathBuf, to: PathBuf, sibling: ProductCode },
    Observed { key: String, document: PathBuf, values: Vec<String> },
    AgentFailed { agent: String, document: PathBuf, reason: String },
}

impl Signal {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Signal::RegistryLoadFailed { .. }
                | Signal::RegistrySaveFailed { .. }
                | Signal::NothingCollected { .. }
                | Signal::WalkFailed { .. }
                | Signal::CopyFailed { .. }
                | Signal::TicketProjectMismatch { .. }
                | Signal::SummaryUpdateFailed { .. }
                | Signal::RepositoryFailed { .. }
                | Signal::WorkspaceDirty { .. }
                | Signal::FeatureBranchNotFound { .. }
                | Signal::FeatureBranchAmbiguous { .. }
                | Signal::MergeConflict { .. }
                | Signal::MergeTargetFormatMismatch(_)
                | Signal::DocumentUnreadable { .. }
                | Signal::AgentFailed { .. }
        )
    }

    /// Worth a warning even though the operation may still succeed.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Signal::TicketNotFound(_)
                | Signal::TicketLookupFailed { .. }
                | Signal::FeatureBranchChosen { .. }
        )
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::RegistryLoaded(LoadStatus::Loaded(n)) => write!(f, "registry loaded ({n} records)"),
            Signal::RegistryLoaded(LoadStatus::Missing) => write!(f, "registry not found, starting empty"),
            Signal::RegistryLoadFailed { reason } => write!(f, "registry load failed: {reason}"),
            Signal::RegistrySaved { path, records } => {
                write!(f, "registry saved: {} ({records} records)", path.display())
            }
            Signal::RegistrySaveFailed { reason } => write!(f, "registry save failed: {reason}"),
            Signal::Registered(sig) => write!(f, "registered {sig}"),
            Signal::AlreadyRegistered(sig) => write!(f, "already registered {sig}"),
            Signal::Collected { files } => write!(f, "collected {files} files"),
            Signal::NothingCollected { root } => {
                write!(f, "no documents found under {}", root.display())
            }
            Signal::WalkFailed { root, reason } => {
                write!(f, "cannot read {}: {reason}", root.display())
            }
            Signal::LibraryUpdated(outcome) => write_copy(f, "library", outcome),
            Signal::CheckedOut(outcome) => write_copy(f, "workspace", outcome),
            Signal::CopyFailed { from, to, reason } => write!(
                f,
                "copy {} -> {} failed: {reason}",
                from.display(),
                to.display()
            ),
            Signal::TicketFound(id) => write!(f, "ticket {id} found"),
            Signal::TicketNotFound(id) => {
                write!(f, "ticket '{id}' has not been found, using offline resources")
            }
            Signal::TicketLookupFailed { reason } => {
                write!(f, "ticket lookup failed ({reason}), using offline resources")
            }
            Signal::TicketProjectMismatch { ticket, product } => write!(
                f,
                "the current project code [{product}] is different from ticket ID [{ticket}]"
            ),
            Signal::SummaryUpdated { summary } => write!(f, "ticket summary: {summary}"),
            Signal::SummaryUpdateFailed { reason } => {
                write!(f, "ticket summary not updated: {reason}")
            }
            Signal::Committed {
                repository,
                message,
            } => write!(f, "committed in {}: {message}", repository.display()),
            Signal::NothingToCommit { repository } => {
                write!(f, "nothing to commit in {}", repository.display())
            }
            Signal::BranchCheckedOut { repository, branch } => {
                write!(f, "on branch {branch} in {}", repository.display())
            }
            Signal::RepositoryFailed { repository, reason } => {
                write!(f, "repository {}: {reason}", repository.display())
            }
            Signal::WorkspaceDirty { repository } => write!(
                f,
                "some changes in {} are not committed",
                repository.display()
            ),
            Signal::FeatureBranchNotFound { ticket } => {
                write!(f, "no feature branch starts with {ticket}")
            }
            Signal::FeatureBranchAmbiguous { candidates } => write!(
                f,
                "more than one feature branch matches: {}",
                candidates.join(", ")
            ),
            Signal::FeatureBranchChosen { branch, candidates } => write!(
                f,
                "using {branch} out of {} matching branches",
                candidates.len()
            ),
            Signal::Merged { branch } => write!(f, "merged {branch}"),
            Signal::AlreadyMerged { branch } => write!(f, "{branch} is already merged"),
            Signal::MergeConflict { branch } => {
                write!(f, "merging {branch} produced conflicts, nothing committed")
            }
            Signal::MergeTargetFormatMismatch(sig) => {
                write!(f, "{sig} is not in the default document format")
            }
            Signal::DocumentUnreadable { path, reason } => {
                write!(f, "cannot read {}: {reason}", path.display())
            }
            Signal::Propagated { to, sibling, .. } => {
                write!(f, "propagated to {sibling}: {}", to.display())
            }
            Signal::Observed {
                key,
                document,
                values,
            } => write!(f, "{key} in {}: {}", document.display(), values.join(" | ")),
            Signal::AgentFailed {
                agent,
                document,
                reason,
            } => write!(f, "agent {agent} on {}: {reason}", document.display()),
        }
    }
}

fn write_copy(f: &mut fmt::Formatter<'_>, place: &str, outcome: &CopyOutcome) -> fmt::Result {
    match outcome {
        CopyOutcome::Written { path } => write!(f, "{place}: wrote {}", path.display()),
        CopyOutcome::Unchanged { path } => write!(f, "{place}: unchanged {}", path.display()),
    }
}

/// Overall outcome of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Failed,
}

/// Signals collected by one operation, in the order they happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationReport {
    pub operation: OperationName,
    pub signals: Vec<Signal>,
}

impl OperationReport {
    pub fn new(operation: OperationName) -> Self {
        Self {
            operation,
            signals: Vec::new(),
        }
    }

    pub fn push(&mut self, signal: Signal) {
        if signal.is_failure() || signal.is_warning() {
            tracing::warn!("{}: {signal}", self.operation);
        } else {
            tracing::debug!("{}: {signal}", self.operation);
        }
        self.signals.push(signal);
    }

    pub fn status(&self) -> Status {
        if self.signals.iter().any(Signal::is_failure) {
            Status::Failed
        } else {
            Status::Ok
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status() == Status::Ok
    }

    pub fn failures(&self) -> impl Iterator<Item = &Signal> {
        self.signals.iter().filter(|s| s.is_failure())
    }

    pub fn contains(&self, predicate: impl Fn(&Signal) -> bool) -> bool {
        self.signals.iter().any(predicate)
    }
}
