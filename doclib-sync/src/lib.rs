//! # doclib-sync
//!
//! Library operations over the registry, the workspace and the two
//! repositories.
//!
//! Call [`pipeline::run`] to execute one operation with the production
//! adapters, or build a [`SyncOrchestrator`] from your own [`Ports`].

pub mod error;
pub mod fs;
pub mod orchestrator;
pub mod pipeline;
pub mod prompt;
pub mod report;
pub mod repository;
pub mod ticket;

pub use error::{PromptError, RepoError, SyncError, TicketError};
pub use fs::{CopyOutcome, Filesystem, LocalFs, WalkEntry};
pub use orchestrator::{Ports, SyncOrchestrator};
pub use pipeline::{run, Operation, SummarySource};
pub use prompt::{FixedResponse, Prompt, TerminalPrompt};
pub use report::{OperationReport, Signal, Status};
pub use repository::{Git2Provider, Git2Repository, Repository, RepositoryProvider};
pub use ticket::{JiraTicketService, OfflineTicketService, Ticket, TicketService};
