//! Shared operation entrypoint used by the CLI.
//!
//! Wires the production adapters (local filesystem, git2, Jira or offline
//! lookup, terminal or fixed prompt) into a [`SyncOrchestrator`].

use std::path::PathBuf;
use std::time::Duration;

use doclib_core::layout::Layout;
use doclib_core::types::{ProductCode, TicketId};
use doclib_core::Settings;
use doclib_directive::AgentKind;

use crate::fs::LocalFs;
use crate::orchestrator::{Ports, SyncOrchestrator};
use crate::prompt::{FixedResponse, Prompt, TerminalPrompt};
use crate::report::OperationReport;
use crate::repository::Git2Provider;
use crate::ticket::{JiraTicketService, OfflineTicketService, TicketService};

/// One library operation with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Add { source_dir: PathBuf },
    Checkout { ticket: TicketId },
    Checkin { ticket: TicketId },
    /// An empty `include` runs every agent kind.
    Merge { include: Vec<AgentKind> },
}

/// How ticket summaries are obtained when no terminal interaction is wanted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SummarySource {
    /// Ask on the terminal.
    #[default]
    Interactive,
    /// Use this text as the answer to every summary prompt.
    Fixed(String),
    /// Accept whatever default is offered.
    AcceptDefault,
}

/// Run `operation` for `product` with the production adapters.
pub fn run(
    settings: &Settings,
    layout: &Layout,
    product: &ProductCode,
    operation: Operation,
    summary: SummarySource,
) -> OperationReport {
    let fs = LocalFs;
    let repos = Git2Provider::new(settings.main_branch.clone());
    let tickets = ticket_service(settings);
    let prompt = prompt_for(summary);
    let orchestrator = SyncOrchestrator::new(
        settings,
        layout,
        Ports {
            fs: &fs,
            repos: &repos,
            tickets: tickets.as_ref(),
            prompt: prompt.as_ref(),
        },
    );

    match operation {
        Operation::Add { source_dir } => orchestrator.add(product, &source_dir),
        Operation::Checkout { ticket } => orchestrator.checkout(product, &ticket),
        Operation::Checkin { ticket } => orchestrator.checkin(product, &ticket),
        Operation::Merge { include } => orchestrator.merge(product, &include),
    }
}

fn ticket_service(settings: &Settings) -> Box<dyn TicketService> {
    if settings.allow_remote_requests {
        Box::new(JiraTicketService::new(
            settings.jira_site.clone(),
            Duration::from_secs(settings.request_timeout_secs),
        ))
    } else {
        Box::new(OfflineTicketService)
    }
}

fn prompt_for(summary: SummarySource) -> Box<dyn Prompt> {
    match summary {
        SummarySource::Interactive => Box::new(TerminalPrompt),
        SummarySource::Fixed(text) => Box::new(FixedResponse::new(text)),
        SummarySource::AcceptDefault => Box::new(FixedResponse::accept_default()),
    }
}
