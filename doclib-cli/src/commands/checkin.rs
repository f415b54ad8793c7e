//! `dli checkin` — merge a ticket's work and refresh the library.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;
use doclib_core::types::{ProductCode, TicketId};
use doclib_sync::pipeline::{self, Operation};

use super::{print_report, summary_source, Session};

/// Arguments for `dli checkin`.
#[derive(Args, Debug)]
pub struct CheckinArgs {
    #[arg(long)]
    pub project_code: String,

    /// Ticket whose feature branch is merged.
    #[arg(long)]
    pub ticket_id: String,

    /// Ticket summary to use instead of asking.
    #[arg(long)]
    pub summary: Option<String>,
}

impl CheckinArgs {
    pub fn run(self, session: &Session) -> Result<ExitCode> {
        let product = ProductCode::from(self.project_code);
        let ticket = TicketId::from(self.ticket_id);
        let subject = format!("{product} for {ticket}");

        let report = pipeline::run(
            &session.settings,
            &session.layout,
            &product,
            Operation::Checkin { ticket },
            summary_source(self.summary),
        );
        Ok(print_report(session, &subject, &report))
    }
}
