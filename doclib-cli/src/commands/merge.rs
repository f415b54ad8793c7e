//! `dli merge` — run directive agents over workspace documents.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;
use doclib_core::types::ProductCode;
use doclib_directive::AgentKind;
use doclib_sync::pipeline::{self, Operation, SummarySource};

use super::{print_report, Session};

/// Arguments for `dli merge`.
#[derive(Args, Debug)]
pub struct MergeArgs {
    #[arg(long)]
    pub project_code: String,

    /// Agent kinds to run (auto, product, version). Repeatable; all when omitted.
    #[arg(long)]
    pub include: Vec<AgentKind>,
}

impl MergeArgs {
    pub fn run(self, session: &Session) -> Result<ExitCode> {
        let product = ProductCode::from(self.project_code);
        let subject = if self.include.is_empty() {
            product.to_string()
        } else {
            let kinds: Vec<_> = self.include.iter().map(AgentKind::name).collect();
            format!("{product} ({})", kinds.join(", "))
        };

        let report = pipeline::run(
            &session.settings,
            &session.layout,
            &product,
            Operation::Merge {
                include: self.include,
            },
            SummarySource::AcceptDefault,
        );
        Ok(print_report(session, &subject, &report))
    }
}
