//! `dli add` — register a source tree's documents and copy them into the library.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use doclib_core::types::ProductCode;
use doclib_sync::pipeline::{self, Operation, SummarySource};

use super::{print_report, Session};

/// Arguments for `dli add`.
#[derive(Args, Debug)]
pub struct AddArgs {
    /// Product the documents belong to.
    #[arg(long)]
    pub project_code: String,

    /// Tree containing the document root directory.
    #[arg(long)]
    pub source_dir: PathBuf,
}

impl AddArgs {
    pub fn run(self, session: &Session) -> Result<ExitCode> {
        let source_dir = self
            .source_dir
            .canonicalize()
            .with_context(|| format!("source directory {} not found", self.source_dir.display()))?;
        let product = ProductCode::from(self.project_code);

        let report = pipeline::run(
            &session.settings,
            &session.layout,
            &product,
            Operation::Add {
                source_dir: source_dir.clone(),
            },
            SummarySource::AcceptDefault,
        );
        Ok(print_report(
            session,
            &format!("{product} from {}", source_dir.display()),
            &report,
        ))
    }
}
