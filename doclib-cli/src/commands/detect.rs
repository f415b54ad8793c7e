//! `dli detect` — report duplicated text in a product workspace.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context as _, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use doclib_core::types::ProductCode;
use doclib_detector::{Context, Detection, Target};

use super::Session;

/// Arguments for `dli detect`.
#[derive(Args, Debug)]
pub struct DetectArgs {
    #[arg(long)]
    pub project_code: String,

    /// What to look for.
    #[arg(long, default_value = "duplicate")]
    pub target: Target,

    /// Compare sentences or whole paragraphs.
    #[arg(long, default_value = "sentence")]
    pub context: Context,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct FindingRow {
    #[tabled(rename = "text")]
    preview: String,
    #[tabled(rename = "count")]
    occurrences: usize,
    #[tabled(rename = "files")]
    files: String,
}

impl DetectArgs {
    pub fn run(self, session: &Session) -> Result<ExitCode> {
        let product = ProductCode::from(self.project_code);
        let detection = doclib_detector::detect(
            &session.layout,
            &session.settings,
            &product,
            self.target,
            self.context,
        )
        .with_context(|| format!("detect failed for '{product}'"))?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&detection)?);
        } else {
            let root = session
                .layout
                .doc_root(&session.layout.product_workspace(&product));
            print_table(session, &product, &root, &detection);
        }
        Ok(ExitCode::SUCCESS)
    }
}

fn print_table(session: &Session, product: &ProductCode, root: &Path, detection: &Detection) {
    let line = session.horizontal_line();
    println!("{line}");
    println!(
        "{} {product} ({} {}s, {} documents)",
        "detect".bold(),
        detection.target,
        detection.context,
        detection.documents
    );
    if detection.findings.is_empty() {
        println!("{} no duplicates", "✓".green().bold());
        return;
    }

    let rows: Vec<FindingRow> = detection
        .findings
        .iter()
        .map(|f| FindingRow {
            preview: f.preview.clone(),
            occurrences: f.occurrences,
            files: f
                .files
                .iter()
                .map(|p| p.strip_prefix(root).unwrap_or(p).display().to_string())
                .collect::<Vec<_>>()
                .join("\n"),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    println!("{line}");
    println!(
        "{} {} duplicated {}s",
        "!".yellow().bold(),
        detection.findings.len(),
        detection.context
    );
}
