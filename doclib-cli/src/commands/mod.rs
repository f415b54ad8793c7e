//! Subcommands and the pieces they share.

pub mod add;
pub mod checkin;
pub mod checkout;
pub mod detect;
pub mod merge;

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use colored::Colorize;

use doclib_core::layout::Layout;
use doclib_core::Settings;
use doclib_sync::{OperationReport, Signal, SummarySource};

/// Settings and layout resolved once per invocation.
#[derive(Debug)]
pub struct Session {
    pub settings: Settings,
    pub layout: Layout,
}

impl Session {
    pub fn load(config: Option<&Path>) -> Result<Self> {
        let settings = Settings::resolve(config).context("failed to load settings")?;
        let layout = Layout::from_settings(&settings).context("failed to resolve directories")?;
        tracing::debug!(
            "data dir {}, workspace {}",
            layout.data_dir().display(),
            layout.workspace_dir().display()
        );
        Ok(Self { settings, layout })
    }

    pub fn horizontal_line(&self) -> String {
        self.settings
            .message
            .horizontal_line
            .repeat(self.settings.message.screen_width)
    }
}

/// `--summary` given: answer every prompt with it; otherwise ask.
pub fn summary_source(summary: Option<String>) -> SummarySource {
    match summary {
        Some(text) => SummarySource::Fixed(text),
        None => SummarySource::Interactive,
    }
}

/// Print every signal, then the outcome. Failed reports exit with 1.
pub fn print_report(session: &Session, subject: &str, report: &OperationReport) -> ExitCode {
    let line = session.horizontal_line();
    println!("{line}");
    println!("{} {}", report.operation.to_string().bold(), subject);
    for signal in &report.signals {
        println!("  {} {signal}", indicator(signal));
    }
    println!("{line}");

    let failures = report.failures().count();
    if failures == 0 {
        println!("{} {} finished", "✓".green().bold(), report.operation);
        ExitCode::SUCCESS
    } else {
        println!(
            "{} {} failed ({failures} problem{})",
            "✗".red().bold(),
            report.operation,
            if failures == 1 { "" } else { "s" }
        );
        ExitCode::FAILURE
    }
}

fn indicator(signal: &Signal) -> String {
    if signal.is_failure() {
        "✗".red().bold().to_string()
    } else if signal.is_warning() {
        "!".yellow().bold().to_string()
    } else {
        "·".bright_black().to_string()
    }
}
