//! dli — documentation library CLI.
//!
//! # Usage
//!
//! ```text
//! dli [--config <path>] [-v...] add      --project-code <P> --source-dir <dir>
//! dli [--config <path>] [-v...] checkout --project-code <P> --ticket-id <T> [--summary <text>]
//! dli [--config <path>] [-v...] checkin  --project-code <P> --ticket-id <T> [--summary <text>]
//! dli [--config <path>] [-v...] merge    --project-code <P> [--include auto|product|version]...
//! dli [--config <path>] [-v...] detect   --project-code <P> [--target duplicate] [--context sentence|paragraph] [--json]
//! ```

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

use commands::{
    add::AddArgs, checkin::CheckinArgs, checkout::CheckoutArgs, detect::DetectArgs,
    merge::MergeArgs, Session,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "dli",
    version,
    about = "Share documentation assets between product workspaces",
    long_about = None,
)]
struct Cli {
    /// Settings file; falls back to <config_dir>/doclib/options.yaml.
    #[arg(long, global = true, env = "DLI_CONFIG")]
    config: Option<PathBuf>,

    /// Log more (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Register the documents of a source tree and copy them into the library.
    Add(AddArgs),

    /// Copy a product's library documents into its workspace and open a ticket branch.
    Checkout(CheckoutArgs),

    /// Merge the ticket's feature branch and bring workspace edits back into the library.
    Checkin(CheckinArgs),

    /// Run directive agents over the product's workspace documents.
    Merge(MergeArgs),

    /// Look for duplicated text in the product's workspace documents.
    Detect(DetectArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let session = Session::load(cli.config.as_deref())?;
    match cli.command {
        Commands::Add(args) => args.run(&session),
        Commands::Checkout(args) => args.run(&session),
        Commands::Checkin(args) => args.run(&session),
        Commands::Merge(args) => args.run(&session),
        Commands::Detect(args) => args.run(&session),
    }
}

fn init_tracing(verbose: u8) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
