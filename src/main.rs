mod classifier;
mod commands;
mod config;
mod diagnostics;
mod error;
mod marker;
mod mutator;
mod parser;
mod scanner;
mod tracker;
mod vcs;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::commands::Summary;
use crate::config::Config;
use crate::tracker::{Credentials, JiraClient};
use crate::vcs::{Committer, GitCommitter, NoCommit};

/// Exit code for errors that stop the run before any marker is processed.
const EXIT_FATAL: u8 = 2;

/// Exit code when some markers failed or were left uncommitted.
const EXIT_PARTIAL: u8 = 1;

/// Command-line arguments.
#[derive(Parser)]
#[command(name = "weasel", version, about = "Turn TODO comments into tracked issues")]
struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    command: Commands,
    /// Config file (default: `.weasel.yaml` in the root, if present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Directory to scan; git commands run here too.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,
    /// Log debug output to stderr (overridden by `RUST_LOG`).
    #[arg(long, short, global = true)]
    verbose: bool,
}

/// Subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Print every marker and whether it has been reported
    List,
    /// Remove reported markers whose issues are done
    Purge {
        /// Issue keys to remove, e.g. PROJ-42
        #[arg(required = true)]
        ids: Vec<String>,
        /// Rewrite files but do not commit them
        #[arg(long)]
        no_commit: bool,
    },
    /// Create an issue for every unreported marker and write its key back
    Report {
        /// Rewrite files but do not commit them
        #[arg(long)]
        no_commit: bool,
    },
}

/// Pick git or no-op committing.
fn committer(cli: &Cli, no_commit: bool) -> Box<dyn Committer> {
    if no_commit {
        return Box::new(NoCommit);
    }
    return Box::new(GitCommitter::new(&cli.root));
}

/// Send `tracing` output to stderr, filtered by `RUST_LOG` or `--verbose`.
fn init_tracing(verbose: bool) {
    let fallback = if verbose { "weasel=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Exit 0 on a clean run, 1 if any marker failed, 2 on a fatal error.
fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    return match run(&cli) {
        Ok(summary) => summarize(&summary),
        Err(e) => {
            diagnostics::print_error(&e);
            ExitCode::from(EXIT_FATAL)
        },
    };
}

/// Load config and dispatch. Config problems surface here, before any file is touched.
///
/// # Errors
///
/// Returns fatal errors: config, credentials, tracker setup, or walk I/O.
fn run(cli: &Cli) -> Result<Summary, error::Error> {
    let config = Config::load(&cli.root, cli.config.as_deref())?;
    commands::classifier_for(&config)?;

    match &cli.command {
        Commands::List => {
            commands::list(&cli.root, &config)?;
            return Ok(Summary::default());
        },
        Commands::Purge { ids, no_commit } => {
            return commands::purge(&cli.root, &config, ids, committer(cli, *no_commit).as_ref());
        },
        Commands::Report { no_commit } => {
            let jira = config.jira.as_ref().ok_or(error::Error::TrackerNotConfigured)?;
            let tracker = JiraClient::new(jira, Credentials::from_env()?)?;
            return commands::report(&cli.root, &config, &tracker, committer(cli, *no_commit).as_ref());
        },
    }
}

/// Print the run summary and choose the exit code.
fn summarize(summary: &Summary) -> ExitCode {
    if summary.rewritten > 0 || !summary.is_clean() {
        println!(
            "{} rewritten, {} failed, {} uncommitted",
            summary.rewritten, summary.failed, summary.commit_failures
        );
    }
    if summary.is_clean() {
        return ExitCode::SUCCESS;
    }
    return ExitCode::from(EXIT_PARTIAL);
}
