//! Updraft - package installer for application auto-updates
//!
//! Command line front end over the `updraft` library: install, inspect and
//! pack update packages, and repair installs left by an interrupted update.

use clap::Parser;
use miette::Diagnostic;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod progress;

use cli::{Cli, Commands};
use updraft::InstallError;

/// Exit status for an install that may have left the application corrupt
const EXIT_UNRECOVERABLE: i32 = 2;

/// Install the stderr log subscriber
///
/// `UPDRAFT_LOG` takes a standard filter directive; without it only warnings
/// are shown, or debug output with `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "updraft=debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_env("UPDRAFT_LOG").unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn report(e: &InstallError) {
    eprintln!("Error: {e}");
    if let Some(help) = e.help() {
        eprintln!("  help: {help}");
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Install(args) => commands::install::run(cli.config.as_deref(), args),
        Commands::Inspect(args) => commands::inspect::run(args),
        Commands::Recover(args) => commands::recover::run(args),
        Commands::Pack(args) => commands::pack::run(args),
        Commands::Version => commands::version::run(),
    };

    if let Err(e) = result {
        report(&e);
        let code = if e.kind().is_fatal() {
            EXIT_UNRECOVERABLE
        } else {
            1
        };
        std::process::exit(code);
    }
}
