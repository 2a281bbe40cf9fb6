//! Roster — school identity sync into the device-management directory.
//!
//! # Usage
//!
//! ```text
//! roster [--config PATH] all|students|teachers|subset|groups [--json]
//! roster [--config PATH] single <external-id> [--json]
//! roster [--config PATH] status [--json]
//! roster [--config PATH] daemon
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    reconcile::{RunArgs, SingleArgs},
    status::StatusArgs,
};
use roster_core::ExternalId;
use roster_sync::RunMode;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "roster",
    version,
    about = "Sync students and staff from the master stores into the device-management directory",
    long_about = None,
)]
struct Cli {
    /// Settings file (default: ~/.roster/config.yaml).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Group maintenance, then every student, then every teacher.
    All(RunArgs),

    /// Reconcile every eligible student.
    Students(RunArgs),

    /// Reconcile every eligible teacher.
    Teachers(RunArgs),

    /// Reconcile students at the adult-education site only.
    Subset(RunArgs),

    /// Reconcile one identity by external id.
    Single(SingleArgs),

    /// Normalise teacher access on remote groups and archive unknown ones.
    Groups(RunArgs),

    /// Summarise the archive.
    Status(StatusArgs),

    /// Run the change-feed daemon in the foreground.
    Daemon,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    roster_daemon::init_tracing();

    let config = cli.config.as_deref();
    match cli.command {
        Commands::All(args) => args.run(config, RunMode::All),
        Commands::Students(args) => args.run(config, RunMode::Students),
        Commands::Teachers(args) => args.run(config, RunMode::Teachers),
        Commands::Subset(args) => args.run(config, RunMode::Subset),
        Commands::Groups(args) => args.run(config, RunMode::Groups),
        Commands::Single(args) => {
            let mode = RunMode::Single(ExternalId::from(args.external_id.trim()));
            RunArgs { json: args.json }.run(config, mode)
        }
        Commands::Status(args) => args.run(config),
        Commands::Daemon => commands::daemon::run(config),
    }
}
