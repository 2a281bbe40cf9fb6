//! Run-mode commands: `all`, `students`, `teachers`, `subset`, `single`, `groups`.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use roster_core::{IdentityKind, Settings};
use roster_remote::HttpDirectoryClient;
use roster_source::{SnapshotStore, SourceRecordProvider};
use roster_sync::{pipeline, BatchReport, JsonArchive, RunMode, SyncContext};

use super::load_settings;

/// Arguments shared by every run mode.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Emit the pass report as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for `roster single`.
#[derive(Args, Debug)]
pub struct SingleArgs {
    /// External id of the person (student store searched first).
    pub external_id: String,

    /// Emit the pass report as JSON.
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    pub fn run(self, config: Option<&Path>, mode: RunMode) -> Result<()> {
        let settings = load_settings(config)?;
        let students = load_store(&settings, &mode, IdentityKind::Student)?;
        let staff = load_store(&settings, &mode, IdentityKind::Teacher)?;
        let provider = SourceRecordProvider::new(&settings, (&students).into(), (&staff).into());
        let client = HttpDirectoryClient::new(&settings.remote);
        let mut archive = JsonArchive::open(&settings.archive)
            .with_context(|| format!("failed to open archive {}", settings.archive.display()))?;

        let ctx = SyncContext {
            settings: &settings,
            provider: &provider,
            client: &client,
        };
        let report = pipeline::run(&ctx, &mut archive, &mode)
            .with_context(|| format!("`{mode}` run failed"))?;

        if self.json {
            print_json(&mode, &report)
        } else {
            print_table(&mode, &report);
            Ok(())
        }
    }
}

/// The snapshot a mode needs for `kind`; an empty store otherwise.
fn load_store(settings: &Settings, mode: &RunMode, kind: IdentityKind) -> Result<SnapshotStore> {
    let needed = match mode {
        RunMode::All | RunMode::Single(_) => true,
        RunMode::Students | RunMode::Subset => kind == IdentityKind::Student,
        RunMode::Teachers => kind == IdentityKind::Teacher,
        RunMode::Groups => false,
    };
    if !needed {
        return Ok(SnapshotStore::from_parts(kind, Vec::new(), Vec::new()));
    }
    SnapshotStore::load_configured(kind, settings)
        .with_context(|| format!("failed to load {kind} master store"))
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct RunReportJson<'a> {
    mode: String,
    report: &'a BatchReport,
}

#[derive(Tabled)]
struct CountRow {
    #[tabled(rename = "outcome")]
    outcome: String,
    #[tabled(rename = "count")]
    count: usize,
}

fn print_json(mode: &RunMode, report: &BatchReport) -> Result<()> {
    let payload = RunReportJson {
        mode: mode.to_string(),
        report,
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize run report JSON")?
    );
    Ok(())
}

fn print_table(mode: &RunMode, report: &BatchReport) {
    println!(
        "Roster v{} | {} | {} processed",
        env!("CARGO_PKG_VERSION"),
        mode.to_string().bold(),
        report.processed,
    );

    let failures = &report.failures;
    let mut rows = vec![
        row("created", report.created),
        row("updated", report.updated),
        row("recreated", report.recreated),
        row("deleted", report.deleted),
        row("unchanged", report.unchanged),
        row("skipped", report.skipped),
        row("failed: transient", failures.transient),
        row("failed: data integrity", failures.data_integrity),
        row("failed: inconsistent state", failures.inconsistent_state),
        row("failed: configuration", failures.configuration),
        row("groups created", report.groups.created),
        row("groups refreshed", report.groups.refreshed),
        row("groups failed", report.groups.failed),
    ];
    if let Some(maintenance) = &report.maintenance {
        rows.extend([
            row("groups listed", maintenance.listed),
            row("groups allowed", maintenance.allowed),
            row("groups denied", maintenance.denied),
            row("groups archived", maintenance.archived),
            row("group updates failed", maintenance.failed),
        ]);
    }

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    let failed = failures.total();
    if failed == 0 {
        println!("{}", "✓ no failures".green());
    } else {
        println!(
            "{}",
            format!("✗ {failed} failed; see the log for details").red().bold()
        );
    }
    if failures.inconsistent_state > 0 {
        println!(
            "{}",
            "Some remote identities may exist without an archive entry; check the error log."
                .yellow()
        );
    }
}

fn row(outcome: &str, count: usize) -> CountRow {
    CountRow {
        outcome: outcome.to_string(),
        count,
    }
}
