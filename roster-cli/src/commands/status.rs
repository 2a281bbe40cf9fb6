//! `roster status` — what the archive says has been pushed.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use roster_core::LocationId;
use roster_sync::{Archive, JsonArchive};

use super::load_settings;

/// Arguments for `roster status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self, config: Option<&Path>) -> Result<()> {
        let settings = load_settings(config)?;
        let archive = JsonArchive::open(&settings.archive)
            .with_context(|| format!("failed to open archive {}", settings.archive.display()))?;
        let report = build_report(&archive)?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report)
                    .context("failed to serialize status JSON")?
            );
            return Ok(());
        }
        print_table(&archive, report);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct StatusReport {
    identities: usize,
    groups: usize,
    updated_at: Option<DateTime<Utc>>,
    last_synced_at: Option<DateTime<Utc>>,
    locations: Vec<LocationStatus>,
}

#[derive(Debug, Serialize, Tabled)]
struct LocationStatus {
    #[tabled(rename = "location")]
    location_id: LocationId,
    #[tabled(rename = "identities")]
    identities: usize,
    #[tabled(rename = "groups")]
    groups: usize,
}

fn build_report(archive: &JsonArchive) -> Result<StatusReport> {
    let entries = archive.entries().context("failed to read archived identities")?;
    let groups = archive.groups().context("failed to read archived groups")?;

    let mut by_location = BTreeMap::<LocationId, (usize, usize)>::new();
    for entry in &entries {
        by_location.entry(entry.snapshot.location_id).or_default().0 += 1;
    }
    for group in &groups {
        by_location.entry(group.location_id).or_default().1 += 1;
    }

    Ok(StatusReport {
        identities: entries.len(),
        groups: groups.len(),
        updated_at: archive.updated_at(),
        last_synced_at: entries.iter().map(|e| e.synced_at).max(),
        locations: by_location
            .into_iter()
            .map(|(location_id, (identities, groups))| LocationStatus {
                location_id,
                identities,
                groups,
            })
            .collect(),
    })
}

fn print_table(archive: &JsonArchive, report: StatusReport) {
    println!(
        "Roster v{} | {} identities | {} groups",
        env!("CARGO_PKG_VERSION"),
        report.identities,
        report.groups,
    );
    println!("archive: {}", archive.path().display());
    match report.last_synced_at {
        Some(at) => println!("last sync: {}", format_age(at, Utc::now())),
        None => println!("last sync: {}", "never".bright_black()),
    }

    if report.locations.is_empty() {
        println!("Archive is empty. Run `roster all` to populate it.");
        return;
    }
    let mut table = Table::new(report.locations);
    table.with(Style::rounded());
    println!("{table}");
}

fn format_age(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - at).num_seconds().max(0);
    let age = match secs {
        0..=59 => format!("{secs}s ago"),
        60..=3599 => format!("{}m ago", secs / 60),
        3600..=86_399 => format!("{}h ago", secs / 3600),
        _ => format!("{}d ago", secs / 86_400),
    };
    format!("{} ({age})", at.format("%Y-%m-%d %H:%M:%S UTC"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn age_uses_the_largest_whole_unit() {
        let now = Utc::now();
        assert!(format_age(now - Duration::seconds(5), now).ends_with("(5s ago)"));
        assert!(format_age(now - Duration::minutes(7), now).ends_with("(7m ago)"));
        assert!(format_age(now - Duration::hours(3), now).ends_with("(3h ago)"));
        assert!(format_age(now - Duration::days(2), now).ends_with("(2d ago)"));
    }
}
