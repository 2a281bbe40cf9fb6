//! Shared run-mode entrypoint used by the CLI and the daemon.

use std::fmt;

use roster_core::{ExternalId, IdentityKind, Settings};
use roster_remote::DirectoryClient;
use roster_source::SourceRecordProvider;

use crate::archive::Archive;
use crate::engine::Engine;
use crate::error::SyncError;
use crate::groups::maintain_groups;
use crate::report::BatchReport;

/// Which identities a pass covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    /// Group maintenance, then every student, then every teacher.
    All,
    Students,
    Teachers,
    /// Students at the adult-education site.
    Subset,
    /// One identity, looked up in the student store first.
    Single(ExternalId),
    /// Group maintenance only.
    Groups,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::All => write!(f, "all"),
            RunMode::Students => write!(f, "students"),
            RunMode::Teachers => write!(f, "teachers"),
            RunMode::Subset => write!(f, "subset"),
            RunMode::Single(id) => write!(f, "single {id}"),
            RunMode::Groups => write!(f, "groups"),
        }
    }
}

/// Everything a pass needs.
pub struct SyncContext<'a> {
    pub settings: &'a Settings,
    pub provider: &'a SourceRecordProvider<'a>,
    pub client: &'a dyn DirectoryClient,
}

/// Run one pass in `mode`.
pub fn run(
    ctx: &SyncContext<'_>,
    archive: &mut dyn Archive,
    mode: &RunMode,
) -> Result<BatchReport, SyncError> {
    tracing::info!(mode = %mode, "starting reconciliation pass");
    let report = match mode {
        RunMode::All => {
            let mut report = BatchReport::default();
            match maintain_groups(ctx.client, archive) {
                Ok(maintenance) => report.maintenance = Some(maintenance),
                Err(err) => tracing::warn!(error = %err, "group maintenance failed; continuing with identities"),
            }
            report.merge(reconcile_kind(ctx, archive, IdentityKind::Student, None)?);
            report.merge(reconcile_kind(ctx, archive, IdentityKind::Teacher, None)?);
            report
        }
        RunMode::Students => reconcile_kind(ctx, archive, IdentityKind::Student, None)?,
        RunMode::Teachers => reconcile_kind(ctx, archive, IdentityKind::Teacher, None)?,
        RunMode::Subset => {
            let code = ctx.settings.sites.adult_education_code.as_str();
            let at_site = |r: &roster_core::IdentityRecord| r.home_location_code == code;
            reconcile_kind(ctx, archive, IdentityKind::Student, Some(&at_site))?
        }
        RunMode::Single(id) => reconcile_single(ctx, archive, None, id)?,
        RunMode::Groups => BatchReport {
            maintenance: Some(maintain_groups(ctx.client, archive)?),
            ..Default::default()
        },
    };
    tracing::info!(
        mode = %mode,
        processed = report.processed,
        created = report.created,
        updated = report.updated,
        recreated = report.recreated,
        deleted = report.deleted,
        failed = report.failures.total(),
        "reconciliation pass finished",
    );
    Ok(report)
}

/// Reconcile every eligible record of `kind`.
pub fn reconcile_kind(
    ctx: &SyncContext<'_>,
    archive: &mut dyn Archive,
    kind: IdentityKind,
    extra_filter: Option<roster_source::provider::ExtraFilter<'_>>,
) -> Result<BatchReport, SyncError> {
    let records = ctx
        .provider
        .list_active(kind, &ctx.settings.exclude_locations, extra_filter)?;
    tracing::info!(kind = %kind, count = records.len(), "reconciling identities");
    let locations = ctx.provider.view(kind).locations;
    let mut engine = Engine::new(ctx.settings, ctx.client, archive);
    Ok(engine.reconcile_batch(&records, locations))
}

/// Reconcile one identity. With no `kind`, the student store is searched
/// before the staff store. An unknown or ineligible id counts as skipped.
pub fn reconcile_single(
    ctx: &SyncContext<'_>,
    archive: &mut dyn Archive,
    kind: Option<IdentityKind>,
    id: &ExternalId,
) -> Result<BatchReport, SyncError> {
    let kinds: &[IdentityKind] = match kind {
        Some(IdentityKind::Student) => &[IdentityKind::Student],
        Some(IdentityKind::Teacher) => &[IdentityKind::Teacher],
        None => &[IdentityKind::Student, IdentityKind::Teacher],
    };
    for &kind in kinds {
        if let Some(record) = ctx.provider.get_by_external_id(kind, id)? {
            tracing::info!(external_id = %id, kind = %kind, "found identity in master store");
            let locations = ctx.provider.view(kind).locations;
            let mut engine = Engine::new(ctx.settings, ctx.client, archive);
            return Ok(engine.reconcile_batch(std::slice::from_ref(&record), locations));
        }
    }
    tracing::info!(external_id = %id, "identity not found or not eligible in any master store");
    Ok(BatchReport {
        skipped: 1,
        ..Default::default()
    })
}
