//! Reconciliation Engine.
//!
//! Each identity is evaluated from scratch on every pass:
//!
//! ```text
//! inactive, not archived   -> no-op
//! inactive, archived       -> delete remote, then drop archive entry
//! active, not eligible     -> rejected (missing field / unresolved location)
//! active, not archived     -> create, then archive
//! active, archived         -> diff -> unchanged | partial update | recreate
//! ```
//!
//! The archive is only written after the remote directory has confirmed a
//! mutation, so a failed call always leaves it untouched.

use chrono::Utc;

use roster_core::{
    ArchiveEntry, ExternalId, IdentityKind, IdentityRecord, Location, LocationId, Projection,
    Reader, RemoteId, Settings, TeacherAccess,
};
use roster_remote::{CreateIdentityPayload, DirectoryClient, Field, RemoteError, SparseUpdate};

use crate::archive::Archive;
use crate::diff::{diff, Diff};
use crate::error::{ErrorCategory, ReconcileError};
use crate::location::LocationResolver;
use crate::membership::{ensure_groups, teacher_memberships, GroupTally, MembershipResolver};
use crate::report::BatchReport;

/// What happened to one identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Created(RemoteId),
    Updated { remote_id: RemoteId, fields: Vec<Field> },
    Recreated { from: RemoteId, to: RemoteId },
    Deleted(RemoteId),
    Unchanged,
    /// Inactive and never synced.
    NoOp,
}

pub struct Engine<'a> {
    settings: &'a Settings,
    client: &'a dyn DirectoryClient,
    archive: &'a mut dyn Archive,
    groups: GroupTally,
}

impl<'a> Engine<'a> {
    pub fn new(
        settings: &'a Settings,
        client: &'a dyn DirectoryClient,
        archive: &'a mut dyn Archive,
    ) -> Self {
        Self {
            settings,
            client,
            archive,
            groups: GroupTally::default(),
        }
    }

    /// Reconcile every record in order; one failure never stops the rest.
    pub fn reconcile_batch(
        &mut self,
        records: &[IdentityRecord],
        locations: &dyn Reader<Location>,
    ) -> BatchReport {
        let before = self.groups;
        let mut report = BatchReport::default();
        for record in records {
            let result = self.reconcile(record, locations);
            if let Err(err) = &result {
                log_failure(record, err);
            }
            report.record(&result);
        }
        report.groups = GroupTally {
            created: self.groups.created - before.created,
            refreshed: self.groups.refreshed - before.refreshed,
            failed: self.groups.failed - before.failed,
        };
        report
    }

    /// Reconcile one identity to completion.
    pub fn reconcile(
        &mut self,
        record: &IdentityRecord,
        locations: &dyn Reader<Location>,
    ) -> Result<Outcome, ReconcileError> {
        let archived = self
            .archive
            .entry(&record.external_id)
            .map_err(store_err(&record.external_id))?;

        if !record.active {
            return match archived {
                None => Ok(Outcome::NoOp),
                Some(entry) => self.retire(record, entry),
            };
        }

        let projection = self.project(record, locations)?;
        match archived {
            None => self.create(record, projection),
            Some(entry) => {
                let remote_id = valid_remote_id(&entry)?;
                match diff(&entry.snapshot, &projection) {
                    Diff::Unchanged => {
                        tracing::debug!(external_id = %record.external_id, "no changes");
                        Ok(Outcome::Unchanged)
                    }
                    Diff::Update(update) => self.update(record, entry, remote_id, update),
                    Diff::Relocate { from, to } => {
                        tracing::info!(
                            external_id = %record.external_id,
                            %remote_id,
                            from = %from,
                            to = %to,
                            "location changed; recreating",
                        );
                        self.recreate(record, remote_id, projection)
                    }
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Projection
    // -----------------------------------------------------------------------

    /// Gate the record and build its canonical projection, ensuring every
    /// derived group exists remotely.
    fn project(
        &mut self,
        record: &IdentityRecord,
        locations: &dyn Reader<Location>,
    ) -> Result<Projection, ReconcileError> {
        let id = &record.external_id;
        for (field, value) in [
            ("external_id", record.external_id.as_str()),
            ("username", record.username.as_str()),
            ("email", record.email.as_str()),
            ("first_name", record.first_name.as_str()),
            ("last_name", record.last_name.as_str()),
        ] {
            if value.trim().is_empty() {
                return Err(ReconcileError::MissingField {
                    external_id: id.clone(),
                    field,
                });
            }
        }

        let resolver = LocationResolver::new(locations);
        let location_id = resolver
            .resolve(&record.home_location_code)
            .map_err(store_err(id))?;
        let location = resolver
            .find(&record.home_location_code)
            .map_err(store_err(id))?;
        let Some(location) = location.filter(|_| location_id.is_resolved()) else {
            return Err(ReconcileError::UnresolvedLocation {
                external_id: id.clone(),
                code: record.home_location_code.clone(),
            });
        };

        let settings = self.settings;
        let memberships = MembershipResolver::new(&settings.sites, resolver);
        let (member_of, teacher_groups) = match record.kind {
            IdentityKind::Student => {
                let names = memberships.student_memberships(record, &location);
                self.ensure(&names, location_id, &[location_id], TeacherAccess::Deny);
                (names, Vec::new())
            }
            IdentityKind::Teacher => {
                let names = teacher_memberships(&location);
                let scope = teacher_scope(&resolver, record, location_id).map_err(store_err(id))?;
                self.ensure(&names, location_id, &scope, TeacherAccess::Allow);
                let ids = memberships
                    .teacher_group_ids(record, &*self.archive)
                    .map_err(store_err(id))?;
                (names, ids)
            }
        };

        Ok(Projection {
            username: record.username.trim().to_string(),
            email: record.email.trim().to_string(),
            first_name: record.first_name.trim().to_string(),
            last_name: record.last_name.trim().to_string(),
            location_id,
            domain: String::new(),
            member_of,
            teacher_groups,
            children: Vec::new(),
        })
    }

    fn ensure(
        &mut self,
        names: &[String],
        home: LocationId,
        scope: &[LocationId],
        access: TeacherAccess,
    ) {
        let tally = ensure_groups(names, home, scope, access, &mut *self.archive, self.client);
        self.groups.merge(tally);
    }

    // -----------------------------------------------------------------------
    // Remote mutations
    // -----------------------------------------------------------------------

    fn create(
        &mut self,
        record: &IdentityRecord,
        projection: Projection,
    ) -> Result<Outcome, ReconcileError> {
        let id = &record.external_id;
        let response = self
            .client
            .create_identity(&CreateIdentityPayload::from(&projection))
            .map_err(remote_err(id, "create"))?;
        let Some(remote_id) = response.remote_id() else {
            return Err(ReconcileError::MissingRemoteId {
                external_id: id.clone(),
                username: projection.username,
                operation: "create",
            });
        };

        self.archive
            .upsert_entry(new_entry(id, remote_id, projection))
            .map_err(unrecorded_err(id, remote_id, "create"))?;
        tracing::info!(external_id = %id, %remote_id, operation = "create", "created identity");
        Ok(Outcome::Created(remote_id))
    }

    fn update(
        &mut self,
        record: &IdentityRecord,
        mut entry: ArchiveEntry,
        remote_id: RemoteId,
        update: SparseUpdate,
    ) -> Result<Outcome, ReconcileError> {
        let id = &record.external_id;
        self.client
            .update_identity(remote_id, &update)
            .map_err(remote_err(id, "update"))?;

        update.apply_to(&mut entry.snapshot);
        entry.synced_at = Utc::now();
        self.archive.upsert_entry(entry).map_err(store_err(id))?;

        let fields: Vec<Field> = update.fields().collect();
        tracing::info!(
            external_id = %id,
            %remote_id,
            operation = "update",
            fields = ?fields,
            "updated identity",
        );
        Ok(Outcome::Updated { remote_id, fields })
    }

    /// Delete the old remote identity and create a fresh one.
    fn recreate(
        &mut self,
        record: &IdentityRecord,
        old: RemoteId,
        projection: Projection,
    ) -> Result<Outcome, ReconcileError> {
        let id = &record.external_id;
        match self.client.get_identity(old) {
            Ok(_) => match self.client.delete_identity(old) {
                Ok(()) | Err(RemoteError::NotFound { .. }) => {}
                Err(err) => return Err(remote_err(id, "recreate")(err)),
            },
            Err(RemoteError::NotFound { .. }) => {
                tracing::info!(external_id = %id, remote_id = %old, "old identity already gone; skipping delete");
            }
            Err(err) => return Err(remote_err(id, "recreate")(err)),
        }

        // The old entity is gone from here on: any failure drops the entry.
        let created = self.client.create_identity(&CreateIdentityPayload::from(&projection));
        let failure = match created {
            Ok(response) => match response.remote_id() {
                Some(new) => {
                    self.archive
                        .upsert_entry(new_entry(id, new, projection))
                        .map_err(unrecorded_err(id, new, "recreate"))?;
                    tracing::info!(
                        external_id = %id,
                        from = %old,
                        to = %new,
                        operation = "recreate",
                        "recreated identity",
                    );
                    return Ok(Outcome::Recreated { from: old, to: new });
                }
                None => ReconcileError::MissingRemoteId {
                    external_id: id.clone(),
                    username: projection.username,
                    operation: "recreate",
                },
            },
            Err(err) => remote_err(id, "recreate")(err),
        };
        self.archive.remove_entry(id).map_err(store_err(id))?;
        Err(failure)
    }

    fn retire(
        &mut self,
        record: &IdentityRecord,
        entry: ArchiveEntry,
    ) -> Result<Outcome, ReconcileError> {
        let id = &record.external_id;
        let remote_id = valid_remote_id(&entry)?;
        match self.client.delete_identity(remote_id) {
            Ok(()) => {}
            Err(RemoteError::NotFound { .. }) => {
                tracing::info!(external_id = %id, %remote_id, "identity already absent remotely");
            }
            Err(err) => return Err(remote_err(id, "delete")(err)),
        }
        self.archive.remove_entry(id).map_err(store_err(id))?;
        tracing::info!(external_id = %id, %remote_id, operation = "delete", "deleted identity");
        Ok(Outcome::Deleted(remote_id))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Primary location plus every resolvable secondary location.
fn teacher_scope(
    resolver: &LocationResolver<'_>,
    record: &IdentityRecord,
    primary: LocationId,
) -> Result<Vec<LocationId>, roster_core::CoreError> {
    let mut scope = vec![primary];
    for code in &record.secondary_location_codes {
        let id = resolver.resolve(code)?;
        if id.is_resolved() && !scope.contains(&id) {
            scope.push(id);
        }
    }
    Ok(scope)
}

fn new_entry(id: &ExternalId, remote_id: RemoteId, snapshot: Projection) -> ArchiveEntry {
    ArchiveEntry {
        external_id: id.clone(),
        remote_id,
        snapshot,
        synced_at: Utc::now(),
    }
}

fn valid_remote_id(entry: &ArchiveEntry) -> Result<RemoteId, ReconcileError> {
    if entry.remote_id.is_valid() {
        Ok(entry.remote_id)
    } else {
        Err(ReconcileError::InvalidRemoteId {
            external_id: entry.external_id.clone(),
            remote_id: entry.remote_id,
        })
    }
}

fn remote_err<'a>(
    id: &'a ExternalId,
    operation: &'static str,
) -> impl FnOnce(RemoteError) -> ReconcileError + 'a {
    move |source| ReconcileError::Remote {
        external_id: id.clone(),
        operation,
        source,
    }
}

fn store_err(id: &ExternalId) -> impl FnOnce(roster_core::CoreError) -> ReconcileError + '_ {
    move |source| ReconcileError::Store {
        external_id: id.clone(),
        source,
    }
}

/// The remote directory holds `remote_id` but the archive could not record it.
fn unrecorded_err<'a>(
    id: &'a ExternalId,
    remote_id: RemoteId,
    operation: &'static str,
) -> impl FnOnce(roster_core::CoreError) -> ReconcileError + 'a {
    move |source| ReconcileError::Unrecorded {
        external_id: id.clone(),
        remote_id,
        operation,
        source,
    }
}

fn log_failure(record: &IdentityRecord, err: &ReconcileError) {
    let category = err.category();
    match category {
        ErrorCategory::InconsistentState => tracing::error!(
            external_id = %record.external_id,
            username = %record.username,
            remote_id = ?err.remote_id(),
            %category,
            error = %err,
            "remote identity may exist without an archive entry; clean up manually",
        ),
        ErrorCategory::Transient => tracing::warn!(
            external_id = %record.external_id,
            %category,
            error = %err,
            "reconcile failed; will retry next pass",
        ),
        ErrorCategory::DataIntegrity | ErrorCategory::Configuration => tracing::info!(
            external_id = %record.external_id,
            %category,
            error = %err,
            "record skipped",
        ),
    }
}
