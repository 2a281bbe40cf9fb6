//! Group Membership Resolver.
//!
//! Derives target group names from an identity's group descriptors and makes
//! sure each of those groups exists remotely with the right teacher-access
//! attribute. Derivation is pure; only [`ensure_groups`] talks to the remote
//! directory.

use serde::Serialize;

use roster_core::{
    settings::SiteRules, ArchivedGroup, CoreError, GroupDescriptor, IdentityRecord, Location,
    LocationId, RemoteId, TeacherAccess,
};
use roster_remote::{DirectoryClient, GroupPayload, GroupUpdate};

use crate::archive::Archive;
use crate::location::{remote_location_id, LocationResolver};

pub struct MembershipResolver<'a> {
    sites: &'a SiteRules,
    locations: LocationResolver<'a>,
}

impl<'a> MembershipResolver<'a> {
    pub fn new(sites: &'a SiteRules, locations: LocationResolver<'a>) -> Self {
        Self { sites, locations }
    }

    /// Memberships of a student at `location`, in a stable order.
    pub fn student_memberships(&self, record: &IdentityRecord, location: &Location) -> Vec<String> {
        let school = location.name.as_str();
        let mut names = vec![format!("{school} Elever")];

        if school == self.sites.adult_education_name {
            match adult_education_grade(record) {
                Some(grade) => names.push(grade_group(grade, school)),
                None => tracing::info!(
                    external_id = %record.external_id,
                    "no grade found for adult-education student; no grade group",
                ),
            }
            return names;
        }

        if self.is_excluded_site(school) {
            return names;
        }

        if let Some(trinn) = first_of_type(&record.descriptors, "trinn") {
            match trinn.primary_grep_code().and_then(grade_from_prefix) {
                Some(grade) => names.push(grade_group(grade, school)),
                None => tracing::debug!(
                    external_id = %record.external_id,
                    group = %trinn.name,
                    "trinn group has no usable grep code",
                ),
            }
        }

        if let Some(basis) = first_of_type(&record.descriptors, "basisgruppe") {
            let name = basis.name.trim();
            if name == self.sites.bad_basisgruppe {
                tracing::info!(
                    external_id = %record.external_id,
                    group = name,
                    "skipping known-bad basisgruppe",
                );
            } else if !name.is_empty() {
                names.push(format!("{name} - {school}"));
            }
        }

        names
    }

    fn is_excluded_site(&self, school: &str) -> bool {
        self.sites
            .excluded_site_marker
            .as_deref()
            .is_some_and(|marker| !marker.is_empty() && school.contains(marker))
    }

    /// Ids of already-archived class and subject groups a teacher instructs.
    ///
    /// Only ids greater than 1 are kept.
    pub fn teacher_group_ids(
        &self,
        record: &IdentityRecord,
        archive: &dyn Archive,
    ) -> Result<Vec<RemoteId>, CoreError> {
        let mut ids = Vec::new();
        for descriptor in record.descriptors.iter().filter(|d| is_taught_group(d)) {
            let Some(owner) = self.locations.find_by_unique_id(&descriptor.owner_id)? else {
                tracing::debug!(
                    external_id = %record.external_id,
                    group = %descriptor.name,
                    owner = %descriptor.owner_id,
                    "owning location not found; group left out of teacher list",
                );
                continue;
            };
            let scope = remote_location_id(&owner);
            if !scope.is_resolved() {
                continue;
            }
            let name = format!("{} - {}", descriptor.name, owner.name);
            if let Some(group) = archive.get_group(&name, &[scope])? {
                if group.remote_id.0 > 1 {
                    ids.push(group.remote_id);
                }
            }
        }
        Ok(ids)
    }
}

/// The single membership of a teacher.
pub fn teacher_memberships(primary: &Location) -> Vec<String> {
    vec![format!("{} Lærere", primary.name)]
}

fn grade_group(grade: u32, school: &str) -> String {
    format!("{grade}.Trinn - {school}")
}

fn first_of_type<'d>(descriptors: &'d [GroupDescriptor], kind: &str) -> Option<&'d GroupDescriptor> {
    descriptors.iter().find(|d| d.type_contains(kind))
}

fn first_adult_education<'d>(
    descriptors: &'d [GroupDescriptor],
    kind: &str,
) -> Option<&'d GroupDescriptor> {
    descriptors
        .iter()
        .find(|d| d.type_contains(kind) && d.owner_contains("vo"))
}

/// Grade of an adult-education student, by descriptor priority.
fn adult_education_grade(record: &IdentityRecord) -> Option<u32> {
    let descriptors = &record.descriptors;
    first_adult_education(descriptors, "klassegruppe")
        .and_then(|d| parse_number(&d.name))
        .or_else(|| {
            first_adult_education(descriptors, "trinn")
                .and_then(|d| d.name.split_whitespace().nth(1))
                .and_then(parse_number)
        })
        .or_else(|| {
            first_adult_education(descriptors, "subject_group")
                .and_then(|d| grade_from_prefix(&d.name))
        })
        .or_else(|| record.grade_level.as_deref().and_then(parse_number))
}

/// Leading two characters as a number, falling back to the first one.
fn grade_from_prefix(text: &str) -> Option<u32> {
    let two: String = text.chars().take(2).collect();
    parse_number(&two).or_else(|| {
        let one: String = text.chars().take(1).collect();
        parse_number(&one)
    })
}

fn parse_number(text: &str) -> Option<u32> {
    text.trim().parse().ok()
}

fn is_taught_group(d: &GroupDescriptor) -> bool {
    d.group_type == "basisgruppe"
        || (d.group_type == "subject_group"
            && d.role_type == "Instructor"
            && d.owner_id.contains("VO"))
}

// ---------------------------------------------------------------------------
// Remote groups
// ---------------------------------------------------------------------------

/// Group calls made while ensuring memberships.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GroupTally {
    pub created: usize,
    pub refreshed: usize,
    pub failed: usize,
}

impl GroupTally {
    pub fn merge(&mut self, other: GroupTally) {
        self.created += other.created;
        self.refreshed += other.refreshed;
        self.failed += other.failed;
    }
}

/// Resolve-or-create every group in `names`.
///
/// Archived groups are looked up within `scope`; an existing group only has
/// its access attribute refreshed. New groups are created under `home`.
/// Failures are logged and counted; they never block the identity itself.
pub fn ensure_groups(
    names: &[String],
    home: LocationId,
    scope: &[LocationId],
    access: TeacherAccess,
    archive: &mut dyn Archive,
    client: &dyn DirectoryClient,
) -> GroupTally {
    let mut tally = GroupTally::default();
    for name in names.iter().filter(|n| !n.trim().is_empty()) {
        let existing = match archive.get_group(name, scope) {
            Ok(existing) => existing,
            Err(err) => {
                tracing::error!(group = %name, error = %err, "archive lookup failed");
                tally.failed += 1;
                continue;
            }
        };

        if let Some(group) = existing {
            match client.update_group(group.remote_id, &GroupUpdate::access(access)) {
                Ok(()) => tally.refreshed += 1,
                Err(err) => {
                    tracing::warn!(group = %name, remote_id = %group.remote_id, error = %err, "could not refresh group access");
                    tally.failed += 1;
                }
            }
            continue;
        }

        let created = client
            .create_group(&GroupPayload::new(name.clone(), home, access))
            .map(|response| response.remote_id());
        match created {
            Ok(Some(remote_id)) => {
                let group = ArchivedGroup {
                    remote_id,
                    location_id: home,
                    name: name.clone(),
                    description: None,
                    user_count: 0,
                };
                match archive.upsert_group(group) {
                    Ok(()) => {
                        tracing::info!(group = %name, %remote_id, location_id = %home, "created group");
                        tally.created += 1;
                    }
                    Err(err) => {
                        tracing::error!(group = %name, %remote_id, error = %err, "group created remotely but not archived");
                        tally.failed += 1;
                    }
                }
            }
            Ok(None) => {
                tracing::error!(group = %name, location_id = %home, "group create returned no id; not archived");
                tally.failed += 1;
            }
            Err(err) => {
                tracing::warn!(group = %name, error = %err, "could not create group");
                tally.failed += 1;
            }
        }
    }
    tally
}
