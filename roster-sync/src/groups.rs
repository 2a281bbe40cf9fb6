//! Group maintenance: normalise teacher access on every remote group and
//! archive groups the archive has not seen yet.

use serde::Serialize;

use roster_core::{ArchivedGroup, TeacherAccess};
use roster_remote::{DirectoryClient, GroupUpdate, RemoteGroup};

use crate::archive::Archive;
use crate::error::SyncError;

/// Marker in staff group names; those groups are teacher-manageable.
const STAFF_GROUP_MARKER: &str = "lærere";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MaintenanceReport {
    pub listed: usize,
    pub allowed: usize,
    pub denied: usize,
    pub failed: usize,
    pub archived: usize,
}

/// Teacher access a remote group should carry, judged by its name.
pub fn access_for(group_name: &str) -> TeacherAccess {
    if group_name.to_lowercase().contains(STAFF_GROUP_MARKER) {
        TeacherAccess::Allow
    } else {
        TeacherAccess::Deny
    }
}

/// List every remote group, refresh its access attribute and archive it if
/// unknown. Only a failed listing is an error; per-group failures are counted.
pub fn maintain_groups(
    client: &dyn DirectoryClient,
    archive: &mut dyn Archive,
) -> Result<MaintenanceReport, SyncError> {
    let groups = client.list_groups()?;
    let mut report = MaintenanceReport {
        listed: groups.len(),
        ..Default::default()
    };
    tracing::info!(count = groups.len(), "maintaining remote groups");

    for group in groups {
        let access = access_for(&group.name);
        match client.update_group(group.id, &GroupUpdate::access(access)) {
            Ok(()) => match access {
                TeacherAccess::Allow => report.allowed += 1,
                TeacherAccess::Deny => report.denied += 1,
            },
            Err(err) => {
                tracing::warn!(group = %group.name, remote_id = %group.id, error = %err, "could not set group access");
                report.failed += 1;
            }
        }

        if archive.group(group.id)?.is_none() {
            tracing::info!(group = %group.name, remote_id = %group.id, "archiving group");
            archive.upsert_group(archived(group))?;
            report.archived += 1;
        }
    }
    Ok(report)
}

fn archived(group: RemoteGroup) -> ArchivedGroup {
    ArchivedGroup {
        remote_id: group.id,
        location_id: group.location_id,
        name: group.name,
        description: group.description,
        user_count: group.user_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Berg skole Lærere", TeacherAccess::Allow)]
    #[case("BERG SKOLE LÆRERE", TeacherAccess::Allow)]
    #[case("Berg skole Elever", TeacherAccess::Deny)]
    #[case("7A - Berg skole", TeacherAccess::Deny)]
    fn access_follows_group_name(#[case] name: &str, #[case] expected: TeacherAccess) {
        assert_eq!(access_for(name), expected);
    }
}
