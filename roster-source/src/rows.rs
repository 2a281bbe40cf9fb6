//! Raw master-store rows and their mapping onto [`IdentityRecord`].
//!
//! Column names are those of the upstream tables, so snapshot exports can be
//! produced with a plain `SELECT ... FOR JSON`.

use serde::{Deserialize, Serialize};

use roster_core::{
    types::parse_descriptors, ExternalId, GroupDescriptor, IdentityKind, IdentityRecord, Location,
    Settings,
};

/// A row of the student master store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentRow {
    #[serde(rename = "ADObjectID", default)]
    pub object_id: Option<String>,
    #[serde(default)]
    pub samaccountname: Option<String>,
    #[serde(default)]
    pub firstname: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
    #[serde(default)]
    pub school_code: Option<String>,
    #[serde(default)]
    pub class_level: Option<String>,
    #[serde(rename = "IsActive", default)]
    pub is_active: Option<String>,
    #[serde(rename = "JsonGroups", default)]
    pub json_groups: Option<String>,
}

/// A row of the staff master store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffRow {
    #[serde(rename = "ADObjectID", default)]
    pub object_id: Option<String>,
    #[serde(default)]
    pub ad_samaccountname: Option<String>,
    #[serde(default)]
    pub ad_upn: Option<String>,
    #[serde(rename = "Firstname", default)]
    pub firstname: Option<String>,
    #[serde(rename = "Lastname", default)]
    pub lastname: Option<String>,
    #[serde(rename = "School_Code_Primary", default)]
    pub school_code_primary: Option<String>,
    /// `;`-separated secondary location codes.
    #[serde(rename = "School_Code_Others", default)]
    pub school_code_others: Option<String>,
    #[serde(rename = "JobTitle", default)]
    pub job_title: Option<String>,
    #[serde(rename = "IsActive", default)]
    pub is_active: Option<String>,
    #[serde(rename = "JsonGroups", default)]
    pub json_groups: Option<String>,
}

/// A row of either store's location table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationRow {
    #[serde(rename = "UniqueID", default)]
    pub unique_id: Option<String>,
    #[serde(rename = "Organization_Number", default)]
    pub organization_number: Option<String>,
    #[serde(rename = "Name", default)]
    pub name: Option<String>,
    #[serde(rename = "RemoteLocationId", alias = "JamfLocationId", default)]
    pub remote_location_id: Option<String>,
}

impl StudentRow {
    /// Map to a record; rows without an object id cannot be tracked and yield `None`.
    pub fn into_record(self, settings: &Settings) -> Option<IdentityRecord> {
        let external_id = non_blank(self.object_id)?;
        let account_name = self.samaccountname.unwrap_or_default().trim().to_string();
        let principal = settings.principal_for(&account_name);
        let descriptors = descriptors_or_empty(&external_id, self.json_groups.as_deref());
        Some(IdentityRecord {
            kind: IdentityKind::Student,
            external_id: ExternalId(external_id),
            username: principal.clone(),
            email: principal,
            account_name,
            first_name: trimmed(self.firstname),
            last_name: trimmed(self.lastname),
            home_location_code: trimmed(self.school_code),
            secondary_location_codes: Vec::new(),
            descriptors,
            grade_level: non_blank(self.class_level),
            job_title: None,
            active: is_active(self.is_active.as_deref()),
        })
    }
}

impl StaffRow {
    /// Map to a record; rows without an object id cannot be tracked and yield `None`.
    pub fn into_record(self, settings: &Settings) -> Option<IdentityRecord> {
        let external_id = non_blank(self.object_id)?;
        let account_name = self.ad_samaccountname.unwrap_or_default().trim().to_string();
        let descriptors = descriptors_or_empty(&external_id, self.json_groups.as_deref());
        let secondary_location_codes = self
            .school_code_others
            .as_deref()
            .unwrap_or_default()
            .split(';')
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .map(str::to_string)
            .collect();
        Some(IdentityRecord {
            kind: IdentityKind::Teacher,
            external_id: ExternalId(external_id),
            username: settings.principal_for(&account_name),
            email: trimmed(self.ad_upn),
            account_name,
            first_name: trimmed(self.firstname),
            last_name: trimmed(self.lastname),
            home_location_code: trimmed(self.school_code_primary),
            secondary_location_codes,
            descriptors,
            grade_level: None,
            job_title: non_blank(self.job_title),
            active: is_active(self.is_active.as_deref()),
        })
    }
}

impl LocationRow {
    pub fn into_location(self) -> Option<Location> {
        Some(Location {
            unique_id: non_blank(self.unique_id)?,
            organization_number: trimmed(self.organization_number),
            name: trimmed(self.name),
            remote_location_id: non_blank(self.remote_location_id),
        })
    }
}

/// Upstream stores the flag as text; only an explicit "false" deactivates.
fn is_active(raw: Option<&str>) -> bool {
    !matches!(raw, Some(value) if value.trim().eq_ignore_ascii_case("false"))
}

fn descriptors_or_empty(external_id: &str, raw: Option<&str>) -> Vec<GroupDescriptor> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    match parse_descriptors(raw) {
        Ok(descriptors) => descriptors,
        Err(err) => {
            tracing::warn!(
                external_id,
                error = %err,
                "group descriptors are not valid JSON; deriving no class groups",
            );
            Vec::new()
        }
    }
}

fn trimmed(value: Option<String>) -> String {
    value.map(|v| v.trim().to_string()).unwrap_or_default()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
