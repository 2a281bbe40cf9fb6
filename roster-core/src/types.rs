//! Domain types shared by every Roster crate.
//!
//! Upstream rows are mapped into [`IdentityRecord`] by `roster-source`; the
//! engine in `roster-sync` turns records into a [`Projection`] and persists
//! it as an [`ArchiveEntry`] once the remote directory has accepted it.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::store::Keyed;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Stable, opaque identifier of a person in the master stores.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExternalId(pub String);

impl ExternalId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ExternalId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ExternalId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Numeric id the remote directory assigns to users and groups.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct RemoteId(pub u32);

impl RemoteId {
    /// Ids of 0 are never handed out by the remote directory.
    pub fn is_valid(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Remote location (site) id. `0` marks a location that cannot be synced.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct LocationId(pub u32);

impl LocationId {
    pub const UNRESOLVED: LocationId = LocationId(0);

    pub fn is_resolved(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Which master store a record comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityKind {
    Student,
    Teacher,
}

impl fmt::Display for IdentityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityKind::Student => write!(f, "student"),
            IdentityKind::Teacher => write!(f, "teacher"),
        }
    }
}

/// Access-control attribute on a remote group: whether teachers may manage it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeacherAccess {
    Allow,
    Deny,
}

impl fmt::Display for TeacherAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TeacherAccess::Allow => write!(f, "allow"),
            TeacherAccess::Deny => write!(f, "deny"),
        }
    }
}

// ---------------------------------------------------------------------------
// Group descriptors
// ---------------------------------------------------------------------------

/// One entry of the semi-structured group metadata attached to a person.
///
/// Field names follow the upstream JSON document; upstream emits `null` for
/// missing strings, which deserializes to the empty value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GroupDescriptor {
    #[serde(rename = "ID", default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(rename = "Name", default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(rename = "Type", default, deserialize_with = "null_as_default")]
    pub group_type: String,
    #[serde(rename = "OwnerID", default, deserialize_with = "null_as_default")]
    pub owner_id: String,
    #[serde(rename = "RoleType", default, deserialize_with = "null_as_default")]
    pub role_type: String,
    #[serde(rename = "GrepCode", default, deserialize_with = "null_as_default")]
    pub grep_codes: Vec<String>,
    #[serde(rename = "TimeframeBegin", default, skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<String>,
    #[serde(rename = "TimeframeEnd", default, skip_serializing_if = "Option::is_none")]
    pub valid_to: Option<String>,
    #[serde(rename = "SourceSystem", default, skip_serializing_if = "Option::is_none")]
    pub source_system: Option<String>,
}

impl GroupDescriptor {
    /// Case-insensitive containment check on the descriptor type.
    pub fn type_contains(&self, needle: &str) -> bool {
        self.group_type.to_lowercase().contains(&needle.to_lowercase())
    }

    /// Case-insensitive containment check on the owner id.
    pub fn owner_contains(&self, needle: &str) -> bool {
        self.owner_id.to_lowercase().contains(&needle.to_lowercase())
    }

    /// The first grep code, if any.
    pub fn primary_grep_code(&self) -> Option<&str> {
        self.grep_codes.first().map(String::as_str)
    }
}

/// Parse the raw descriptor array stored alongside a master-store row.
///
/// Blank input is an empty list, not an error.
pub fn parse_descriptors(raw: &str) -> Result<Vec<GroupDescriptor>, serde_json::Error> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    let parsed: Option<Vec<GroupDescriptor>> = serde_json::from_str(raw)?;
    Ok(parsed.unwrap_or_default())
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Master-store records
// ---------------------------------------------------------------------------

/// A person as seen by the master stores, already mapped to Roster's shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub kind: IdentityKind,
    pub external_id: ExternalId,
    /// Raw directory account name, before the principal domain is appended.
    pub account_name: String,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub home_location_code: String,
    #[serde(default)]
    pub secondary_location_codes: Vec<String>,
    #[serde(default)]
    pub descriptors: Vec<GroupDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    pub active: bool,
}

impl Keyed for IdentityRecord {
    type Key = ExternalId;

    fn key(&self) -> ExternalId {
        self.external_id.clone()
    }
}

/// A school or site, addressable by organization number or internal unique id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub unique_id: String,
    #[serde(default)]
    pub organization_number: String,
    pub name: String,
    /// Remote location id exactly as stored upstream; may be blank or garbage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_location_id: Option<String>,
}

impl Keyed for Location {
    type Key = String;

    fn key(&self) -> String {
        self.unique_id.clone()
    }
}

// ---------------------------------------------------------------------------
// Archive
// ---------------------------------------------------------------------------

/// Every syncable field of a remote identity, in canonical form.
///
/// Built fresh from source data on every pass and stored verbatim as the
/// archive snapshot after a successful push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Projection {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub location_id: LocationId,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub member_of: Vec<String>,
    #[serde(default)]
    pub teacher_groups: Vec<RemoteId>,
    #[serde(default)]
    pub children: Vec<String>,
}

/// What has been pushed downstream for one person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    pub external_id: ExternalId,
    pub remote_id: RemoteId,
    pub snapshot: Projection,
    pub synced_at: DateTime<Utc>,
}

impl Keyed for ArchiveEntry {
    type Key = ExternalId;

    fn key(&self) -> ExternalId {
        self.external_id.clone()
    }
}

/// A remote group known to the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivedGroup {
    pub remote_id: RemoteId,
    pub location_id: LocationId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub user_count: u32,
}

impl Keyed for ArchivedGroup {
    type Key = RemoteId;

    fn key(&self) -> RemoteId {
        self.remote_id
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
