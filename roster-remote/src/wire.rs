//! JSON bodies exchanged with the remote directory.

use serde::{Deserialize, Serialize};

use roster_core::{LocationId, Projection, RemoteId, TeacherAccess};

/// Envelope returned by every mutating call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub id: Option<u32>,
}

impl ApiResponse {
    /// The id handed back by a create, if it is usable.
    pub fn remote_id(&self) -> Option<RemoteId> {
        self.id.map(RemoteId).filter(|id| id.is_valid())
    }
}

/// Body of `POST users`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIdentityPayload {
    pub username: String,
    /// Always blank: accounts authenticate through the identity provider.
    pub password: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub location_id: LocationId,
    pub domain: String,
    pub member_of: Vec<String>,
    pub teacher: Vec<RemoteId>,
    pub children: Vec<String>,
}

impl From<&Projection> for CreateIdentityPayload {
    fn from(p: &Projection) -> Self {
        Self {
            username: p.username.clone(),
            password: String::new(),
            email: p.email.clone(),
            first_name: p.first_name.clone(),
            last_name: p.last_name.clone(),
            location_id: p.location_id,
            domain: p.domain.clone(),
            member_of: p.member_of.clone(),
            teacher: p.teacher_groups.clone(),
            children: p.children.clone(),
        }
    }
}

/// A user as returned by `GET users/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteIdentity {
    pub id: RemoteId,
    #[serde(default)]
    pub location_id: LocationId,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub groups: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SingleIdentity {
    pub user: Option<RemoteIdentity>,
}

/// A group as returned by `GET users/groups`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteGroup {
    pub id: RemoteId,
    #[serde(default)]
    pub location_id: LocationId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub user_count: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GroupList {
    #[serde(default)]
    pub groups: Vec<RemoteGroup>,
}

/// Group access-control block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Acl {
    pub teacher: TeacherAccess,
}

/// Body of `POST users/groups`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupPayload {
    pub name: String,
    pub location_id: LocationId,
    pub acl: Acl,
}

impl GroupPayload {
    pub fn new(name: impl Into<String>, location_id: LocationId, teacher: TeacherAccess) -> Self {
        Self {
            name: name.into(),
            location_id,
            acl: Acl { teacher },
        }
    }
}

/// Body of `PUT users/groups/{id}`; only set fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acl: Option<Acl>,
}

impl GroupUpdate {
    /// An update touching only the teacher-access attribute.
    pub fn access(teacher: TeacherAccess) -> Self {
        Self {
            name: None,
            acl: Some(Acl { teacher }),
        }
    }
}
