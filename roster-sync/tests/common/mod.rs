//! Shared fixtures: a recording fake directory and master-store builders.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::path::PathBuf;

use roster_core::{
    settings::{RemoteSettings, StoreSettings},
    ExternalId, GroupDescriptor, IdentityKind, IdentityRecord, Location, LocationId, RemoteId,
    Settings, TeacherAccess,
};
use roster_remote::{
    ApiResponse, CreateIdentityPayload, DirectoryClient, Field, GroupPayload, GroupUpdate,
    RemoteError, RemoteGroup, RemoteIdentity, SparseUpdate,
};
use roster_source::SnapshotStore;

// ---------------------------------------------------------------------------
// Recording directory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateIdentity(CreateIdentityPayload),
    UpdateIdentity(RemoteId, Vec<Field>),
    DeleteIdentity(RemoteId),
    GetIdentity(RemoteId),
    CreateGroup(String, LocationId, TeacherAccess),
    UpdateGroup(RemoteId),
    ListGroups,
}

impl Call {
    pub fn is_identity_call(&self) -> bool {
        matches!(
            self,
            Call::CreateIdentity(_)
                | Call::UpdateIdentity(..)
                | Call::DeleteIdentity(_)
                | Call::GetIdentity(_)
        )
    }
}

/// In-memory directory that records every call and can be told to misbehave.
pub struct RecordingDirectory {
    calls: RefCell<Vec<Call>>,
    next_id: Cell<u32>,
    pub create_without_id: Cell<bool>,
    pub fail_creates: Cell<bool>,
    pub fail_updates: Cell<bool>,
    pub fail_deletes: Cell<bool>,
    pub missing_identities: RefCell<Vec<RemoteId>>,
    pub remote_groups: RefCell<Vec<RemoteGroup>>,
}

impl Default for RecordingDirectory {
    fn default() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            next_id: Cell::new(500),
            create_without_id: Cell::new(false),
            fail_creates: Cell::new(false),
            fail_updates: Cell::new(false),
            fail_deletes: Cell::new(false),
            missing_identities: RefCell::new(Vec::new()),
            remote_groups: RefCell::new(Vec::new()),
        }
    }
}

impl RecordingDirectory {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn identity_calls(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_identity_call).collect()
    }

    pub fn clear(&self) {
        self.calls.borrow_mut().clear();
    }

    fn log(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }

    fn allocate(&self) -> u32 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    fn unavailable(method: &'static str, url: &str) -> RemoteError {
        RemoteError::Status {
            method,
            url: url.to_string(),
            status: 503,
            reason: "Service Unavailable".to_string(),
        }
    }
}

impl DirectoryClient for RecordingDirectory {
    fn create_identity(&self, payload: &CreateIdentityPayload) -> Result<ApiResponse, RemoteError> {
        self.log(Call::CreateIdentity(payload.clone()));
        if self.fail_creates.get() {
            return Err(Self::unavailable("POST", "users"));
        }
        let id = if self.create_without_id.get() {
            None
        } else {
            Some(self.allocate())
        };
        Ok(ApiResponse {
            code: 200,
            message: None,
            id,
        })
    }

    fn update_identity(&self, id: RemoteId, update: &SparseUpdate) -> Result<(), RemoteError> {
        self.log(Call::UpdateIdentity(id, update.fields().collect()));
        if self.fail_updates.get() {
            return Err(Self::unavailable("PUT", "users"));
        }
        Ok(())
    }

    fn delete_identity(&self, id: RemoteId) -> Result<(), RemoteError> {
        self.log(Call::DeleteIdentity(id));
        if self.fail_deletes.get() {
            return Err(Self::unavailable("DELETE", "users"));
        }
        Ok(())
    }

    fn get_identity(&self, id: RemoteId) -> Result<RemoteIdentity, RemoteError> {
        self.log(Call::GetIdentity(id));
        if self.missing_identities.borrow().contains(&id) {
            return Err(RemoteError::NotFound {
                url: format!("users/{id}"),
            });
        }
        Ok(RemoteIdentity {
            id,
            ..Default::default()
        })
    }

    fn create_group(&self, payload: &GroupPayload) -> Result<ApiResponse, RemoteError> {
        self.log(Call::CreateGroup(
            payload.name.clone(),
            payload.location_id,
            payload.acl.teacher,
        ));
        Ok(ApiResponse {
            code: 200,
            message: None,
            id: Some(self.allocate()),
        })
    }

    fn update_group(&self, id: RemoteId, _update: &GroupUpdate) -> Result<(), RemoteError> {
        self.log(Call::UpdateGroup(id));
        Ok(())
    }

    fn list_groups(&self) -> Result<Vec<RemoteGroup>, RemoteError> {
        self.log(Call::ListGroups);
        Ok(self.remote_groups.borrow().clone())
    }
}

// ---------------------------------------------------------------------------
// Master-store fixtures
// ---------------------------------------------------------------------------

pub fn settings() -> Settings {
    let mut settings = Settings::new(
        RemoteSettings::new("http://localhost/"),
        StoreSettings {
            students: PathBuf::from("students.json"),
            staff: PathBuf::from("staff.json"),
        },
        PathBuf::from("archive.json"),
    );
    settings.principal_domain = "example.no".to_string();
    settings.sites.excluded_site_marker = Some("ooo".to_string());
    settings
}

pub fn locations() -> Vec<Location> {
    [
        ("U1", "NO123", "Berg skole", Some("42")),
        ("U2", "NO456", "Dal skole", Some("43")),
        ("1VO", "NO789", "Voksenopplæringen", Some("7")),
        ("U9", "NO000", "Ukjent skole", None),
    ]
    .into_iter()
    .map(|(unique_id, org, name, remote)| Location {
        unique_id: unique_id.to_string(),
        organization_number: org.to_string(),
        name: name.to_string(),
        remote_location_id: remote.map(str::to_string),
    })
    .collect()
}

pub fn descriptor(kind: &str, name: &str, owner: &str) -> GroupDescriptor {
    GroupDescriptor {
        group_type: kind.to_string(),
        name: name.to_string(),
        owner_id: owner.to_string(),
        ..Default::default()
    }
}

pub fn student(id: &str, location: &str) -> IdentityRecord {
    IdentityRecord {
        kind: IdentityKind::Student,
        external_id: ExternalId::from(id),
        account_name: id.to_string(),
        username: format!("{id}@example.no"),
        email: format!("{id}@example.no"),
        first_name: "Kari".to_string(),
        last_name: "Nordmann".to_string(),
        home_location_code: location.to_string(),
        secondary_location_codes: Vec::new(),
        descriptors: Vec::new(),
        grade_level: None,
        job_title: None,
        active: true,
    }
}

pub fn teacher(id: &str, location: &str) -> IdentityRecord {
    IdentityRecord {
        kind: IdentityKind::Teacher,
        email: format!("{id}@staff.example.no"),
        first_name: "Ola".to_string(),
        last_name: "Lærer".to_string(),
        job_title: Some("Lærer".to_string()),
        ..student(id, location)
    }
}

pub fn student_store(records: Vec<IdentityRecord>) -> SnapshotStore {
    SnapshotStore::from_parts(IdentityKind::Student, records, locations())
}

pub fn staff_store(records: Vec<IdentityRecord>) -> SnapshotStore {
    SnapshotStore::from_parts(IdentityKind::Teacher, records, locations())
}
