//! JSON snapshot exports of a master store.
//!
//! # File layout
//!
//! ```text
//! {
//!   "users":     [ <StudentRow | StaffRow>, ... ],
//!   "locations": [ <LocationRow>, ... ]
//! }
//! ```
//!
//! A snapshot is loaded fully into memory; the engine reads it through the
//! [`Reader`] capability only.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use roster_core::{
    error::{io_err, json_err},
    CoreError, IdentityKind, IdentityRecord, Location, MemoryStore, Reader, Settings,
};

use crate::error::SourceError;
use crate::rows::{LocationRow, StaffRow, StudentRow};

#[derive(Debug, Deserialize)]
struct RawSnapshot<U> {
    #[serde(default = "Vec::new")]
    users: Vec<U>,
    #[serde(default)]
    locations: Vec<LocationRow>,
}

/// One master store held in memory.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    kind: IdentityKind,
    records: MemoryStore<IdentityRecord>,
    locations: MemoryStore<Location>,
}

impl SnapshotStore {
    /// Build a store from already-mapped parts.
    pub fn from_parts(
        kind: IdentityKind,
        records: impl IntoIterator<Item = IdentityRecord>,
        locations: impl IntoIterator<Item = Location>,
    ) -> Self {
        Self {
            kind,
            records: records.into_iter().collect(),
            locations: locations.into_iter().collect(),
        }
    }

    /// Load the snapshot file for `kind`.
    ///
    /// Returns `CoreError::NotFound` (wrapped) if the export does not exist.
    pub fn load(kind: IdentityKind, path: &Path, settings: &Settings) -> Result<Self, SourceError> {
        if !path.exists() {
            return Err(CoreError::NotFound {
                path: path.to_path_buf(),
            }
            .into());
        }
        let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        let (records, locations) = match kind {
            IdentityKind::Student => {
                let raw: RawSnapshot<StudentRow> = parse(path, &contents)?;
                let records = map_rows(raw.users, |row| row.into_record(settings));
                (records, raw.locations)
            }
            IdentityKind::Teacher => {
                let raw: RawSnapshot<StaffRow> = parse(path, &contents)?;
                let records = map_rows(raw.users, |row| row.into_record(settings));
                (records, raw.locations)
            }
        };

        let mut store = Self::from_parts(kind, Vec::new(), Vec::new());
        for record in records {
            if let Some(previous) = store.records.insert(record) {
                tracing::warn!(
                    external_id = %previous.external_id,
                    path = %path.display(),
                    "duplicate object id in master store snapshot; keeping the last row",
                );
            }
        }
        for location in locations.into_iter().filter_map(LocationRow::into_location) {
            store.locations.insert(location);
        }

        tracing::debug!(
            kind = %kind,
            records = store.records.len(),
            locations = store.locations.len(),
            "loaded master store snapshot",
        );
        Ok(store)
    }

    /// Load the configured snapshot for `kind`.
    pub fn load_configured(kind: IdentityKind, settings: &Settings) -> Result<Self, SourceError> {
        let path = match kind {
            IdentityKind::Student => &settings.stores.students,
            IdentityKind::Teacher => &settings.stores.staff,
        };
        Self::load(kind, path, settings)
    }

    pub fn kind(&self) -> IdentityKind {
        self.kind
    }

    pub fn records(&self) -> &dyn Reader<IdentityRecord> {
        &self.records
    }

    pub fn locations(&self) -> &dyn Reader<Location> {
        &self.locations
    }
}

fn parse<T: DeserializeOwned>(path: &Path, contents: &str) -> Result<T, CoreError> {
    serde_json::from_str(contents).map_err(|e| json_err(path, e))
}

fn map_rows<R>(rows: Vec<R>, map: impl Fn(R) -> Option<IdentityRecord>) -> Vec<IdentityRecord> {
    let total = rows.len();
    let records: Vec<IdentityRecord> = rows.into_iter().filter_map(map).collect();
    if records.len() < total {
        tracing::info!(
            skipped = total - records.len(),
            "master store rows without an object id were skipped",
        );
    }
    records
}
