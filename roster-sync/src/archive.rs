//! Archive Store — durable record of what has been pushed downstream.
//!
//! # File layout
//!
//! ```text
//! {
//!   "updated_at": "2026-01-01T00:00:00Z",
//!   "identities": [ <ArchiveEntry>, ... ],
//!   "groups":     [ <ArchivedGroup>, ... ]
//! }
//! ```
//!
//! [`JsonArchive`] rewrites the whole file after every mutation using the
//! atomic `.tmp` + rename pattern, so a mutation is durable once it returns.
//! A mutation whose write fails is rolled back in memory as well.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use roster_core::{
    error::{io_err, json_err},
    ArchiveEntry, ArchivedGroup, CoreError, ExternalId, Keyed, LocationId, MemoryStore, Reader,
    ReaderWriter, RemoteId,
};

/// Identity and group archive, as seen by the engine.
pub trait Archive: ReaderWriter<ArchiveEntry> + ReaderWriter<ArchivedGroup> {
    fn entry(&self, id: &ExternalId) -> Result<Option<ArchiveEntry>, CoreError> {
        Reader::<ArchiveEntry>::get(self, id)
    }

    fn entries(&self) -> Result<Vec<ArchiveEntry>, CoreError> {
        Reader::<ArchiveEntry>::all(self)
    }

    fn upsert_entry(&mut self, entry: ArchiveEntry) -> Result<(), CoreError> {
        ReaderWriter::<ArchiveEntry>::upsert(self, entry)
    }

    fn remove_entry(&mut self, id: &ExternalId) -> Result<Option<ArchiveEntry>, CoreError> {
        ReaderWriter::<ArchiveEntry>::remove(self, id)
    }

    fn group(&self, id: RemoteId) -> Result<Option<ArchivedGroup>, CoreError> {
        Reader::<ArchivedGroup>::get(self, &id)
    }

    fn groups(&self) -> Result<Vec<ArchivedGroup>, CoreError> {
        Reader::<ArchivedGroup>::all(self)
    }

    /// First archived group named exactly `name` whose location is in `scope`.
    fn get_group(
        &self,
        name: &str,
        scope: &[LocationId],
    ) -> Result<Option<ArchivedGroup>, CoreError> {
        Ok(self
            .groups()?
            .into_iter()
            .find(|g| g.name == name && scope.contains(&g.location_id)))
    }

    fn upsert_group(&mut self, group: ArchivedGroup) -> Result<(), CoreError> {
        ReaderWriter::<ArchivedGroup>::upsert(self, group)
    }
}

// ---------------------------------------------------------------------------
// In-memory archive
// ---------------------------------------------------------------------------

/// Non-durable archive; used for tests and as the working set of [`JsonArchive`].
#[derive(Debug, Clone, Default)]
pub struct MemoryArchive {
    identities: MemoryStore<ArchiveEntry>,
    groups: MemoryStore<ArchivedGroup>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn identity_count(&self) -> usize {
        self.identities.len()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}

impl Reader<ArchiveEntry> for MemoryArchive {
    fn get(&self, key: &ExternalId) -> Result<Option<ArchiveEntry>, CoreError> {
        self.identities.get(key)
    }

    fn all(&self) -> Result<Vec<ArchiveEntry>, CoreError> {
        self.identities.all()
    }
}

impl ReaderWriter<ArchiveEntry> for MemoryArchive {
    fn upsert(&mut self, item: ArchiveEntry) -> Result<(), CoreError> {
        self.identities.upsert(item)
    }

    fn remove(&mut self, key: &ExternalId) -> Result<Option<ArchiveEntry>, CoreError> {
        self.identities.remove(key)
    }
}

impl Reader<ArchivedGroup> for MemoryArchive {
    fn get(&self, key: &RemoteId) -> Result<Option<ArchivedGroup>, CoreError> {
        self.groups.get(key)
    }

    fn all(&self) -> Result<Vec<ArchivedGroup>, CoreError> {
        self.groups.all()
    }
}

impl ReaderWriter<ArchivedGroup> for MemoryArchive {
    fn upsert(&mut self, item: ArchivedGroup) -> Result<(), CoreError> {
        self.groups.upsert(item)
    }

    fn remove(&mut self, key: &RemoteId) -> Result<Option<ArchivedGroup>, CoreError> {
        self.groups.remove(key)
    }
}

impl Archive for MemoryArchive {
    fn get_group(
        &self,
        name: &str,
        scope: &[LocationId],
    ) -> Result<Option<ArchivedGroup>, CoreError> {
        Ok(self
            .groups
            .values()
            .find(|g| g.name == name && scope.contains(&g.location_id))
            .cloned())
    }
}

// ---------------------------------------------------------------------------
// JSON file archive
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
struct ArchiveFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    identities: Vec<ArchiveEntry>,
    #[serde(default)]
    groups: Vec<ArchivedGroup>,
}

/// File-backed archive.
#[derive(Debug)]
pub struct JsonArchive {
    path: PathBuf,
    updated_at: Option<DateTime<Utc>>,
    inner: MemoryArchive,
}

impl JsonArchive {
    /// Open the archive at `path`; a missing file is an empty archive.
    pub fn open(path: &Path) -> Result<Self, CoreError> {
        let file = if path.exists() {
            let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
            if contents.trim().is_empty() {
                ArchiveFile::default()
            } else {
                serde_json::from_str(&contents).map_err(|e| json_err(path, e))?
            }
        } else {
            ArchiveFile::default()
        };

        let inner = MemoryArchive {
            identities: file.identities.into_iter().collect(),
            groups: file.groups.into_iter().collect(),
        };
        tracing::debug!(
            path = %path.display(),
            identities = inner.identity_count(),
            groups = inner.group_count(),
            "opened archive",
        );
        Ok(Self {
            path: path.to_path_buf(),
            updated_at: file.updated_at,
            inner,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Time of the last write, if the archive was ever written.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn identity_count(&self) -> usize {
        self.inner.identity_count()
    }

    pub fn group_count(&self) -> usize {
        self.inner.group_count()
    }

    /// Write the archive atomically: `<path>.tmp` then rename.
    fn save(&mut self) -> Result<(), CoreError> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;

        let updated_at = Utc::now();
        let file = ArchiveFile {
            updated_at: Some(updated_at),
            identities: self.inner.identities.values().cloned().collect(),
            groups: self.inner.groups.values().cloned().collect(),
        };
        let json = serde_json::to_string_pretty(&file).map_err(|e| json_err(&self.path, e))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| io_err(&self.path, e))?;
        self.updated_at = Some(updated_at);
        Ok(())
    }
}

impl Reader<ArchiveEntry> for JsonArchive {
    fn get(&self, key: &ExternalId) -> Result<Option<ArchiveEntry>, CoreError> {
        Reader::<ArchiveEntry>::get(&self.inner, key)
    }

    fn all(&self) -> Result<Vec<ArchiveEntry>, CoreError> {
        Reader::<ArchiveEntry>::all(&self.inner)
    }
}

impl ReaderWriter<ArchiveEntry> for JsonArchive {
    fn upsert(&mut self, item: ArchiveEntry) -> Result<(), CoreError> {
        let key = item.key();
        let previous = self.inner.identities.insert(item);
        if let Err(err) = self.save() {
            restore(&mut self.inner.identities, &key, previous);
            return Err(err);
        }
        Ok(())
    }

    fn remove(&mut self, key: &ExternalId) -> Result<Option<ArchiveEntry>, CoreError> {
        let Some(removed) = self.inner.identities.take(key) else {
            return Ok(None);
        };
        if let Err(err) = self.save() {
            self.inner.identities.insert(removed);
            return Err(err);
        }
        Ok(Some(removed))
    }
}

impl Reader<ArchivedGroup> for JsonArchive {
    fn get(&self, key: &RemoteId) -> Result<Option<ArchivedGroup>, CoreError> {
        Reader::<ArchivedGroup>::get(&self.inner, key)
    }

    fn all(&self) -> Result<Vec<ArchivedGroup>, CoreError> {
        Reader::<ArchivedGroup>::all(&self.inner)
    }
}

impl ReaderWriter<ArchivedGroup> for JsonArchive {
    fn upsert(&mut self, item: ArchivedGroup) -> Result<(), CoreError> {
        let key = item.key();
        let previous = self.inner.groups.insert(item);
        if let Err(err) = self.save() {
            restore(&mut self.inner.groups, &key, previous);
            return Err(err);
        }
        Ok(())
    }

    fn remove(&mut self, key: &RemoteId) -> Result<Option<ArchivedGroup>, CoreError> {
        let Some(removed) = self.inner.groups.take(key) else {
            return Ok(None);
        };
        if let Err(err) = self.save() {
            self.inner.groups.insert(removed);
            return Err(err);
        }
        Ok(Some(removed))
    }
}

impl Archive for JsonArchive {
    fn get_group(
        &self,
        name: &str,
        scope: &[LocationId],
    ) -> Result<Option<ArchivedGroup>, CoreError> {
        self.inner.get_group(name, scope)
    }
}

/// Undo an insert whose save failed.
fn restore<T: Keyed>(store: &mut MemoryStore<T>, key: &T::Key, previous: Option<T>) {
    match previous {
        Some(item) => {
            store.insert(item);
        }
        None => {
            store.take(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roster_core::Projection;
    use tempfile::TempDir;

    fn entry(id: &str, remote: u32) -> ArchiveEntry {
        ArchiveEntry {
            external_id: ExternalId::from(id),
            remote_id: RemoteId(remote),
            snapshot: Projection {
                username: format!("{id}@example.no"),
                location_id: LocationId(42),
                ..Default::default()
            },
            synced_at: Utc::now(),
        }
    }

    fn group(id: u32, location: u32, name: &str) -> ArchivedGroup {
        ArchivedGroup {
            remote_id: RemoteId(id),
            location_id: LocationId(location),
            name: name.to_string(),
            description: None,
            user_count: 0,
        }
    }

    #[test]
    fn missing_file_is_empty_archive() {
        let tmp = TempDir::new().unwrap();
        let archive = JsonArchive::open(&tmp.path().join("archive.json")).unwrap();
        assert_eq!(archive.identity_count(), 0);
        assert!(archive.updated_at().is_none());
    }

    #[test]
    fn every_mutation_is_persisted() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state").join("archive.json");

        let mut archive = JsonArchive::open(&path).unwrap();
        archive.upsert_entry(entry("a", 10)).unwrap();
        archive.upsert_entry(entry("b", 11)).unwrap();
        archive.upsert_group(group(3, 42, "Berg Elever")).unwrap();
        archive.remove_entry(&ExternalId::from("a")).unwrap();

        let reopened = JsonArchive::open(&path).unwrap();
        assert!(reopened.entry(&ExternalId::from("a")).unwrap().is_none());
        assert_eq!(
            reopened.entry(&ExternalId::from("b")).unwrap().unwrap().remote_id,
            RemoteId(11)
        );
        assert_eq!(reopened.group_count(), 1);
        assert!(reopened.updated_at().is_some());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn corrupt_archive_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("archive.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = JsonArchive::open(&path).unwrap_err();
        assert!(matches!(err, CoreError::Json { .. }), "got: {err}");
    }

    #[test]
    fn group_lookup_is_scoped_by_location() {
        let mut archive = MemoryArchive::new();
        archive.upsert_group(group(3, 42, "Berg Lærere")).unwrap();
        archive.upsert_group(group(4, 43, "Berg Lærere")).unwrap();

        let found = archive
            .get_group("Berg Lærere", &[LocationId(43)])
            .unwrap()
            .unwrap();
        assert_eq!(found.remote_id, RemoteId(4));
        assert!(archive
            .get_group("Berg Lærere", &[LocationId(99)])
            .unwrap()
            .is_none());
        assert!(archive.get_group("berg lærere", &[LocationId(42)]).unwrap().is_none());
    }

    #[test]
    fn failed_write_leaves_memory_unchanged() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("archive.json");
        let mut archive = JsonArchive::open(&path).unwrap();
        archive.upsert_entry(entry("kept", 10)).unwrap();

        // A directory where the temp file should go makes every save fail.
        std::fs::create_dir(path.with_extension("json.tmp")).unwrap();

        assert!(archive.upsert_entry(entry("new", 11)).is_err());
        assert!(archive.entry(&ExternalId::from("new")).unwrap().is_none());

        let mut moved = entry("kept", 10);
        moved.remote_id = RemoteId(12);
        assert!(archive.upsert_entry(moved).is_err());
        assert_eq!(
            archive.entry(&ExternalId::from("kept")).unwrap().unwrap().remote_id,
            RemoteId(10)
        );

        assert!(archive.remove_entry(&ExternalId::from("kept")).is_err());
        assert!(archive.entry(&ExternalId::from("kept")).unwrap().is_some());

        assert!(archive.upsert_group(group(3, 42, "Berg Elever")).is_err());
        assert_eq!(archive.group_count(), 0);
    }
}
