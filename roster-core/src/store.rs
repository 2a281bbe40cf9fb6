//! Narrow capability interfaces over keyed record stores.
//!
//! The engine only ever sees [`Reader`] (master stores) and [`ReaderWriter`]
//! (archive). Concrete stores — JSON snapshots, the JSON archive, or the
//! [`MemoryStore`] they are built on — are swapped freely behind them.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::CoreError;

/// A record with a stable primary key.
pub trait Keyed {
    type Key: Ord + Clone + fmt::Debug;

    fn key(&self) -> Self::Key;
}

/// Read access to a keyed collection.
pub trait Reader<T: Keyed> {
    fn get(&self, key: &T::Key) -> Result<Option<T>, CoreError>;

    /// Every record, ordered by key.
    fn all(&self) -> Result<Vec<T>, CoreError>;
}

/// Read/write access to a keyed collection.
///
/// Implementations must make each mutation durable before returning `Ok`.
pub trait ReaderWriter<T: Keyed>: Reader<T> {
    fn upsert(&mut self, item: T) -> Result<(), CoreError>;

    /// Remove by key, returning the removed record if it existed.
    fn remove(&mut self, key: &T::Key) -> Result<Option<T>, CoreError>;
}

/// Ordered in-memory store. Never fails.
#[derive(Debug, Clone)]
pub struct MemoryStore<T: Keyed> {
    items: BTreeMap<T::Key, T>,
}

impl<T: Keyed> Default for MemoryStore<T> {
    fn default() -> Self {
        Self {
            items: BTreeMap::new(),
        }
    }
}

impl<T: Keyed> MemoryStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.items.values()
    }

    pub fn insert(&mut self, item: T) -> Option<T> {
        self.items.insert(item.key(), item)
    }

    pub fn take(&mut self, key: &T::Key) -> Option<T> {
        self.items.remove(key)
    }
}

impl<T: Keyed> FromIterator<T> for MemoryStore<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut store = Self::new();
        for item in iter {
            store.insert(item);
        }
        store
    }
}

impl<T: Keyed + Clone> Reader<T> for MemoryStore<T> {
    fn get(&self, key: &T::Key) -> Result<Option<T>, CoreError> {
        Ok(self.items.get(key).cloned())
    }

    fn all(&self) -> Result<Vec<T>, CoreError> {
        Ok(self.items.values().cloned().collect())
    }
}

impl<T: Keyed + Clone> ReaderWriter<T> for MemoryStore<T> {
    fn upsert(&mut self, item: T) -> Result<(), CoreError> {
        self.insert(item);
        Ok(())
    }

    fn remove(&mut self, key: &T::Key) -> Result<Option<T>, CoreError> {
        Ok(self.take(key))
    }
}
