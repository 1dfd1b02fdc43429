//! In-memory store implementation.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tracing::debug;

use crate::{CacheStorage, DeleteStatus, Metadata, Store, StoreResult, StoredEntry};

/// In-memory [`Store`] backed by a [`DashMap`].
///
/// Cheap to clone: clones share the same entries.
///
/// # Caveats
///
/// - Data is **not persisted**: it is lost on process restart
/// - [`Store::keys`] returns keys in no particular order
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, StoredEntry>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently stored.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn put(&self, key: &str, data: Bytes, metadata: Metadata) -> StoreResult<()> {
        self.entries
            .insert(key.to_owned(), StoredEntry::new(data, metadata));
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<StoredEntry>> {
        Ok(self.entries.get(key).map(|entry| entry.clone()))
    }

    async fn delete(&self, key: &str) -> StoreResult<DeleteStatus> {
        match self.entries.remove(key) {
            Some(_) => Ok(DeleteStatus::Deleted),
            None => Ok(DeleteStatus::Missing),
        }
    }

    async fn keys(&self) -> StoreResult<Vec<String>> {
        Ok(self.entries.iter().map(|entry| entry.key().clone()).collect())
    }

    async fn total_size(&self) -> StoreResult<u64> {
        Ok(self.entries.iter().map(|entry| entry.value().size()).sum())
    }
}

/// In-memory [`CacheStorage`]: a set of named [`MemoryStore`]s.
///
/// Clones share the same stores, which models several pages of one origin
/// seeing the same platform cache.
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    stores: Arc<DashMap<String, MemoryStore>>,
}

impl MemoryStorage {
    /// Creates an empty storage with no stores.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the store called `name` without creating it.
    pub fn store(&self, name: &str) -> Option<MemoryStore> {
        self.stores.get(name).map(|store| store.clone())
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, name: &str) -> StoreResult<Arc<dyn Store>> {
        let store = self
            .stores
            .entry(name.to_owned())
            .or_insert_with(|| {
                debug!(store = name, "Creating cache store");
                MemoryStore::new()
            })
            .clone();
        Ok(Arc::new(store))
    }

    async fn has(&self, name: &str) -> StoreResult<bool> {
        Ok(self.stores.contains_key(name))
    }

    async fn delete(&self, name: &str) -> StoreResult<bool> {
        Ok(self.stores.remove(name).is_some())
    }

    async fn names(&self) -> StoreResult<Vec<String>> {
        let mut names: Vec<String> = self.stores.iter().map(|s| s.key().clone()).collect();
        names.sort();
        Ok(names)
    }
}
