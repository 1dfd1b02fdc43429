use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::{DeleteStatus, Metadata, StoreResult, StoredEntry};

/// A single named cache store: a key/value byte store.
///
/// Puts are last-writer-wins per key. There are no transactions: several
/// pages sharing one store may interleave writes freely.
#[async_trait]
pub trait Store: Send + Sync {
    /// Stores `data` with `metadata` under `key`, replacing any previous value.
    async fn put(&self, key: &str, data: Bytes, metadata: Metadata) -> StoreResult<()>;

    /// Returns the entry stored under `key`.
    async fn get(&self, key: &str) -> StoreResult<Option<StoredEntry>>;

    /// Removes the entry stored under `key`.
    async fn delete(&self, key: &str) -> StoreResult<DeleteStatus>;

    /// Lists every key currently stored.
    async fn keys(&self) -> StoreResult<Vec<String>>;

    /// Sum of the blob sizes of every entry in this store.
    async fn total_size(&self) -> StoreResult<u64> {
        let mut total = 0;
        for key in self.keys().await? {
            // A key may disappear between listing and reading.
            if let Some(entry) = self.get(&key).await? {
                total += entry.size();
            }
        }
        Ok(total)
    }
}

#[async_trait]
impl Store for Arc<dyn Store> {
    async fn put(&self, key: &str, data: Bytes, metadata: Metadata) -> StoreResult<()> {
        (**self).put(key, data, metadata).await
    }

    async fn get(&self, key: &str) -> StoreResult<Option<StoredEntry>> {
        (**self).get(key).await
    }

    async fn delete(&self, key: &str) -> StoreResult<DeleteStatus> {
        (**self).delete(key).await
    }

    async fn keys(&self) -> StoreResult<Vec<String>> {
        (**self).keys().await
    }

    async fn total_size(&self) -> StoreResult<u64> {
        (**self).total_size().await
    }
}

/// A registry of named [`Store`]s, shared by every page of one origin.
///
/// This is the shape of a platform cache storage: stores are created on
/// first open, enumerated by name, and deleted as a whole.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Opens the store called `name`, creating it if it does not exist.
    async fn open(&self, name: &str) -> StoreResult<Arc<dyn Store>>;

    /// Returns `true` if a store called `name` exists.
    async fn has(&self, name: &str) -> StoreResult<bool>;

    /// Deletes the store called `name` with all its entries.
    ///
    /// Returns `true` if the store existed.
    async fn delete(&self, name: &str) -> StoreResult<bool>;

    /// Lists the names of all existing stores.
    async fn names(&self) -> StoreResult<Vec<String>>;

    /// Sum of the blob sizes across every entry of every store.
    async fn total_size(&self) -> StoreResult<u64> {
        let mut total = 0;
        for name in self.names().await? {
            total += self.open(&name).await?.total_size().await?;
        }
        Ok(total)
    }
}

#[async_trait]
impl CacheStorage for Arc<dyn CacheStorage> {
    async fn open(&self, name: &str) -> StoreResult<Arc<dyn Store>> {
        (**self).open(name).await
    }

    async fn has(&self, name: &str) -> StoreResult<bool> {
        (**self).has(name).await
    }

    async fn delete(&self, name: &str) -> StoreResult<bool> {
        (**self).delete(name).await
    }

    async fn names(&self) -> StoreResult<Vec<String>> {
        (**self).names().await
    }

    async fn total_size(&self) -> StoreResult<u64> {
        (**self).total_size().await
    }
}
