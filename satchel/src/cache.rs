//! In-memory response cache with TTL and insertion-order eviction.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use indexmap::IndexMap;
use satchel_core::CacheKey;
use tokio::time::Instant;
use tracing::debug;

use crate::ResponseData;

/// A cached response and the instant it was captured.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Decoded response.
    pub data: ResponseData,
    /// Capture instant.
    pub timestamp: Instant,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.timestamp) > ttl
    }
}

/// Response cache keyed by [`CacheKey`].
///
/// - An entry older than `ttl` is evicted by the lookup that finds it and is never returned.
/// - Holding more than `capacity` entries evicts the oldest inserted one.
/// - Re-storing a key counts as a fresh insertion.
#[derive(Debug)]
pub struct ResponseCache {
    entries: Mutex<IndexMap<CacheKey, CacheEntry>>,
    ttl: Duration,
    capacity: usize,
}

impl ResponseCache {
    /// Creates an empty cache.
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: Mutex::new(IndexMap::new()),
            ttl,
            capacity,
        }
    }

    /// Returns the fresh entry for `key`, evicting it if expired.
    pub fn get(&self, key: &CacheKey) -> Option<ResponseData> {
        let mut entries = self.lock();
        let expired = entries.get(key)?.is_expired(self.ttl, Instant::now());
        if expired {
            debug!(%key, "Evicting expired cache entry");
            entries.shift_remove(key);
            return None;
        }
        entries.get(key).map(|entry| entry.data.clone())
    }

    /// Stores `data` under `key` as the newest entry.
    pub fn insert(&self, key: CacheKey, data: ResponseData) {
        let mut entries = self.lock();
        entries.shift_remove(&key);
        entries.insert(
            key,
            CacheEntry {
                data,
                timestamp: Instant::now(),
            },
        );
        while entries.len() > self.capacity {
            if let Some((evicted, _)) = entries.shift_remove_index(0) {
                debug!(key = %evicted, "Evicting oldest cache entry");
            }
        }
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Removes every entry whose `url` key part contains `pattern`.
    ///
    /// Returns the number of removed entries.
    pub fn clear_matching(&self, pattern: &str) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|key, _| {
            !key.parts()
                .any(|part| part.key() == "url" && part.value().is_some_and(|v| v.contains(pattern)))
        });
        before - entries.len()
    }

    /// Number of stored entries, expired ones included until looked up.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Returns `true` if `key` is stored, without checking expiry.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.lock().contains_key(key)
    }

    fn lock(&self) -> MutexGuard<'_, IndexMap<CacheKey, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
