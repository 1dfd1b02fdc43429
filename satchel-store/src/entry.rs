//! Stored value with metadata.

use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Free-form string metadata stored next to a value.
///
/// Stores treat it as opaque. The offline cache layer keeps response status
/// and headers here.
pub type Metadata = BTreeMap<String, String>;

/// A value stored in a [`Store`](crate::Store) together with its metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEntry {
    data: Bytes,
    metadata: Metadata,
    stored_at: DateTime<Utc>,
}

impl StoredEntry {
    /// Creates an entry captured now.
    pub fn new(data: Bytes, metadata: Metadata) -> Self {
        Self::with_timestamp(data, metadata, Utc::now())
    }

    /// Creates an entry with an explicit capture timestamp.
    pub fn with_timestamp(data: Bytes, metadata: Metadata, stored_at: DateTime<Utc>) -> Self {
        StoredEntry {
            data,
            metadata,
            stored_at,
        }
    }

    /// Returns the stored bytes.
    #[inline]
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Returns the stored metadata.
    #[inline]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Returns the metadata value for `key`, if present.
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// Returns when the entry was stored.
    #[inline]
    pub fn stored_at(&self) -> DateTime<Utc> {
        self.stored_at
    }

    /// Size of the stored blob in bytes. Metadata is not counted.
    #[inline]
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Consumes the entry and returns its data and metadata.
    pub fn into_parts(self) -> (Bytes, Metadata) {
        (self.data, self.metadata)
    }
}

/// Status of a delete operation.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum DeleteStatus {
    /// Record successfully deleted.
    Deleted,
    /// Record already missing.
    Missing,
}

impl DeleteStatus {
    /// Returns `true` if something was deleted.
    pub fn is_deleted(&self) -> bool {
        matches!(self, DeleteStatus::Deleted)
    }
}
