//! Traits and structs for satchel store interaction.
//!
//! The offline cache layer never talks to a concrete cache. It goes through
//! two small traits:
//!
//! - [`Store`]: one named key/value byte store (`put`, `get`, `delete`, `keys`);
//! - [`CacheStorage`]: the registry of named stores (`open`, `has`, `delete`, `names`).
//!
//! [`MemoryStorage`] is the in-memory implementation used by default and in tests.
//! If you want to back the offline cache with something else, implement these two
//! traits.
mod entry;
mod error;
mod memory;
mod store;

pub use entry::{DeleteStatus, Metadata, StoredEntry};
pub use error::{StoreError, StoreResult};
pub use memory::{MemoryStorage, MemoryStore};
pub use store::{CacheStorage, Store};
