//! Error types for store operations.

use thiserror::Error;

/// Error type for store operations.
///
/// Categorizes failures of a cache store the same way regardless of what
/// backs it (process memory, disk, a browser-provided cache).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Internal store error, state or computation error.
    ///
    /// Any error not related to I/O with an external store.
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),

    /// I/O error while talking to an external store.
    #[error(transparent)]
    Connection(Box<dyn std::error::Error + Send + Sync>),

    /// The named store does not exist and was not created.
    #[error("cache store `{0}` does not exist")]
    MissingStore(String),
}

impl StoreError {
    /// Wraps an arbitrary error as an internal store error.
    pub fn internal<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        StoreError::Internal(Box::new(error))
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
