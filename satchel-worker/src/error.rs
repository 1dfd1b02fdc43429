//! Error types of the offline cache layer.

use satchel_store::StoreError;
use thiserror::Error;

use crate::WorkerState;

/// Boxed error type used for opaque upstream failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error type for the offline cache layer.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The upstream service failed before producing a response.
    #[error("upstream error: {0}")]
    Upstream(BoxError),

    /// The upstream service did not answer within the API timeout.
    #[error("upstream timed out")]
    Timeout,

    /// A cache store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A manifest asset could not be fetched, so the install was abandoned.
    #[error("install failed: could not fetch {url}: {reason}")]
    InstallFailed {
        /// The asset that failed.
        url: String,
        /// Why it failed.
        reason: String,
    },

    /// A stored entry could not be turned back into a response.
    #[error("corrupt cache entry {key}: {reason}")]
    CorruptEntry {
        /// Store key of the entry.
        key: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A lifecycle transition was requested from the wrong state.
    #[error("cannot {action} a worker in state {state:?}")]
    InvalidState {
        /// The attempted transition.
        action: &'static str,
        /// The state the worker was in.
        state: WorkerState,
    },

    /// The control channel is closed.
    #[error("control channel closed")]
    ChannelClosed,
}

impl WorkerError {
    pub(crate) fn upstream<E>(error: E) -> Self
    where
        E: Into<BoxError>,
    {
        WorkerError::Upstream(error.into())
    }
}
