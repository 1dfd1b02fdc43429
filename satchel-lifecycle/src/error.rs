use satchel_worker::WorkerError;
use thiserror::Error;

/// Error type of lifecycle operations.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The environment cannot host a cache worker.
    #[error("offline caching is not supported in this environment")]
    NotSupported,

    /// A worker was already registered in this session.
    #[error("a cache worker is already registered")]
    AlreadyRegistered,

    /// No worker was registered yet.
    #[error("no cache worker is registered")]
    NotRegistered,

    /// No worker is in control.
    #[error("no active cache worker")]
    NoActiveWorker,

    /// The worker reported a failure to clear its stores.
    #[error("failed to clear caches: {0}")]
    ClearFailed(String),

    /// The worker answered a control message with the wrong reply.
    #[error("unexpected reply to {0}")]
    UnexpectedReply(&'static str),

    /// The worker itself failed.
    #[error(transparent)]
    Worker(#[from] WorkerError),
}
