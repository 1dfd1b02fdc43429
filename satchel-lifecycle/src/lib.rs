//! Page-side lifecycle glue for the satchel offline cache layer.
//!
//! [`Lifecycle`] registers a [`CacheWorker`](satchel_worker::CacheWorker)
//! with its [`WorkerHost`](satchel_worker::WorkerHost) once per session and
//! reports what happens through a [`Notifier`](satchel_core::Notifier):
//!
//! - the app is ready for offline use once a worker takes control;
//! - an update is available when a newer worker has to wait;
//! - the network went away or came back.
//!
//! It also gives a settings page the cache controls: [`Lifecycle::status`],
//! [`Lifecycle::cache_stats`], [`Lifecycle::clear_cache`] and
//! [`Lifecycle::skip_waiting_and_reload`].

#![warn(missing_docs)]

mod error;
mod lifecycle;
mod stats;

pub use error::LifecycleError;
pub use lifecycle::{Lifecycle, ReloadHook};
pub use stats::{CacheStats, Status, format_size};
