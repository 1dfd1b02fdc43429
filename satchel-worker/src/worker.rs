//! The cache worker and its install/activate lifecycle.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use futures::future::try_join_all;
use http::{Request, Response};
use satchel_store::CacheStorage;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tower::{Service, ServiceExt};
use tracing::{debug, info, warn};

use crate::classify::store_key;
use crate::entry;
use crate::error::BoxError;
use crate::{WorkerConfig, WorkerError};

/// Lifecycle state of a [`CacheWorker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Created, not yet installing.
    Parsed,
    /// Precaching the manifest.
    Installing,
    /// Precached and waiting to be activated.
    Installed,
    /// Evicting stale generations.
    Activating,
    /// Serving requests.
    Activated,
    /// Failed to install or replaced by a newer worker.
    Redundant,
}

struct Shared {
    state: watch::Sender<WorkerState>,
    skip_waiting: watch::Sender<bool>,
}

/// Offline cache in front of an upstream HTTP service.
///
/// A worker owns one cache generation (the static and dynamic stores of
/// its configured version) inside a shared [`CacheStorage`]. It is driven
/// through its lifecycle by a [`WorkerHost`](crate::WorkerHost) and serves
/// requests as a [`tower::Service`].
///
/// Clones share the lifecycle state.
pub struct CacheWorker<S> {
    pub(crate) upstream: S,
    pub(crate) storage: Arc<dyn CacheStorage>,
    pub(crate) config: Arc<WorkerConfig>,
    shared: Arc<Shared>,
}

impl<S> CacheWorker<S> {
    /// Creates a worker in the [`WorkerState::Parsed`] state.
    pub fn new(upstream: S, storage: Arc<dyn CacheStorage>, config: Arc<WorkerConfig>) -> Self {
        let (state, _) = watch::channel(WorkerState::Parsed);
        let (skip_waiting, _) = watch::channel(false);
        CacheWorker {
            upstream,
            storage,
            config,
            shared: Arc::new(Shared {
                state,
                skip_waiting,
            }),
        }
    }

    /// Returns the worker configuration.
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Returns the shared cache storage.
    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> WorkerState {
        *self.shared.state.borrow()
    }

    /// Subscribes to lifecycle state changes.
    pub fn subscribe(&self) -> watch::Receiver<WorkerState> {
        self.shared.state.subscribe()
    }

    /// Asks the host to activate this worker without waiting for the
    /// current one to go away.
    pub fn skip_waiting(&self) {
        debug!(version = %self.config.version, "skip waiting requested");
        self.shared.skip_waiting.send_replace(true);
    }

    /// Returns `true` once [`skip_waiting`](Self::skip_waiting) was called.
    pub fn is_skip_waiting(&self) -> bool {
        *self.shared.skip_waiting.borrow()
    }

    /// Resolves once [`skip_waiting`](Self::skip_waiting) was called.
    pub async fn skip_waiting_requested(&self) {
        let mut receiver = self.shared.skip_waiting.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = receiver.wait_for(|requested| *requested).await;
    }

    /// Returns `true` if both handles refer to the same worker.
    pub fn same_worker(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    pub(crate) fn mark_redundant(&self) {
        self.set_state(WorkerState::Redundant);
    }

    fn set_state(&self, state: WorkerState) {
        debug!(version = %self.config.version, ?state, "worker state changed");
        self.shared.state.send_replace(state);
    }

    fn transition(
        &self,
        action: &'static str,
        from: WorkerState,
        to: WorkerState,
    ) -> Result<(), WorkerError> {
        let mut result = Ok(());
        self.shared.state.send_if_modified(|state| {
            if *state == from {
                *state = to;
                true
            } else {
                result = Err(WorkerError::InvalidState {
                    action,
                    state: *state,
                });
                false
            }
        });
        result
    }

    /// Deletes every store that does not belong to this worker's generation.
    ///
    /// Returns the names of the deleted stores.
    pub async fn activate(&self) -> Result<Vec<String>, WorkerError> {
        self.transition("activate", WorkerState::Installed, WorkerState::Activating)?;

        match self.evict_stale_generations().await {
            Ok(removed) => {
                self.set_state(WorkerState::Activated);
                info!(version = %self.config.version, ?removed, "worker activated");
                Ok(removed)
            }
            Err(err) => {
                warn!(version = %self.config.version, error = %err, "activation failed");
                self.set_state(WorkerState::Installed);
                Err(err)
            }
        }
    }

    async fn evict_stale_generations(&self) -> Result<Vec<String>, WorkerError> {
        let current = self.config.cache_names();
        let mut removed = Vec::new();
        for name in self.storage.names().await? {
            if current.contains(&name) {
                continue;
            }
            if self.storage.delete(&name).await? {
                removed.push(name);
            }
        }
        Ok(removed)
    }

    /// Deletes every store in the storage, including this generation's.
    pub async fn clear_all(&self) -> Result<usize, WorkerError> {
        let mut deleted = 0;
        for name in self.storage.names().await? {
            if self.storage.delete(&name).await? {
                deleted += 1;
            }
        }
        info!(deleted, "cleared every cache store");
        Ok(deleted)
    }

    /// Sum of the stored body sizes across every store.
    pub async fn cache_size(&self) -> Result<u64, WorkerError> {
        Ok(self.storage.total_size().await?)
    }
}

impl<S> CacheWorker<S>
where
    S: Service<Request<Bytes>, Response = Response<Bytes>> + Clone + Send + 'static,
    S::Error: Into<BoxError>,
    S::Future: Send,
{
    /// Precaches every manifest asset into the static store.
    ///
    /// All assets are fetched before anything is written. If any fetch
    /// fails, or answers with a non-2xx status, the static store is left
    /// untouched and the worker becomes [`WorkerState::Redundant`].
    pub async fn install(&self) -> Result<(), WorkerError> {
        self.transition("install", WorkerState::Parsed, WorkerState::Installing)?;

        match self.precache().await {
            Ok(count) => {
                self.set_state(WorkerState::Installed);
                info!(version = %self.config.version, assets = count, "worker installed");
                Ok(())
            }
            Err(err) => {
                warn!(version = %self.config.version, error = %err, "install failed");
                self.set_state(WorkerState::Redundant);
                Err(err)
            }
        }
    }

    async fn precache(&self) -> Result<usize, WorkerError> {
        let fetched = try_join_all(self.config.manifest.iter().map(|url| async move {
            let failed = |reason: String| WorkerError::InstallFailed {
                url: url.clone(),
                reason,
            };
            let request = Request::get(url.as_str())
                .body(Bytes::new())
                .map_err(|err| failed(err.to_string()))?;
            let key = store_key(&self.config, request.uri());
            let response = self
                .fetch(request)
                .await
                .map_err(|err| failed(err.to_string()))?;
            if !response.status().is_success() {
                return Err(failed(format!("status {}", response.status())));
            }
            Ok((key, response))
        }))
        .await?;

        let store = self.storage.open(&self.config.static_cache_name()).await?;
        for (key, response) in &fetched {
            let (data, metadata) = entry::encode(response);
            store.put(key, data, metadata).await?;
        }
        Ok(fetched.len())
    }

    pub(crate) async fn fetch(
        &self,
        request: Request<Bytes>,
    ) -> Result<Response<Bytes>, WorkerError> {
        self.upstream
            .clone()
            .oneshot(request)
            .await
            .map_err(WorkerError::upstream)
    }
}

impl<S: Clone> Clone for CacheWorker<S> {
    fn clone(&self) -> Self {
        CacheWorker {
            upstream: self.upstream.clone(),
            storage: Arc::clone(&self.storage),
            config: Arc::clone(&self.config),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S> fmt::Debug for CacheWorker<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheWorker")
            .field("version", &self.config.version)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
