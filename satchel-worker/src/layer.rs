use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::FutureExt;
use futures::future::BoxFuture;
use http::{Request, Response};
use satchel_store::{CacheStorage, MemoryStorage};
use tower::{Layer, Service};

use crate::error::BoxError;
use crate::{CacheWorker, WorkerConfig, WorkerError};

/// Tower [`Layer`] wrapping a service in a [`CacheWorker`].
///
/// Every worker produced by one layer shares its storage and configuration.
#[derive(Clone)]
pub struct OfflineCacheLayer {
    storage: Arc<dyn CacheStorage>,
    config: Arc<WorkerConfig>,
}

impl OfflineCacheLayer {
    /// Creates a layer backed by `storage`.
    pub fn new(storage: Arc<dyn CacheStorage>, config: WorkerConfig) -> Self {
        OfflineCacheLayer {
            storage,
            config: Arc::new(config),
        }
    }

    /// Starts building a layer.
    pub fn builder() -> OfflineCacheLayerBuilder {
        OfflineCacheLayerBuilder::default()
    }
}

impl<S> Layer<S> for OfflineCacheLayer {
    type Service = CacheWorker<S>;

    fn layer(&self, upstream: S) -> Self::Service {
        CacheWorker::new(upstream, Arc::clone(&self.storage), Arc::clone(&self.config))
    }
}

impl std::fmt::Debug for OfflineCacheLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineCacheLayer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Builder for [`OfflineCacheLayer`].
///
/// Without an explicit storage, a fresh [`MemoryStorage`] is used.
#[derive(Default)]
pub struct OfflineCacheLayerBuilder {
    storage: Option<Arc<dyn CacheStorage>>,
    config: WorkerConfig,
}

impl OfflineCacheLayerBuilder {
    /// Sets the cache storage shared by every produced worker.
    pub fn storage<C: CacheStorage + 'static>(self, storage: C) -> Self {
        OfflineCacheLayerBuilder {
            storage: Some(Arc::new(storage)),
            ..self
        }
    }

    /// Sets the worker configuration.
    pub fn config(self, config: WorkerConfig) -> Self {
        OfflineCacheLayerBuilder { config, ..self }
    }

    /// Builds the layer.
    pub fn build(self) -> OfflineCacheLayer {
        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(MemoryStorage::new()));
        OfflineCacheLayer::new(storage, self.config)
    }
}

impl<S> Service<Request<Bytes>> for CacheWorker<S>
where
    S: Service<Request<Bytes>, Response = Response<Bytes>> + Clone + Send + Sync + 'static,
    S::Error: Into<BoxError>,
    S::Future: Send,
{
    type Response = Response<Bytes>;
    type Error = WorkerError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // The upstream is driven through `oneshot` on a clone.
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Bytes>) -> Self::Future {
        let worker = self.clone();
        async move { worker.handle(request).await }.boxed()
    }
}
