//! Caching strategies applied per resource class.

use std::fmt;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Method, Request, Response, StatusCode, Uri};
use satchel_core::{is_cacheable, is_cacheable_method};
use tower::Service;
use tracing::{debug, warn};

use crate::classify::{ResourceClass, classify, is_navigation, store_key};
use crate::entry;
use crate::error::BoxError;
use crate::{CacheWorker, WorkerConfig, WorkerError};

/// Response header telling where a response came from.
pub const SOURCE_HEADER: &str = "x-satchel-source";

/// Where a response served by a [`CacheWorker`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Fetched from the upstream service.
    Network,
    /// Read from a cache store.
    Cache,
    /// Synthesized because both network and cache failed.
    Offline,
}

impl Source {
    /// Header value of this source.
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Network => "network",
            Source::Cache => "cache",
            Source::Offline => "offline",
        }
    }

    /// Reads the source back from a response header.
    pub fn of<B>(response: &Response<B>) -> Option<Source> {
        match response.headers().get(SOURCE_HEADER)?.to_str().ok()? {
            "network" => Some(Source::Network),
            "cache" => Some(Source::Cache),
            "offline" => Some(Source::Offline),
            _ => None,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn tagged(mut response: Response<Bytes>, source: Source) -> Response<Bytes> {
    response
        .headers_mut()
        .insert(SOURCE_HEADER, HeaderValue::from_static(source.as_str()));
    response
}

fn offline_response(status: StatusCode, content_type: &'static str, body: Bytes) -> Response<Bytes> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    tagged(response, Source::Offline)
}

/// What to remember about a request after handing it to the upstream.
struct Intercepted {
    method: Method,
    key: String,
    navigation: bool,
}

impl Intercepted {
    fn of(config: &WorkerConfig, request: &Request<Bytes>) -> Self {
        Intercepted {
            method: request.method().clone(),
            key: store_key(config, request.uri()),
            navigation: is_navigation(request),
        }
    }

    fn is_get(&self) -> bool {
        is_cacheable_method(&self.method)
    }
}

impl<S> CacheWorker<S>
where
    S: Service<Request<Bytes>, Response = Response<Bytes>> + Clone + Send + 'static,
    S::Error: Into<BoxError>,
    S::Future: Send,
{
    /// Serves `request` with the strategy of its resource class.
    ///
    /// Every response carries the [`SOURCE_HEADER`].
    pub async fn handle(&self, request: Request<Bytes>) -> Result<Response<Bytes>, WorkerError> {
        let class = classify(&self.config, &request);
        debug!(uri = %request.uri(), ?class, "intercepted request");
        match class {
            ResourceClass::StaticAsset => self.cache_first(request, true).await,
            ResourceClass::ApiCall => self.network_first_with_fallback(request).await,
            ResourceClass::PageNavigation => self.network_first(request).await,
            ResourceClass::Other => self.cache_first(request, false).await,
        }
    }

    /// Static store, then dynamic store, then network.
    ///
    /// With `offline_page`, a failed navigation is answered with the cached
    /// offline page or a plain-text 503.
    pub async fn cache_first(
        &self,
        request: Request<Bytes>,
        offline_page: bool,
    ) -> Result<Response<Bytes>, WorkerError> {
        let intercepted = Intercepted::of(&self.config, &request);
        if intercepted.is_get()
            && let Some(cached) = self.lookup_or_miss(&intercepted.key).await
        {
            return Ok(tagged(cached, Source::Cache));
        }

        match self.fetch(request).await {
            Ok(response) => {
                self.remember(&intercepted, &response).await;
                Ok(tagged(response, Source::Network))
            }
            Err(err) if offline_page && intercepted.navigation => {
                warn!(uri = %intercepted.key, error = %err, "navigation failed, serving offline page");
                let offline_page = self.offline_page_key();
                match self.lookup_or_miss(&offline_page).await {
                    Some(page) => Ok(tagged(page, Source::Offline)),
                    None => Ok(offline_response(
                        StatusCode::SERVICE_UNAVAILABLE,
                        "text/plain",
                        Bytes::from_static(b"Offline"),
                    )),
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Network, then cache.
    pub async fn network_first(
        &self,
        request: Request<Bytes>,
    ) -> Result<Response<Bytes>, WorkerError> {
        let intercepted = Intercepted::of(&self.config, &request);
        match self.fetch(request).await {
            Ok(response) => {
                self.remember(&intercepted, &response).await;
                Ok(tagged(response, Source::Network))
            }
            Err(err) => {
                if intercepted.is_get()
                    && let Some(cached) = self.lookup_or_miss(&intercepted.key).await
                {
                    debug!(uri = %intercepted.key, error = %err, "network failed, serving cached copy");
                    return Ok(tagged(cached, Source::Cache));
                }
                Err(err)
            }
        }
    }

    /// Network under the API timeout, then cache, then a synthesized
    /// `503` JSON body with `"offline": true`.
    pub async fn network_first_with_fallback(
        &self,
        request: Request<Bytes>,
    ) -> Result<Response<Bytes>, WorkerError> {
        let intercepted = Intercepted::of(&self.config, &request);
        let outcome = match tokio::time::timeout(self.config.api_timeout, self.fetch(request)).await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(WorkerError::Timeout),
        };

        let err = match outcome {
            Ok(response) => {
                self.remember(&intercepted, &response).await;
                return Ok(tagged(response, Source::Network));
            }
            Err(err) => err,
        };

        if intercepted.is_get()
            && let Some(cached) = self.lookup_or_miss(&intercepted.key).await
        {
            debug!(uri = %intercepted.key, error = %err, "api unreachable, serving cached copy");
            return Ok(tagged(cached, Source::Cache));
        }

        warn!(uri = %intercepted.key, error = %err, "api unreachable, answering offline");
        let body = serde_json::json!({
            "error": "Network unavailable",
            "offline": true,
        });
        Ok(offline_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "application/json",
            Bytes::from(body.to_string()),
        ))
    }

    /// Like [`lookup`](Self::lookup), but a failed read counts as a miss.
    async fn lookup_or_miss(&self, key: &str) -> Option<Response<Bytes>> {
        match self.lookup(key).await {
            Ok(found) => found,
            Err(err) => {
                warn!(uri = %key, error = %err, "cache lookup failed");
                None
            }
        }
    }

    fn offline_page_key(&self) -> String {
        match self.config.offline_page.parse::<Uri>() {
            Ok(uri) => store_key(&self.config, &uri),
            Err(_) => self.config.offline_page.clone(),
        }
    }

    async fn lookup(&self, key: &str) -> Result<Option<Response<Bytes>>, WorkerError> {
        for name in self.config.cache_names() {
            // Avoid creating a store as a side effect of a read.
            if !self.storage.has(&name).await? {
                continue;
            }
            let store = self.storage.open(&name).await?;
            if let Some(stored) = store.get(key).await? {
                return entry::decode(key, stored).map(Some);
            }
        }
        Ok(None)
    }

    /// Stores a copy of a cacheable response in the dynamic store.
    ///
    /// Storage failures are logged and do not fail the request.
    async fn remember(&self, intercepted: &Intercepted, response: &Response<Bytes>) {
        if !is_cacheable(&intercepted.method, response.status()) {
            return;
        }
        let (data, metadata) = entry::encode(response);
        let stored = async {
            let store = self.storage.open(&self.config.dynamic_cache_name()).await?;
            store.put(&intercepted.key, data, metadata).await
        };
        if let Err(err) = stored.await {
            warn!(uri = %intercepted.key, error = %err, "failed to store response copy");
        }
    }
}
