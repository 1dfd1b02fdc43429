//! The request client.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::FutureExt;
use futures::future::join_all;
use http::{Method, StatusCode};
use satchel_core::{Notifier, is_cacheable};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::time::Instant;
use tracing::{Instrument, debug, debug_span};

use crate::cache::ResponseCache;
use crate::concurrency::{AdmissionQueue, SingleFlight};
use crate::handlers::{ErrorHandlers, notifying_handler};
use crate::metrics::{PerformanceMetrics, QueueGauges};
use crate::request::PreparedRequest;
use crate::retry::RetryPolicy;
use crate::{
    BatchOutcome, BatchRequest, ClientConfig, ConfigError, ErrorCategory, MetricsSnapshot,
    RequestBody, RequestError, RequestOptions, ResponseData, Transport,
};

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Caching, de-duplicating, concurrency-limited HTTP client with retry.
///
/// Cloning is cheap: clones share the cache, the in-flight map, the admission
/// queue, the handlers and the counters.
///
/// ```no_run
/// # async fn run(transport: impl satchel::Transport) -> Result<(), Box<dyn std::error::Error>> {
/// use satchel::{Client, ClientConfig, RequestOptions};
///
/// let client = Client::new(transport, ClientConfig::builder().base_url("http://localhost:5000").build()?)?;
/// let chapters = client.get("/api/chapters", RequestOptions::new()).await?;
/// # let _ = chapters;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
    cache: ResponseCache,
    inflight: SingleFlight,
    admission: AdmissionQueue,
    handlers: ErrorHandlers,
    metrics: PerformanceMetrics,
}

impl Client {
    /// Creates a client sending through `transport`.
    ///
    /// Fails if `config` does not validate.
    pub fn new<T>(transport: T, config: ClientConfig) -> Result<Self, ConfigError>
    where
        T: Transport,
    {
        Self::from_arc(Arc::new(transport), config)
    }

    /// Creates a new [`ClientBuilder`].
    pub fn builder() -> ClientBuilder<NotSet> {
        ClientBuilder::new()
    }

    fn from_arc(transport: Arc<dyn Transport>, config: ClientConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Client {
            inner: Arc::new(ClientInner {
                transport,
                cache: ResponseCache::new(config.cache_timeout, config.cache_capacity),
                inflight: SingleFlight::new(),
                admission: AdmissionQueue::new(config.max_concurrent_requests),
                handlers: ErrorHandlers::default(),
                metrics: PerformanceMetrics::default(),
                config,
            }),
        })
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Performs a request.
    ///
    /// A cacheable GET is answered from the cache while its entry is fresh.
    /// Otherwise the call joins an identical in-flight request, or waits for a
    /// concurrency slot and goes to the network with timeout and retry.
    pub async fn request(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> Result<ResponseData, RequestError> {
        self.inner.metrics.record_request();
        let request = PreparedRequest::new(&self.inner.config, url, options)?;

        if request.cacheable
            && let Some(data) = self.inner.cache.get(&request.cache_key)
        {
            debug!(method = %request.method, url = %request.url, "Serving response from cache");
            self.inner.metrics.record_cache_hit();
            return Ok(data);
        }

        let key = request.request_key.clone();
        let inner = self.inner.clone();
        let flight = self
            .inner
            .inflight
            .join_or_lead(&key, move || inner.execute(request).boxed());
        if flight.joined {
            debug!(%key, "Joined in-flight request");
            self.inner.metrics.record_joined();
        }
        flight.shared.await
    }

    /// Performs a GET.
    pub async fn get(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> Result<ResponseData, RequestError> {
        self.request(url, options.method(Method::GET)).await
    }

    /// Performs a POST with `body`.
    pub async fn post(
        &self,
        url: &str,
        body: impl Into<RequestBody>,
        options: RequestOptions,
    ) -> Result<ResponseData, RequestError> {
        self.request(url, options.method(Method::POST).body(body)).await
    }

    /// Performs a PUT with `body`.
    pub async fn put(
        &self,
        url: &str,
        body: impl Into<RequestBody>,
        options: RequestOptions,
    ) -> Result<ResponseData, RequestError> {
        self.request(url, options.method(Method::PUT).body(body)).await
    }

    /// Performs a DELETE.
    pub async fn delete(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> Result<ResponseData, RequestError> {
        self.request(url, options.method(Method::DELETE)).await
    }

    /// Performs a GET and deserializes the payload into `T`.
    pub async fn get_json<T>(&self, url: &str, options: RequestOptions) -> Result<T, RequestError>
    where
        T: DeserializeOwned,
    {
        let data = self.get(url, options).await?;
        deserialize(url, data)
    }

    /// Performs a POST with `body` serialized as JSON and deserializes the payload into `T`.
    pub async fn post_json<B, T>(
        &self,
        url: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<T, RequestError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let data = self.post(url, RequestBody::json(body)?, options).await?;
        deserialize(url, data)
    }

    /// Runs every request concurrently.
    ///
    /// Never fails as a whole: each outcome is reported next to its request,
    /// in input order.
    pub async fn batch(&self, requests: Vec<BatchRequest>) -> Vec<BatchOutcome> {
        join_all(requests.into_iter().map(|request| async move {
            let result = self.request(&request.url, request.options.clone()).await;
            BatchOutcome { request, result }
        }))
        .await
    }

    /// Registers `handler` for failures of `category`, replacing any previous one.
    pub fn on_error<F>(&self, category: ErrorCategory, handler: F)
    where
        F: Fn(&RequestError) + Send + Sync + 'static,
    {
        self.inner.handlers.insert(category, Arc::new(handler));
    }

    /// Registers handlers that report every failure category through `notifier`.
    pub fn notify_errors<N>(&self, notifier: Arc<N>)
    where
        N: Notifier + ?Sized + 'static,
    {
        for category in ErrorCategory::ALL {
            self.inner
                .handlers
                .insert(category, notifying_handler(category, notifier.clone()));
        }
    }

    /// Drops every cached response.
    pub fn clear_cache(&self) {
        self.inner.cache.clear();
        debug!("Response cache cleared");
    }

    /// Drops cached responses whose URL contains `pattern`.
    ///
    /// Returns the number of dropped entries.
    pub fn clear_cache_matching(&self, pattern: &str) -> usize {
        let removed = self.inner.cache.clear_matching(pattern);
        debug!(pattern, removed, "Response cache entries cleared");
        removed
    }

    /// Returns a snapshot of the performance counters.
    pub fn performance_metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot(QueueGauges {
            cache_size: self.inner.cache.len(),
            pending_requests: self.inner.inflight.len(),
            active_requests: self.inner.admission.active(),
            queued_requests: self.inner.admission.queued(),
        })
    }

    /// Probes the health endpoint.
    ///
    /// Uncached, unretried, silent and bounded by a five second timeout.
    pub async fn health_check(&self) -> bool {
        let options = RequestOptions::new()
            .no_cache()
            .timeout(HEALTH_CHECK_TIMEOUT)
            .retry_attempts(0)
            .silent();
        let path = self.inner.config.health_path.clone();
        match self.get(&path, options).await {
            Ok(_) => true,
            Err(error) => {
                debug!(%error, "Health check failed");
                false
            }
        }
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.inner.config)
            .field("cache_size", &self.inner.cache.len())
            .field("inflight", &self.inner.inflight)
            .field("handlers", &self.inner.handlers)
            .finish_non_exhaustive()
    }
}

impl ClientInner {
    /// One de-duplicated execution: admission, attempts, then bookkeeping.
    async fn execute(
        self: Arc<Self>,
        request: PreparedRequest,
    ) -> Result<ResponseData, RequestError> {
        let span = debug_span!(
            "satchel.request",
            method = %request.method,
            url = %request.url,
        );
        async move {
            // Held until this execution settles, retries included.
            let _permit = self.admission.acquire().await?;
            let started = Instant::now();
            let result = self.send_with_retry(&request).await;
            self.metrics.record_outcome(
                result.as_ref().err().map(RequestError::category),
                started.elapsed(),
            );

            match result {
                Ok((status, data)) => {
                    if request.cacheable && is_cacheable(&request.method, status) {
                        self.cache.insert(request.cache_key.clone(), data.clone());
                    }
                    Ok(data)
                }
                Err(error) => {
                    if request.silent {
                        debug!(category = %error.category(), %error, "Request failed");
                    } else {
                        self.handlers.dispatch(&error);
                    }
                    Err(error)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn send_with_retry(
        &self,
        request: &PreparedRequest,
    ) -> Result<(StatusCode, ResponseData), RequestError> {
        let policy = RetryPolicy::new(self.config.retry_delay, request.retry_attempts);
        let mut attempt = 0;
        loop {
            let error = match self.attempt(request).await {
                Ok(response) => return Ok(response),
                Err(error) => error,
            };
            if !error.is_retryable() {
                return Err(error);
            }
            let Some(delay) = policy.backoff(attempt) else {
                return Err(error);
            };
            debug!(attempt, ?delay, %error, "Retrying request");
            self.metrics.record_retry();
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn attempt(
        &self,
        request: &PreparedRequest,
    ) -> Result<(StatusCode, ResponseData), RequestError> {
        let http_request = request.to_http()?;
        // Dropping the send future on timeout cancels the attempt.
        let response =
            match tokio::time::timeout(request.timeout, self.transport.send(http_request)).await {
                Ok(Ok(response)) => response,
                Ok(Err(error)) => return Err(RequestError::from_transport(&request.url, error)),
                Err(_elapsed) => {
                    return Err(RequestError::Timeout {
                        url: request.url.clone(),
                        timeout: request.timeout,
                    });
                }
            };

        let (parts, body): (_, Bytes) = response.into_parts();
        if !parts.status.is_success() {
            return Err(RequestError::Status {
                url: request.url.clone(),
                status: parts.status,
                body,
            });
        }
        let data = ResponseData::decode(&request.url, &parts.headers, &body)?;
        Ok((parts.status, data))
    }
}

fn deserialize<T: DeserializeOwned>(url: &str, data: ResponseData) -> Result<T, RequestError> {
    data.deserialize().map_err(|error| RequestError::Decode {
        url: url.to_owned(),
        message: error.to_string(),
    })
}

/// Marker type for unset builder fields.
///
/// When you see `NotSet` in a compiler error, it means
/// [`ClientBuilder::transport`] has not been called yet.
pub struct NotSet;

/// Builder for [`Client`].
///
/// Use [`Client::builder()`] to create a new builder.
pub struct ClientBuilder<T> {
    transport: T,
    config: ClientConfig,
    handlers: Vec<(ErrorCategory, crate::ErrorHandler)>,
}

impl ClientBuilder<NotSet> {
    /// Creates a builder with default configuration and no transport.
    pub fn new() -> Self {
        Self {
            transport: NotSet,
            config: ClientConfig::default(),
            handlers: Vec::new(),
        }
    }
}

impl Default for ClientBuilder<NotSet> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ClientBuilder<T> {
    /// Sets the transport.
    pub fn transport<NewT>(self, transport: NewT) -> ClientBuilder<NewT>
    where
        NewT: Transport,
    {
        ClientBuilder {
            transport,
            config: self.config,
            handlers: self.handlers,
        }
    }

    /// Sets the configuration.
    pub fn config(self, config: ClientConfig) -> Self {
        Self { config, ..self }
    }

    /// Registers an error handler.
    pub fn on_error<F>(mut self, category: ErrorCategory, handler: F) -> Self
    where
        F: Fn(&RequestError) + Send + Sync + 'static,
    {
        self.handlers.push((category, Arc::new(handler)));
        self
    }
}

impl<T> ClientBuilder<T>
where
    T: Transport,
{
    /// Builds the [`Client`].
    pub fn build(self) -> Result<Client, ConfigError> {
        let client = Client::new(self.transport, self.config)?;
        for (category, handler) in self.handlers {
            client.inner.handlers.insert(category, handler);
        }
        Ok(client)
    }
}
