//! Per-call request options.

use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::Serialize;

use crate::{RequestError, ResponseData};

/// Body of an outgoing request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// JSON document, sent with `Content-Type: application/json`.
    Json(serde_json::Value),
    /// Plain text.
    Text(String),
    /// Raw bytes.
    Bytes(Bytes),
}

impl RequestBody {
    /// Serializes any `T` into a JSON body.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, RequestError> {
        serde_json::to_value(value)
            .map(RequestBody::Json)
            .map_err(|error| RequestError::InvalidRequest(error.to_string()))
    }

    pub(crate) fn to_bytes(&self) -> Bytes {
        match self {
            // Serializing a `Value` cannot fail.
            RequestBody::Json(value) => Bytes::from(value.to_string()),
            RequestBody::Text(text) => Bytes::from(text.clone()),
            RequestBody::Bytes(bytes) => bytes.clone(),
        }
    }

    pub(crate) fn content_type(&self) -> Option<HeaderValue> {
        match self {
            RequestBody::Json(_) => Some(HeaderValue::from_static("application/json")),
            RequestBody::Text(_) => Some(HeaderValue::from_static("text/plain; charset=utf-8")),
            RequestBody::Bytes(_) => None,
        }
    }
}

impl From<serde_json::Value> for RequestBody {
    fn from(value: serde_json::Value) -> Self {
        RequestBody::Json(value)
    }
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self {
        RequestBody::Text(text)
    }
}

impl From<&str> for RequestBody {
    fn from(text: &str) -> Self {
        RequestBody::Text(text.to_owned())
    }
}

impl From<Bytes> for RequestBody {
    fn from(bytes: Bytes) -> Self {
        RequestBody::Bytes(bytes)
    }
}

/// Options of a single request.
///
/// ```
/// use std::time::Duration;
/// use satchel::RequestOptions;
///
/// let options = RequestOptions::new()
///     .query("chapter", "3")
///     .timeout(Duration::from_secs(30))
///     .no_cache();
/// assert!(options.is_no_cache());
/// ```
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub(crate) method: Method,
    pub(crate) headers: HeaderMap,
    pub(crate) query: Vec<(String, String)>,
    pub(crate) body: Option<RequestBody>,
    pub(crate) no_cache: bool,
    pub(crate) timeout: Option<Duration>,
    pub(crate) retry_attempts: Option<u32>,
    pub(crate) silent: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: HeaderMap::new(),
            query: Vec::new(),
            body: None,
            no_cache: false,
            timeout: None,
            retry_attempts: None,
            silent: false,
        }
    }
}

impl RequestOptions {
    /// Options for a plain GET.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the HTTP method.
    pub fn method(self, method: Method) -> Self {
        Self { method, ..self }
    }

    /// Add a request header.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Add a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Set the request body.
    pub fn body(self, body: impl Into<RequestBody>) -> Self {
        Self {
            body: Some(body.into()),
            ..self
        }
    }

    /// Bypass the response cache for this call.
    pub fn no_cache(self) -> Self {
        Self {
            no_cache: true,
            ..self
        }
    }

    /// Override the per-attempt timeout.
    pub fn timeout(self, timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..self
        }
    }

    /// Override the retry budget.
    pub fn retry_attempts(self, attempts: u32) -> Self {
        Self {
            retry_attempts: Some(attempts),
            ..self
        }
    }

    /// Do not route failures of this call to error handlers.
    ///
    /// Failures are still logged and still returned.
    pub fn silent(self) -> Self {
        Self {
            silent: true,
            ..self
        }
    }

    /// Returns the HTTP method.
    pub fn get_method(&self) -> &Method {
        &self.method
    }

    /// Returns `true` if the cache is bypassed.
    pub fn is_no_cache(&self) -> bool {
        self.no_cache
    }
}

/// One item of a [`Client::batch`](crate::Client::batch) call.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    /// Request URL.
    pub url: String,
    /// Request options.
    pub options: RequestOptions,
}

impl BatchRequest {
    /// Creates a batch item.
    pub fn new(url: impl Into<String>, options: RequestOptions) -> Self {
        Self {
            url: url.into(),
            options,
        }
    }

    /// Creates a GET batch item.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(url, RequestOptions::new())
    }
}

/// Outcome of one batch item, paired with the request that produced it.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// The originating request.
    pub request: BatchRequest,
    /// Its result.
    pub result: Result<ResponseData, RequestError>,
}

impl BatchOutcome {
    /// Returns `true` if the item succeeded.
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}
