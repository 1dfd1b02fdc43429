//! Requests resolved against the client configuration.

use std::time::Duration;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, Method, Request};
use satchel_core::{CacheKey, KeyPart, is_cacheable_method};
use sha2::{Digest, Sha256};

use crate::{ClientConfig, RequestError, RequestOptions};

/// A request with every option resolved, ready to be sent any number of times.
#[derive(Debug, Clone)]
pub(crate) struct PreparedRequest {
    pub(crate) method: Method,
    /// Full URL including the serialized query.
    pub(crate) url: String,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
    pub(crate) timeout: Duration,
    pub(crate) retry_attempts: u32,
    /// Eligible for the response cache (GET without `no_cache`).
    pub(crate) cacheable: bool,
    pub(crate) silent: bool,
    /// Method, URL and query. Addresses the response cache.
    pub(crate) cache_key: CacheKey,
    /// Cache key parts plus body digest and silence. Addresses in-flight
    /// requests.
    pub(crate) request_key: CacheKey,
}

impl PreparedRequest {
    pub(crate) fn new(
        config: &ClientConfig,
        url: &str,
        options: RequestOptions,
    ) -> Result<Self, RequestError> {
        let base = resolve_url(&config.base_url, url);
        let query = serde_urlencoded::to_string(&options.query)
            .map_err(|error| RequestError::InvalidRequest(error.to_string()))?;

        let full_url = if query.is_empty() {
            base.clone()
        } else if base.contains('?') {
            format!("{base}&{query}")
        } else {
            format!("{base}?{query}")
        };

        let mut headers = options.headers;
        let body = match &options.body {
            Some(body) => {
                if let Some(content_type) = body.content_type() {
                    headers.entry(CONTENT_TYPE).or_insert(content_type);
                }
                body.to_bytes()
            }
            None => Bytes::new(),
        };

        let cache_key = CacheKey::new(
            "cache",
            vec![
                KeyPart::new("method", Some(options.method.as_str())),
                KeyPart::new("url", Some(&base)),
                KeyPart::new("query", Some(&query)),
            ],
        );
        let mut extra = vec![KeyPart::new("body", Some(body_digest(&body)))];
        // A silent call must not swallow the handlers of a loud one.
        if options.silent {
            extra.push(KeyPart::new("silent", None::<&str>));
        }
        let request_key = cache_key.extend("request", extra);

        Ok(PreparedRequest {
            cacheable: is_cacheable_method(&options.method) && !options.no_cache,
            method: options.method,
            url: full_url,
            headers,
            body,
            timeout: options.timeout.unwrap_or(config.timeout),
            retry_attempts: options.retry_attempts.unwrap_or(config.retry_attempts),
            silent: options.silent,
            cache_key,
            request_key,
        })
    }

    /// Builds a fresh `http::Request` for one attempt.
    pub(crate) fn to_http(&self) -> Result<Request<Bytes>, RequestError> {
        let mut builder = Request::builder()
            .method(self.method.clone())
            .uri(self.url.as_str());
        if let Some(headers) = builder.headers_mut() {
            headers.extend(self.headers.clone());
        }
        builder
            .body(self.body.clone())
            .map_err(|error| RequestError::InvalidRequest(error.to_string()))
    }
}

/// Hex SHA-256 of the exact body bytes.
fn body_digest(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

/// Prefixes relative URLs with `base`. Absolute URLs are kept as is.
fn resolve_url(base: &str, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") || base.is_empty() {
        url.to_owned()
    } else {
        format!("{base}{url}")
    }
}
