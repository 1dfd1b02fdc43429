//! # satchel-reqwest
//!
//! [`Transport`] implementations backed by [`reqwest`].
//!
//! ```no_run
//! use satchel::{Client, ClientConfig};
//! use satchel_reqwest::ReqwestTransport;
//!
//! let config = ClientConfig::builder()
//!     .base_url("http://localhost:5000")
//!     .build()
//!     .unwrap();
//! let client = Client::new(ReqwestTransport::new(), config).unwrap();
//! # let _ = client;
//! ```
//!
//! [`MiddlewareTransport`] wraps a [`ClientWithMiddleware`], so existing
//! reqwest middleware stacks can sit below the request client.

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};
use satchel::{Transport, TransportError};
use tracing::trace;

pub use reqwest_middleware::ClientWithMiddleware;

/// Sends requests with a [`reqwest::Client`].
///
/// The client's own timeout, if any, is reported as
/// [`TransportError::Timeout`]. Redirects follow the reqwest client policy.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport with a default [`reqwest::Client`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the underlying client.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

impl From<reqwest::Client> for ReqwestTransport {
    fn from(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: Request<Bytes>) -> Result<Response<Bytes>, TransportError> {
        let request = reqwest::Request::try_from(request).map_err(TransportError::network)?;
        trace!(method = %request.method(), url = %request.url(), "Sending via reqwest");
        let response = self.client.execute(request).await.map_err(from_reqwest)?;
        into_http(response).await
    }
}

/// Sends requests through a reqwest middleware stack.
#[derive(Debug, Clone)]
pub struct MiddlewareTransport {
    client: ClientWithMiddleware,
}

impl MiddlewareTransport {
    /// Wraps `client`.
    pub fn new(client: ClientWithMiddleware) -> Self {
        Self { client }
    }
}

impl From<ClientWithMiddleware> for MiddlewareTransport {
    fn from(client: ClientWithMiddleware) -> Self {
        Self::new(client)
    }
}

#[async_trait]
impl Transport for MiddlewareTransport {
    async fn send(&self, request: Request<Bytes>) -> Result<Response<Bytes>, TransportError> {
        let request = reqwest::Request::try_from(request).map_err(TransportError::network)?;
        trace!(method = %request.method(), url = %request.url(), "Sending via reqwest middleware");
        let response = self.client.execute(request).await.map_err(|error| match error {
            reqwest_middleware::Error::Reqwest(error) => from_reqwest(error),
            other => TransportError::network(other),
        })?;
        into_http(response).await
    }
}

fn from_reqwest(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::network(error)
    }
}

/// Buffers the body and rebuilds the response as `http::Response<Bytes>`.
async fn into_http(response: reqwest::Response) -> Result<Response<Bytes>, TransportError> {
    let status = response.status();
    let version = response.version();
    let headers = response.headers().clone();
    let body = response.bytes().await.map_err(from_reqwest)?;

    let mut http_response = Response::new(body);
    *http_response.status_mut() = status;
    *http_response.version_mut() = version;
    *http_response.headers_mut() = headers;
    Ok(http_response)
}
