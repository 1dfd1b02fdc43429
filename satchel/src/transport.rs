//! The seam between the client and whatever moves bytes over the wire.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};
use tower::{Service, ServiceExt};

use crate::error::{BoxError, TransportError};

/// Sends one HTTP request and returns the complete response.
///
/// Implementations must not retry, cache or time out on their own behalf;
/// the [`Client`](crate::Client) does all of that. A transport that does give
/// up waiting should report [`TransportError::Timeout`].
///
/// Any non-2xx response is still a successful `send`.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Performs the request.
    async fn send(&self, request: Request<Bytes>) -> Result<Response<Bytes>, TransportError>;
}

#[async_trait]
impl<T> Transport for Arc<T>
where
    T: Transport + ?Sized,
{
    async fn send(&self, request: Request<Bytes>) -> Result<Response<Bytes>, TransportError> {
        self.as_ref().send(request).await
    }
}

#[async_trait]
impl<T> Transport for Box<T>
where
    T: Transport + ?Sized,
{
    async fn send(&self, request: Request<Bytes>) -> Result<Response<Bytes>, TransportError> {
        self.as_ref().send(request).await
    }
}

/// Adapts any Tower [`Service`] to a [`Transport`].
///
/// Each call clones the service and drives the clone to readiness, so the
/// wrapped service should be cheap to clone (a `Buffer`, a client handle, or
/// a stateless function).
///
/// ```
/// use bytes::Bytes;
/// use http::{Request, Response};
/// use satchel::ServiceTransport;
///
/// let transport = ServiceTransport::new(tower::service_fn(|_req: Request<Bytes>| async {
///     Ok::<_, std::convert::Infallible>(Response::new(Bytes::from_static(b"pong")))
/// }));
/// # let _ = transport;
/// ```
#[derive(Clone)]
pub struct ServiceTransport<S> {
    service: S,
}

impl<S> ServiceTransport<S> {
    /// Wraps `service`.
    pub fn new(service: S) -> Self {
        Self { service }
    }

    /// Returns the wrapped service.
    pub fn into_inner(self) -> S {
        self.service
    }
}

impl<S> fmt::Debug for ServiceTransport<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceTransport").finish_non_exhaustive()
    }
}

#[async_trait]
impl<S> Transport for ServiceTransport<S>
where
    S: Service<Request<Bytes>, Response = Response<Bytes>> + Clone + Send + Sync + 'static,
    S::Error: Into<BoxError>,
    S::Future: Send,
{
    async fn send(&self, request: Request<Bytes>) -> Result<Response<Bytes>, TransportError> {
        self.service
            .clone()
            .oneshot(request)
            .await
            .map_err(|error| into_transport_error(error.into()))
    }
}

/// Keeps a `TransportError` produced inside a service stack intact.
fn into_transport_error(error: BoxError) -> TransportError {
    match error.downcast::<TransportError>() {
        Ok(error) => *error,
        Err(error) => TransportError::Network(error),
    }
}
