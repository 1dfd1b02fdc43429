//! Error taxonomy of the request client.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Boxed error type used for opaque transport failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure reported by a [`Transport`](crate::Transport).
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transport gave up waiting on its own.
    #[error("transport timed out")]
    Timeout,
    /// Connectivity, DNS or protocol level failure.
    #[error(transparent)]
    Network(BoxError),
}

impl TransportError {
    /// Wraps any error as a network failure.
    pub fn network<E>(error: E) -> Self
    where
        E: Into<BoxError>,
    {
        TransportError::Network(error.into())
    }
}

/// Error category used for retry decisions and handler routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Attempt aborted by its timeout.
    Timeout,
    /// HTTP 4xx.
    ClientError,
    /// HTTP 5xx.
    ServerError,
    /// Connectivity failure below HTTP.
    NetworkError,
    /// Anything else.
    UnknownError,
}

impl ErrorCategory {
    /// All categories, in classification priority order.
    pub const ALL: [ErrorCategory; 5] = [
        ErrorCategory::Timeout,
        ErrorCategory::ClientError,
        ErrorCategory::ServerError,
        ErrorCategory::NetworkError,
        ErrorCategory::UnknownError,
    ];

    /// Returns `true` if failures of this category are retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCategory::Timeout | ErrorCategory::ServerError | ErrorCategory::NetworkError
        )
    }

    /// Returns the snake_case name of the category.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::ClientError => "client_error",
            ErrorCategory::ServerError => "server_error",
            ErrorCategory::NetworkError => "network_error",
            ErrorCategory::UnknownError => "unknown_error",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by [`Client`](crate::Client) requests.
///
/// Cloneable, because every caller joined to one in-flight request receives
/// the same failure.
#[derive(Debug, Clone, Error)]
pub enum RequestError {
    /// An attempt exceeded its timeout and was cancelled.
    #[error("request to {url} timed out after {timeout:?}")]
    Timeout {
        /// Requested URL.
        url: String,
        /// Timeout that elapsed.
        timeout: Duration,
    },

    /// The server answered with a non-success status.
    #[error("request to {url} failed with HTTP {status}")]
    Status {
        /// Requested URL.
        url: String,
        /// Response status.
        status: StatusCode,
        /// Response body, kept for handlers.
        body: Bytes,
    },

    /// The transport failed before a response arrived.
    #[error("network error for {url}: {source}")]
    Network {
        /// Requested URL.
        url: String,
        /// Transport failure.
        source: Arc<TransportError>,
    },

    /// The response body could not be decoded.
    #[error("failed to decode response from {url}: {message}")]
    Decode {
        /// Requested URL.
        url: String,
        /// Decoder message.
        message: String,
    },

    /// The request could not be built.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The scheduler was closed while the request waited for a slot.
    #[error("request scheduler closed")]
    Cancelled,
}

impl RequestError {
    /// Classifies the error.
    ///
    /// Priority: timeout, then 4xx, then 5xx, then network failures, else unknown.
    pub fn category(&self) -> ErrorCategory {
        match self {
            RequestError::Timeout { .. } => ErrorCategory::Timeout,
            RequestError::Network { source, .. }
                if matches!(source.as_ref(), TransportError::Timeout) =>
            {
                ErrorCategory::Timeout
            }
            RequestError::Status { status, .. } if status.is_client_error() => {
                ErrorCategory::ClientError
            }
            RequestError::Status { status, .. } if status.is_server_error() => {
                ErrorCategory::ServerError
            }
            RequestError::Network { .. } => ErrorCategory::NetworkError,
            _ => ErrorCategory::UnknownError,
        }
    }

    /// Returns `true` if the request may be retried.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Returns the HTTP status for status errors.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            RequestError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn from_transport(url: &str, error: TransportError) -> Self {
        RequestError::Network {
            url: url.to_owned(),
            source: Arc::new(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> RequestError {
        RequestError::Status {
            url: "/x".to_owned(),
            status: StatusCode::from_u16(code).unwrap(),
            body: Bytes::new(),
        }
    }

    #[test]
    fn classification() {
        let timeout = RequestError::Timeout {
            url: "/x".to_owned(),
            timeout: Duration::from_secs(1),
        };
        assert_eq!(timeout.category(), ErrorCategory::Timeout);
        assert_eq!(status(404).category(), ErrorCategory::ClientError);
        assert_eq!(status(503).category(), ErrorCategory::ServerError);
        assert_eq!(status(302).category(), ErrorCategory::UnknownError);
        assert_eq!(
            RequestError::from_transport("/x", TransportError::network("connection refused"))
                .category(),
            ErrorCategory::NetworkError
        );
        assert_eq!(
            RequestError::from_transport("/x", TransportError::Timeout).category(),
            ErrorCategory::Timeout
        );
        assert_eq!(
            RequestError::InvalidRequest("bad".to_owned()).category(),
            ErrorCategory::UnknownError
        );
    }

    #[test]
    fn retryable_categories() {
        assert!(ErrorCategory::Timeout.is_retryable());
        assert!(ErrorCategory::ServerError.is_retryable());
        assert!(ErrorCategory::NetworkError.is_retryable());
        assert!(!ErrorCategory::ClientError.is_retryable());
        assert!(!ErrorCategory::UnknownError.is_retryable());
    }
}
