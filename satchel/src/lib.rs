#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]
//! # satchel
//!
//! Application-level HTTP request client for the exam app.
//!
//! Every outgoing call from page logic goes through a [`Client`], which adds:
//!
//! - **TTL response cache**: fresh GET responses are served from memory;
//! - **single-flight**: concurrent identical calls share one execution and its outcome;
//! - **admission queue**: at most `max_concurrent_requests` calls hit the network, the rest wait FIFO;
//! - **retry**: timeouts, network errors and 5xx are retried with exponential backoff;
//! - **error handlers**: each failure is routed to the handler of its [`ErrorCategory`].
//!
//! The wire is behind the [`Transport`] trait. [`ServiceTransport`] adapts any
//! Tower service; `satchel-reqwest` provides a reqwest-backed transport.
//!
//! ## Feature Flags
//!
//! - `metrics` - Mirror client counters to the [`metrics`](https://docs.rs/metrics) facade
//!

/// Response cache with TTL and insertion-order eviction.
pub mod cache;

mod client;

/// Client configuration and its defaults.
pub mod config;

mod concurrency;

/// Error types and categories.
///
/// [`RequestError`] is what every request returns on failure. Its
/// [`ErrorCategory`] drives both retry and handler routing.
pub mod error;

/// Per-category error handlers and their default user-facing messages.
pub mod handlers;

/// Performance counters.
pub mod metrics;

mod options;
mod request;
mod response;

/// Backoff between retried attempts.
pub mod retry;

mod transport;

pub use client::{Client, ClientBuilder, NotSet};
pub use config::{ClientConfig, ClientConfigBuilder, ConfigError};
pub use error::{BoxError, ErrorCategory, RequestError, TransportError};
pub use handlers::ErrorHandler;
pub use metrics::MetricsSnapshot;
pub use options::{BatchOutcome, BatchRequest, RequestBody, RequestOptions};
pub use response::ResponseData;
pub use retry::RetryPolicy;
pub use transport::{ServiceTransport, Transport};

pub use satchel_core::{CacheKey, NotificationKind, Notifier};
