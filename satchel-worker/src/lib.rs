//! Offline-capable HTTP cache layer for Tower services.
//!
//! This crate provides [`CacheWorker`], a Tower [`Service`](tower::Service)
//! that sits on the network path of an application. It classifies every
//! request by [`ResourceClass`] and applies a caching strategy to it, backed
//! by named stores in a shared [`CacheStorage`](satchel_store::CacheStorage).
//!
//! # Core Concepts
//!
//! - **[`OfflineCacheLayer`]**: a Tower [`Layer`](tower::Layer) producing
//!   workers. Use [`OfflineCacheLayer::builder()`] to configure it.
//!
//! - **Generations**: a worker owns the static and dynamic stores of its
//!   configured version. Installing precaches the manifest into the static
//!   store. Activating deletes the stores of every other version.
//!
//! - **[`WorkerHost`]**: the platform side of the lifecycle. It installs
//!   new workers, keeps an installed one waiting while another is active,
//!   and promotes it on request.
//!
//! - **Control channel**: pages post [`ControlMessage`]s (`SKIP_WAITING`,
//!   `CLEAR_CACHE`, `GET_CACHE_SIZE`) through a [`ControlHandle`].
//!
//! # Strategies
//!
//! | Resource class | Strategy |
//! |----------------|----------|
//! | [`ResourceClass::StaticAsset`] | cache-first, offline page for failed navigations |
//! | [`ResourceClass::ApiCall`] | network-first under `api_timeout`, then cache, then a `503` JSON body |
//! | [`ResourceClass::PageNavigation`] | network-first, then cache |
//! | [`ResourceClass::Other`] | cache-first |
//!
//! Only `GET` responses with a `2xx` status are stored, following
//! [`satchel_core::is_cacheable`].
//!
//! # Response Headers
//!
//! Every response carries [`SOURCE_HEADER`]:
//!
//! | Header Value | Meaning |
//! |--------------|---------|
//! | `network` | Fetched from the upstream service |
//! | `cache` | Served from a cache store |
//! | `offline` | Synthesized while both network and cache were unavailable |
//!
//! # Quick Start
//!
//! ```ignore
//! use satchel_worker::{OfflineCacheLayer, WorkerConfig};
//! use tower::{ServiceBuilder, service_fn};
//!
//! let layer = OfflineCacheLayer::builder()
//!     .config(WorkerConfig::for_version("v2"))
//!     .build();
//!
//! let worker = ServiceBuilder::new()
//!     .layer(layer)
//!     .service(service_fn(fetch_from_backend));
//!
//! worker.install().await?;
//! worker.activate().await?;
//! ```

#![warn(missing_docs)]

/// Resource classification of intercepted requests.
pub mod classify;
mod config;
/// Control channel messages and handle.
pub mod control;
mod entry;
mod error;
mod host;
mod layer;
mod strategy;
mod worker;

pub use classify::{ResourceClass, classify, store_key};
pub use config::{DEFAULT_API_TIMEOUT, WorkerConfig};
pub use control::{ControlHandle, ControlMessage, ControlReply};
pub use error::{BoxError, WorkerError};
pub use host::{RegistrationOutcome, WorkerHost};
pub use layer::{OfflineCacheLayer, OfflineCacheLayerBuilder};
pub use strategy::{SOURCE_HEADER, Source};
pub use worker::{CacheWorker, WorkerState};
