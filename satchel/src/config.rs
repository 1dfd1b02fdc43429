//! Client configuration.
//!
//! Every recognized option is a field of [`ClientConfig`] with a default.
//! Serialized names follow the option names pages already use
//! (`baseURL`, `retryAttempts`, ...). Durations are humantime strings
//! such as `"10s"` or `"1000ms"`.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default per-attempt network timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// Default number of retries after the first attempt.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
/// Default base delay of the exponential backoff.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);
/// Default time-to-live of cached GET responses.
pub const DEFAULT_CACHE_TIMEOUT: Duration = Duration::from_secs(5 * 60);
/// Default number of network calls allowed in flight at once.
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 6;
/// Default maximum number of cached responses.
pub const DEFAULT_CACHE_CAPACITY: usize = 100;
/// Default path probed by the health check.
pub const DEFAULT_HEALTH_PATH: &str = "/api/health";

/// Invalid client configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// `maxConcurrentRequests` must allow at least one request.
    #[error("maxConcurrentRequests must be at least 1")]
    ZeroConcurrency,
    /// `cacheCapacity` must hold at least one entry.
    #[error("cacheCapacity must be at least 1")]
    ZeroCacheCapacity,
    /// `timeout` must be positive.
    #[error("timeout must be greater than zero")]
    ZeroTimeout,
}

/// Configuration of a [`Client`](crate::Client).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Prefix prepended to every relative URL.
    #[serde(rename = "baseURL")]
    pub base_url: String,
    /// Per-attempt network timeout.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Retries after the first attempt for retryable failures.
    pub retry_attempts: u32,
    /// Base delay of the exponential backoff (`retry_delay * 2^attempt`).
    #[serde(with = "humantime_serde")]
    pub retry_delay: Duration,
    /// Time-to-live of cached GET responses.
    #[serde(with = "humantime_serde")]
    pub cache_timeout: Duration,
    /// Maximum number of network calls in flight at once.
    pub max_concurrent_requests: usize,
    /// Maximum number of cached responses.
    pub cache_capacity: usize,
    /// Path probed by [`Client::health_check`](crate::Client::health_check).
    pub health_path: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout: DEFAULT_TIMEOUT,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            cache_timeout: DEFAULT_CACHE_TIMEOUT,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            health_path: DEFAULT_HEALTH_PATH.to_owned(),
        }
    }
}

impl ClientConfig {
    /// Create a new builder for ClientConfig.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Checks the configuration invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_requests == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.cache_capacity == 0 {
            return Err(ConfigError::ZeroCacheCapacity);
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

/// Builder for ClientConfig.
#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    /// Set the per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the number of retries.
    pub fn retry_attempts(mut self, attempts: u32) -> Self {
        self.config.retry_attempts = attempts;
        self
    }

    /// Set the base backoff delay.
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.config.retry_delay = delay;
        self
    }

    /// Set the cache time-to-live.
    pub fn cache_timeout(mut self, ttl: Duration) -> Self {
        self.config.cache_timeout = ttl;
        self
    }

    /// Set the concurrency limit.
    pub fn max_concurrent_requests(mut self, max: usize) -> Self {
        self.config.max_concurrent_requests = max;
        self
    }

    /// Set the cache capacity.
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.config.cache_capacity = capacity;
        self
    }

    /// Set the health check path.
    pub fn health_path(mut self, path: impl Into<String>) -> Self {
        self.config.health_path = path.into();
        self
    }

    /// Validate and build the ClientConfig.
    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
