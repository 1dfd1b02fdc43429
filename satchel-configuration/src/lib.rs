//! YAML configuration for satchel.
//!
//! One document configures both caching layers:
//!
//! ```yaml
//! client:
//!   baseURL: "https://exam.example"
//!   timeout: 10s
//!   retryAttempts: 3
//!   retryDelay: 1s
//!   cacheTimeout: 5m
//!   maxConcurrentRequests: 6
//! worker:
//!   version: v2
//!   manifest: ["/", "/offline.html", "/static/js/main.js"]
//!   apiTimeout: 5s
//! ```
//!
//! Every option has a default, so both sections and every key in them may
//! be omitted. Unknown keys are rejected.

mod error;
mod settings;

pub use error::ConfigError;
pub use settings::Settings;
