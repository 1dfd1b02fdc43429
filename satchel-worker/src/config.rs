//! Offline cache configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default timeout of API requests before falling back to the cache.
pub const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration of a [`CacheWorker`](crate::CacheWorker).
///
/// Cache generations are named `"{static_cache_prefix}-{version}"` and
/// `"{dynamic_cache_prefix}-{version}"`. Bumping `version` makes the next
/// activation drop every store of the previous version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct WorkerConfig {
    /// Deployed version, part of every cache store name.
    pub version: String,
    /// Prefix of the static store name.
    pub static_cache_prefix: String,
    /// Prefix of the dynamic store name.
    pub dynamic_cache_prefix: String,
    /// Paths under this prefix are static assets.
    pub static_path_prefix: String,
    /// Paths under this prefix are API calls.
    pub api_path_prefix: String,
    /// File extensions (without the dot) of static assets.
    pub static_extensions: Vec<String>,
    /// Third-party hosts whose responses are treated as static assets.
    pub asset_hosts: Vec<String>,
    /// Assets fetched into the static store on install.
    pub manifest: Vec<String>,
    /// Page served to failed navigations when cached.
    pub offline_page: String,
    /// Network timeout of API requests.
    #[serde(with = "humantime_serde")]
    pub api_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            version: "v1".to_owned(),
            static_cache_prefix: "static".to_owned(),
            dynamic_cache_prefix: "dynamic".to_owned(),
            static_path_prefix: "/static/".to_owned(),
            api_path_prefix: "/api/".to_owned(),
            static_extensions: [
                "js", "css", "png", "jpg", "jpeg", "gif", "svg", "ico", "webp", "woff", "woff2",
                "ttf", "eot",
            ]
            .into_iter()
            .map(str::to_owned)
            .collect(),
            asset_hosts: vec![
                "cdn.jsdelivr.net".to_owned(),
                "fonts.googleapis.com".to_owned(),
                "fonts.gstatic.com".to_owned(),
            ],
            manifest: vec!["/".to_owned(), "/offline.html".to_owned()],
            offline_page: "/offline.html".to_owned(),
            api_timeout: DEFAULT_API_TIMEOUT,
        }
    }
}

impl WorkerConfig {
    /// Configuration for `version` with every other option defaulted.
    pub fn for_version(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            ..Self::default()
        }
    }

    /// Name of the static store of this generation.
    pub fn static_cache_name(&self) -> String {
        format!("{}-{}", self.static_cache_prefix, self.version)
    }

    /// Name of the dynamic store of this generation.
    pub fn dynamic_cache_name(&self) -> String {
        format!("{}-{}", self.dynamic_cache_prefix, self.version)
    }

    /// Both store names of this generation, static first.
    pub fn cache_names(&self) -> [String; 2] {
        [self.static_cache_name(), self.dynamic_cache_name()]
    }
}
