use std::path::Path;
use std::sync::Arc;

use satchel::{Client, ClientConfig, Transport};
use satchel_store::CacheStorage;
use satchel_worker::{OfflineCacheLayer, WorkerConfig};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ConfigError;

/// Settings of the request client and the offline cache layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Request client options.
    pub client: ClientConfig,
    /// Offline cache layer options.
    pub worker: WorkerConfig,
}

impl Settings {
    /// Parses and validates a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let settings: Settings =
            serde_saphyr::from_str(yaml).map_err(|err| ConfigError::Parse(err.to_string()))?;
        settings.client.validate()?;
        Ok(settings)
    }

    /// Reads, parses and validates a YAML file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading configuration");
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&yaml)
    }

    /// Serializes the settings back to YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_saphyr::to_string(self).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Builds a request client sending through `transport`.
    pub fn client<T: Transport>(&self, transport: T) -> Result<Client, ConfigError> {
        Ok(Client::new(transport, self.client.clone())?)
    }

    /// Builds the offline cache layer over `storage`.
    pub fn offline_layer(&self, storage: Arc<dyn CacheStorage>) -> OfflineCacheLayer {
        OfflineCacheLayer::new(storage, self.worker.clone())
    }
}
