use std::path::PathBuf;

use thiserror::Error;

/// Error loading a configuration document.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// The configuration file.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// The document is not valid YAML or does not match the schema.
    #[error("invalid configuration: {0}")]
    Parse(String),

    /// The client section violates a client invariant.
    #[error(transparent)]
    Client(#[from] satchel::ConfigError),
}
