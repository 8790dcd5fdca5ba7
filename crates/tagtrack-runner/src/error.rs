//! Runner error types.

use std::path::PathBuf;

use tagtrack_catalog::CatalogError;
use tagtrack_control::{ConfigError, SessionError};
use thiserror::Error;

/// Errors that end the runner.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Config file could not be read.
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        /// Path of the config file.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Config file is not valid YAML for the expected layout.
    #[error("invalid config: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// A config value is out of range.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Tag file could not be loaded.
    #[error("tag file {path}: {source}")]
    Catalog {
        /// Path of the tag file.
        path: PathBuf,
        /// Underlying error.
        source: CatalogError,
    },

    /// An address did not parse.
    #[error("invalid {field} address {value:?}")]
    Address {
        /// Which address.
        field: &'static str,
        /// The offending value.
        value: String,
    },

    /// The session failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Logging could not be installed.
    #[error("failed to initialize logging: {0}")]
    Logging(String),

    /// The Ctrl+C handler could not be installed.
    #[error("failed to install signal handler: {0}")]
    Signal(#[from] ctrlc::Error),

    /// Socket or thread I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;
