//! Error types for the engine

use std::path::PathBuf;
use warden_intercept::ProxyError;
use warden_recovery::RecoveryError;

/// Errors loading or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Reading the file failed
    #[error("failed to read configuration file {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Semantic validation failed
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl ConfigError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

/// Errors from engine operations
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Recovery guard failure
    #[error(transparent)]
    Recovery(#[from] RecoveryError),

    /// Background proxy failure
    #[error(transparent)]
    Proxy(#[from] ProxyError),

    /// No guard mounted under this id
    #[error("no guard mounted with id '{0}'")]
    UnknownGuard(String),
}
