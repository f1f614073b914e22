//! Storage error types
//!
//! These never escape [`crate::DiagnosticStore`]; they exist so backends can
//! report why they failed and the store can log it.

use std::path::PathBuf;

/// Errors raised by a [`crate::StorageBackend`]
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Medium refused access (disabled, sandboxed, blocked by policy)
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Medium is full
    #[error("storage quota exceeded")]
    QuotaExceeded,

    /// IO error on a file-backed medium
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Stored document could not be encoded or decoded
    #[error("storage encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl StorageError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
