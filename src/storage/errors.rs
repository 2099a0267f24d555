//! Error types for JSON file storage.

use std::path::PathBuf;

use thiserror::Error;

/// Storage error type.
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error.
    #[error("io error on {path}: {source}")]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// File exists but does not hold the expected JSON document.
    #[error("corrupt json in {path}: {source}")]
    Corrupt {
        /// File involved.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Atomic rename of the temporary file failed.
    #[error("failed to persist {path}: {source}")]
    Persist {
        /// Target file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: tempfile::PersistError,
    },
    /// Blocking task was cancelled or panicked.
    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl StorageError {
    /// Wrap an I/O error with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the stored document could not be parsed.
    #[must_use]
    pub const fn is_corrupt(&self) -> bool {
        matches!(self, Self::Corrupt { .. })
    }
}

/// Convenience result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
