//! Export error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while writing or reading an export directory.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Filesystem operation failed
    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON payload could not be encoded or decoded
    #[error("json error at {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Code file does not hold valid hex
    #[error("invalid hex in {}: {reason}", path.display())]
    InvalidHex { path: PathBuf, reason: String },

    /// Storage line is not a `key:value` pair of hashes
    #[error("invalid storage entry at {}:{line}", path.display())]
    InvalidStorageLine { path: PathBuf, line: usize },

    /// File name does not start with a hex address or hash
    #[error("invalid file name '{0}'")]
    InvalidFileName(String),

    /// Import root is missing
    #[error("export directory {} does not exist", .0.display())]
    MissingDirectory(PathBuf),

    /// Worker pool stopped accepting jobs
    #[error("worker pool closed")]
    PoolClosed,

    /// A worker panicked or was cancelled
    #[error("export worker failed: {0}")]
    Worker(String),
}

impl ExportError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }
}

pub type ExportResult<T> = Result<T, ExportError>;
