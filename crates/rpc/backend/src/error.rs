//! Error types for backend resolution.

use thiserror::Error;

/// Outcome of a failed lookup against one data source.
///
/// The resolver falls back on either variant when the local cache fails.
/// On the authoritative source, the variant decides whether an accessor
/// reports "absent" or a hard error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// The source answered and does not hold the item.
    #[error("not found: {0}")]
    NotFound(String),

    /// The source could not be reached or failed internally.
    #[error("source unavailable: {0}")]
    Transport(String),
}

impl SourceError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result type for a single data source lookup.
pub type SourceResult<T> = Result<T, SourceError>;

/// Errors surfaced by backend accessors.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The final source consulted failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// A query payload or execution result could not be decoded.
    #[error("failed to decode {what}: {reason}")]
    Decode { what: &'static str, reason: String },

    /// A raw transaction is not a valid EVM transaction.
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    /// Local bloom bits store failure.
    #[error("bloom store error: {0}")]
    Store(String),

    /// The bloom retrieval service has shut down.
    #[error("bloom retrieval service closed")]
    ServiceClosed,
}

impl BackendError {
    pub fn decode(what: &'static str, reason: impl ToString) -> Self {
        Self::Decode {
            what,
            reason: reason.to_string(),
        }
    }
}

impl From<rusqlite::Error> for BackendError {
    fn from(err: rusqlite::Error) -> Self {
        BackendError::Store(err.to_string())
    }
}

/// Result type for backend accessors.
pub type BackendResult<T> = Result<T, BackendError>;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O error when loading config.
    #[error("failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },

    /// YAML parsing error.
    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },

    /// Validation failed with one or more errors.
    #[error("config validation failed:\n{}", .0.join("\n"))]
    ValidationFailed(Vec<String>),
}
