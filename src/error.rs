//! Error types for rowvec.

use std::path::PathBuf;

use thiserror::Error;

use crate::utils::retry::Retryable;

/// Errors raised while reading the bulk tabular source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to open source: {0}")]
    Open(String),

    #[error("failed to read source at row {row}: {message}")]
    Read { row: u64, message: String },
}

/// Errors related to embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("failed to connect to embedding server: {0}")]
    ConnectionError(String),

    #[error("embedding server error: {0}")]
    ServerError(String),

    #[error("embedding request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("embedding has {actual} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedding timeout")]
    Timeout,
}

impl Retryable for EmbeddingError {
    fn is_retryable(&self) -> bool {
        match self {
            EmbeddingError::ConnectionError(_) | EmbeddingError::Timeout => true,
            // 429 and gateway errors are usually transient
            EmbeddingError::ServerError(msg) => {
                msg.contains("503")
                    || msg.contains("502")
                    || msg.contains("504")
                    || msg.contains("429")
                    || msg.to_lowercase().contains("unavailable")
                    || msg.to_lowercase().contains("too many requests")
            }
            EmbeddingError::RequestError(e) => e.is_timeout() || e.is_connect(),
            EmbeddingError::InvalidResponse(_) | EmbeddingError::DimensionMismatch { .. } => false,
        }
    }
}

/// Errors related to the remote vector index.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index unavailable: {0}")]
    Unavailable(String),

    #[error("index error: {0}")]
    Collection(String),

    #[error("upsert error: {0}")]
    Upsert(String),

    #[error("query error: {0}")]
    Query(String),

    #[error("batch of {size} entries exceeds the limit of {limit}")]
    BatchTooLarge { size: usize, limit: usize },

    #[error("PostgreSQL error: {0}")]
    PostgresError(String),

    #[error("pgvector extension error: {0}")]
    PgVectorExtensionError(String),
}

impl Retryable for IndexError {
    fn is_retryable(&self) -> bool {
        match self {
            IndexError::Unavailable(_) => true,
            IndexError::BatchTooLarge { .. } | IndexError::PgVectorExtensionError(_) => false,
            IndexError::Collection(msg)
            | IndexError::Upsert(msg)
            | IndexError::Query(msg)
            | IndexError::PostgresError(msg) => {
                let msg_lower = msg.to_lowercase();
                msg_lower.contains("timeout")
                    || msg_lower.contains("connection")
                    || msg_lower.contains("unavailable")
                    || msg_lower.contains("too many")
            }
        }
    }
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("path error: {0}")]
    PathError(String),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Errors that abort an upload run.
///
/// Everything else is contained per record or per batch and only shows up in
/// the run report.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("failed to prepare index: {0}")]
    IndexSetup(#[source] IndexError),
}

/// Application-level errors that wrap domain errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("index error: {0}")]
    Index(#[from] IndexError),

    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_not_found_message() {
        let err = SourceError::NotFound(PathBuf::from("/data/cars.csv"));
        assert_eq!(err.to_string(), "source not found: /data/cars.csv");
    }

    #[test]
    fn test_embedding_retryable() {
        assert!(EmbeddingError::Timeout.is_retryable());
        assert!(EmbeddingError::ServerError("status 503: busy".into()).is_retryable());
        assert!(!EmbeddingError::ServerError("status 413: too long".into()).is_retryable());
        assert!(
            !EmbeddingError::DimensionMismatch {
                expected: 1024,
                actual: 768
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_index_retryable() {
        assert!(IndexError::Unavailable("refused".into()).is_retryable());
        assert!(IndexError::Upsert("connection reset".into()).is_retryable());
        assert!(!IndexError::Upsert("wrong vector dimension".into()).is_retryable());
        assert!(!IndexError::BatchTooLarge { size: 51, limit: 50 }.is_retryable());
    }
}
