//! Error types for litsearch.
//!
//! One enum covers every failure the retrieval core can surface. Structural
//! failures (empty corpus, missing index files, broken positional invariants)
//! each get their own variant so callers can tell "nothing to do" apart from
//! "setup broken" and "data corrupted".

use std::path::PathBuf;
use thiserror::Error;

/// Unified error type for litsearch.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// No document in the corpus directory has usable text.
    #[error("Corpus is empty: no documents with text found in {}", .path.display())]
    CorpusEmpty { path: PathBuf },

    /// A call to the embedding provider failed or timed out.
    #[error("Embedding provider error: {0}")]
    EmbeddingProvider(String),

    /// The persisted index or identifier map is missing.
    #[error("Index not found at {}. Build the index first (litsearch build).", .path.display())]
    IndexNotFound { path: PathBuf },

    /// The index and identifier map disagree, or a search hit has no id.
    #[error("Index corrupt: {0}")]
    IndexCorrupt(String),

    /// The accelerated search backend could not be created.
    #[error("Acceleration unavailable: {0}")]
    AccelerationUnavailable(String),

    /// Vectors of different lengths were mixed.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The query-time embedding model differs from the one the index was built with.
    #[error("Model mismatch: index was built with '{indexed}', query uses '{requested}'")]
    ModelMismatch { indexed: String, requested: String },

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_not_found_mentions_build() {
        let err = AppError::IndexNotFound {
            path: PathBuf::from("/tmp/index/vectors.idx"),
        };
        let message = err.to_string();
        assert!(message.contains("/tmp/index/vectors.idx"));
        assert!(message.contains("Build the index first"));
    }

    #[test]
    fn test_json_error_converts_to_serialization() {
        let err: AppError = serde_json::from_str::<Vec<String>>("{").unwrap_err().into();
        assert!(matches!(err, AppError::Serialization(_)));
    }
}
