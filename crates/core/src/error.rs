//! Error types for the Parley domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each collaborator seam has its own error enum.

use thiserror::Error;

/// The top-level error type for all Parley operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Language-model errors ---
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    // --- Memory store errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Collaborator errors ---

/// Failures from the language-model client (completion or classification).
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Model unavailable: {0}")]
    Unavailable(String),

    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Malformed model output: {0}")]
    MalformedOutput(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Failures from the long-term memory store.
#[derive(Debug, Clone, Error)]
pub enum MemoryError {
    #[error("Search failed: {0}")]
    SearchFailed(String),

    #[error("Ingestion failed: {0}")]
    IngestFailed(String),

    #[error("Store timed out: {0}")]
    Timeout(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_error_displays_correctly() {
        let err = Error::Model(ModelError::RateLimited {
            retry_after_secs: 30,
        });
        assert!(err.to_string().contains("30"));
        assert!(err.to_string().contains("Rate limited"));
    }

    #[test]
    fn memory_error_converts_to_top_level() {
        let err: Error = MemoryError::SearchFailed("qdrant unreachable".into()).into();
        assert!(err.to_string().contains("qdrant unreachable"));
    }
}
