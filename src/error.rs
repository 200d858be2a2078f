//! Error types for dashboard plotting.

use thiserror::Error;

use crate::embeddings::EmbeddingError;

/// Result type alias for plotting operations.
pub type Result<T> = std::result::Result<T, PlotError>;

/// Errors raised while talking to the dashboard or preparing plot data.
///
/// Nothing is retried: every variant propagates to the caller.
#[derive(Debug, Error)]
pub enum PlotError {
    #[error("Connection to dashboard at {url} failed: {reason}")]
    Connection { url: String, reason: String },

    #[error("Dashboard rejected request to /{endpoint} with status {status}: {body}")]
    Rejected {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: String, got: String },

    #[error("No window registered for '{0}'")]
    MissingWindow(&'static str),

    #[error("Projection failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Image encoding failed: {0}")]
    Encoding(#[from] image::ImageError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PlotError {
    pub(crate) fn shape(expected: impl Into<String>, got: impl Into<String>) -> Self {
        PlotError::ShapeMismatch {
            expected: expected.into(),
            got: got.into(),
        }
    }
}
