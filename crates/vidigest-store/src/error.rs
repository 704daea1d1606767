//! Record store error types.

use thiserror::Error;

/// Result type for record store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during record store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Malformed stored item: {0}")]
    MalformedItem(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound(key.into())
    }

    pub fn request_failed(msg: impl Into<String>) -> Self {
        Self::RequestFailed(msg.into())
    }

    pub fn malformed_item(msg: impl Into<String>) -> Self {
        Self::MalformedItem(msg.into())
    }

    /// Check if the error is worth retrying via queue redelivery.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::RequestFailed(_))
    }
}
