//! Poller error types.

use thiserror::Error;

/// Result type for poller operations.
pub type PollerResult<T> = Result<T, PollerError>;

/// Errors that can occur during a poll run.
#[derive(Debug, Error)]
pub enum PollerError {
    #[error("Configuration error: {0}")]
    Config(#[from] vidigest_config::ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] vidigest_store::StoreError),

    #[error("Queue error: {0}")]
    Queue(#[from] vidigest_queue::QueueError),

    #[error("Video-list API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl PollerError {
    pub fn api(msg: impl Into<String>) -> Self {
        Self::Api(msg.into())
    }
}
