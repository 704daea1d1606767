//! Newsletter error types.

use thiserror::Error;

/// Result type for newsletter operations.
pub type NewsletterResult<T> = Result<T, NewsletterError>;

/// Errors that can occur while compiling or sending the digest.
#[derive(Debug, Error)]
pub enum NewsletterError {
    #[error("Configuration error: {0}")]
    Config(#[from] vidigest_config::ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] vidigest_store::StoreError),

    #[error("Send failed: {0}")]
    SendFailed(String),
}

impl NewsletterError {
    pub fn send_failed(msg: impl Into<String>) -> Self {
        Self::SendFailed(msg.into())
    }
}
