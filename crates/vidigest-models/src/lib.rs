//! Shared data models for the Vidigest pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Video records and their processing status
//! - Failure reasons and the retry schedule
//! - Summary records produced by the worker

pub mod retry;
pub mod summary;
pub mod video;

// Re-export common types
pub use retry::{RetryDecision, RetryPolicy};
pub use summary::SummaryRecord;
pub use video::{FailureReason, VideoId, VideoRecord, VideoStatus};
