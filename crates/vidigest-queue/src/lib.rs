//! Work queue adapter.
//!
//! This crate provides:
//! - The [`WorkItem`] payload exchanged between poller and worker
//! - The [`WorkQueue`] trait with SQS and in-memory implementations
//! - Partial-batch acknowledgment via per-message deletes

pub mod error;
pub mod item;
pub mod queue;

pub use error::{QueueError, QueueResult};
pub use item::WorkItem;
pub use queue::{MemoryQueue, QueueMessage, SqsQueue, WorkQueue};
