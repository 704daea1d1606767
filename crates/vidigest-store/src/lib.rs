//! Record store adapter and video state machine.
//!
//! This crate provides:
//! - The [`RecordStore`] trait over the pipeline's key-value store
//! - A DynamoDB implementation (single-table, one secondary index)
//! - An in-memory implementation for tests and local runs
//! - The [`VideoStateMachine`] that owns status transitions and retry
//!   bookkeeping

pub mod dynamo;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod state;
pub mod store;

pub use dynamo::DynamoStore;
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use state::{VideoDetails, VideoStateMachine};
pub use store::{CleanupCandidate, RecordStore, RetryCandidate, VideoUpdate};
