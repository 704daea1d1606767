//! Age-gated deletion of permanently failed video records and their
//! paired summaries.

pub mod sweep;

pub use sweep::{run_cleanup, CleanupStats, CLEANUP_AGE_DAYS};
