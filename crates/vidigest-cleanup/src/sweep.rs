//! The cleanup sweep itself.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use vidigest_store::RecordStore;

/// Permanently failed records older than this are deleted. The cutoff is
/// strictly-older-than: a record exactly this old survives one more sweep.
pub const CLEANUP_AGE_DAYS: i64 = 30;

/// Aggregate counters for one sweep, logged as JSON at the end of a run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct CleanupStats {
    pub scanned: usize,
    pub deleted: usize,
    pub errors: usize,
}

/// Delete permanently failed records whose first failure is older than
/// [`CLEANUP_AGE_DAYS`]. Records with no recorded first failure are treated
/// as stale and deleted as well. The paired summary record is removed when
/// present; its absence is the common case and not an error.
pub async fn run_cleanup(store: &dyn RecordStore, now: DateTime<Utc>) -> CleanupStats {
    let mut stats = CleanupStats::default();
    let cutoff = now - Duration::days(CLEANUP_AGE_DAYS);

    let candidates = match store.scan_permanently_failed().await {
        Ok(candidates) => candidates,
        Err(e) => {
            warn!(error = %e, "failed to scan permanently failed records");
            stats.errors += 1;
            return stats;
        }
    };
    stats.scanned = candidates.len();

    for candidate in candidates {
        let eligible = match candidate.first_failed_at {
            Some(first_failed_at) => first_failed_at < cutoff,
            None => true,
        };
        if !eligible {
            debug!(video_id = %candidate.video_id, "record not old enough, keeping");
            continue;
        }

        if let Err(e) = store.delete_video(&candidate.video_id).await {
            warn!(video_id = %candidate.video_id, error = %e, "failed to delete video record");
            stats.errors += 1;
            continue;
        }
        if let Err(e) = store.delete_summary(&candidate.video_id).await {
            warn!(video_id = %candidate.video_id, error = %e, "failed to delete summary record");
            stats.errors += 1;
            continue;
        }

        info!(video_id = %candidate.video_id, "deleted permanently failed record");
        stats.deleted += 1;
    }

    stats
}
