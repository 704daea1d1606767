//! The scheduled-retry sweep.
//!
//! Re-enqueues FAILED/NO_TRANSCRIPT videos whose retry window has opened.
//! Re-enqueue is just "try again": no status or retry_count mutation happens
//! here. The increment belongs to the worker when the next failure is
//! actually recorded.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info};

use vidigest_queue::{WorkItem, WorkQueue};
use vidigest_store::RecordStore;

use crate::discover::PollStats;

/// Scan for due retries and put them back on the work queue. Updates
/// `retries_requeued` and `errors` on the shared stats.
pub async fn run_retry_sweep(
    store: &Arc<dyn RecordStore>,
    queue: &Arc<dyn WorkQueue>,
    now: DateTime<Utc>,
    stats: &mut PollStats,
) {
    let candidates = match store.scan_retryable(now).await {
        Ok(candidates) => candidates,
        Err(e) => {
            error!(error = %e, "retry sweep scan failed");
            stats.errors += 1;
            return;
        }
    };

    for candidate in candidates {
        // stored records can predate some metadata fields; synthesize
        // placeholders so the work item stays parseable
        let item = WorkItem {
            video_id: candidate.video_id.clone(),
            title: candidate
                .title
                .unwrap_or_else(|| "Unknown title".to_string()),
            channel_id: candidate.channel_id.unwrap_or_default(),
            channel_title: candidate
                .channel_title
                .unwrap_or_else(|| "Unknown channel".to_string()),
            published_at: candidate.published_at.unwrap_or(now),
        };
        match queue.enqueue(&item).await {
            Ok(()) => {
                info!(video_id = %item.video_id, "retry re-enqueued");
                stats.retries_requeued += 1;
            }
            Err(e) => {
                error!(video_id = %item.video_id, error = %e, "retry enqueue failed");
                stats.errors += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use vidigest_models::{FailureReason, VideoId, VideoRecord, VideoStatus};
    use vidigest_queue::MemoryQueue;
    use vidigest_store::MemoryStore;

    fn failed_record(id: &str, reason: FailureReason, next_retry_at: Option<DateTime<Utc>>) -> VideoRecord {
        let mut record = VideoRecord::new_queued(
            VideoId::from(id),
            format!("Video {id}"),
            "UC1",
            "Chan",
            Utc::now(),
        );
        record.status = VideoStatus::Failed;
        record.failure_reason = Some(reason);
        record.retry_count = 1;
        record.next_retry_at = next_retry_at;
        record
    }

    #[tokio::test]
    async fn test_sweep_requeues_only_due_no_transcript_videos() {
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(MemoryQueue::new());
        let now = Utc::now();

        for record in [
            failed_record("due", FailureReason::NoTranscript, Some(now - Duration::hours(1))),
            failed_record("exact", FailureReason::NoTranscript, Some(now)),
            failed_record("future", FailureReason::NoTranscript, Some(now + Duration::days(1))),
            failed_record("disabled", FailureReason::TranscriptsDisabled, Some(now - Duration::hours(1))),
        ] {
            store.create_video_if_absent(&record).await.unwrap();
        }

        let store_dyn: Arc<dyn RecordStore> = store.clone();
        let queue_dyn: Arc<dyn WorkQueue> = queue.clone();
        let mut stats = PollStats::default();
        run_retry_sweep(&store_dyn, &queue_dyn, now, &mut stats).await;

        assert_eq!(stats.retries_requeued, 2);
        assert_eq!(queue.pending_len(), 2);

        let mut queued_ids: Vec<String> = queue
            .receive(10, 0)
            .await
            .unwrap()
            .iter()
            .map(|m| WorkItem::from_json(&m.body).unwrap().video_id.to_string())
            .collect();
        queued_ids.sort();
        assert_eq!(queued_ids, vec!["due", "exact"]);
    }

    #[tokio::test]
    async fn test_sweep_does_not_mutate_retry_bookkeeping() {
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(MemoryQueue::new());
        let now = Utc::now();

        let record = failed_record("due", FailureReason::NoTranscript, Some(now - Duration::hours(1)));
        store.create_video_if_absent(&record).await.unwrap();

        let store_dyn: Arc<dyn RecordStore> = store.clone();
        let queue_dyn: Arc<dyn WorkQueue> = queue.clone();
        let mut stats = PollStats::default();
        run_retry_sweep(&store_dyn, &queue_dyn, now, &mut stats).await;

        let stored = store.get_video(&VideoId::from("due")).await.unwrap().unwrap();
        assert_eq!(stored.retry_count, 1);
        assert_eq!(stored.status, VideoStatus::Failed);
        assert_eq!(stored.next_retry_at, record.next_retry_at);
    }
}
