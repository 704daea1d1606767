//! In-memory record store for tests and local runs.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use vidigest_models::{FailureReason, SummaryRecord, VideoId, VideoRecord, VideoStatus};

use crate::error::{StoreError, StoreResult};
use crate::store::{CleanupCandidate, RecordStore, RetryCandidate, VideoUpdate};

/// HashMap-backed [`RecordStore`]. Mirrors the conditional-write and
/// set-if-absent semantics of the DynamoDB implementation.
#[derive(Default)]
pub struct MemoryStore {
    videos: Mutex<HashMap<VideoId, VideoRecord>>,
    summaries: Mutex<HashMap<VideoId, SummaryRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of video records currently held. Test helper.
    pub fn video_count(&self) -> usize {
        self.videos.lock().unwrap().len()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get_video(&self, video_id: &VideoId) -> StoreResult<Option<VideoRecord>> {
        Ok(self.videos.lock().unwrap().get(video_id).cloned())
    }

    async fn create_video_if_absent(&self, record: &VideoRecord) -> StoreResult<bool> {
        let mut videos = self.videos.lock().unwrap();
        if videos.contains_key(&record.video_id) {
            return Ok(false);
        }
        videos.insert(record.video_id.clone(), record.clone());
        Ok(true)
    }

    async fn update_video(&self, video_id: &VideoId, update: VideoUpdate) -> StoreResult<()> {
        let mut videos = self.videos.lock().unwrap();
        let record = videos
            .get_mut(video_id)
            .ok_or_else(|| StoreError::not_found(video_id.as_str()))?;
        if let Some(status) = update.status {
            record.status = status;
        }
        if let Some(reason) = update.failure_reason {
            record.failure_reason = Some(reason);
        }
        if let Some(count) = update.retry_count {
            record.retry_count = count;
        }
        if let Some(ts) = update.first_failed_at_if_absent {
            record.first_failed_at.get_or_insert(ts);
        }
        if let Some(ts) = update.next_retry_at {
            record.next_retry_at = Some(ts);
        } else if update.clear_next_retry {
            record.next_retry_at = None;
        }
        if let Some(ts) = update.failed_at {
            record.failed_at = Some(ts);
        }
        if let Some(ts) = update.processed_at {
            record.processed_at = Some(ts);
        }
        if let Some(summary) = update.summary {
            record.summary = Some(summary);
        }
        if let Some(error) = update.error {
            record.error = Some(error);
        }
        Ok(())
    }

    async fn put_summary(&self, record: &SummaryRecord) -> StoreResult<()> {
        self.summaries
            .lock()
            .unwrap()
            .insert(record.video_id.clone(), record.clone());
        Ok(())
    }

    async fn get_summary(&self, video_id: &VideoId) -> StoreResult<Option<SummaryRecord>> {
        Ok(self.summaries.lock().unwrap().get(video_id).cloned())
    }

    async fn mark_summary_sent(
        &self,
        video_id: &VideoId,
        sent_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut summaries = self.summaries.lock().unwrap();
        let record = summaries
            .get_mut(video_id)
            .ok_or_else(|| StoreError::not_found(video_id.as_str()))?;
        record.newsletter_sent_at.get_or_insert(sent_at);
        record.newsletter_sent_count += 1;
        Ok(())
    }

    async fn scan_retryable(&self, now: DateTime<Utc>) -> StoreResult<Vec<RetryCandidate>> {
        let videos = self.videos.lock().unwrap();
        Ok(videos
            .values()
            .filter(|r| {
                r.status == VideoStatus::Failed
                    && r.failure_reason == Some(FailureReason::NoTranscript)
                    && r.next_retry_at.is_some_and(|ts| ts <= now)
            })
            .map(|r| RetryCandidate {
                video_id: r.video_id.clone(),
                title: Some(r.title.clone()),
                channel_id: Some(r.channel_id.clone()),
                channel_title: Some(r.channel_title.clone()),
                published_at: Some(r.published_at),
            })
            .collect())
    }

    async fn scan_permanently_failed(&self) -> StoreResult<Vec<CleanupCandidate>> {
        let videos = self.videos.lock().unwrap();
        Ok(videos
            .values()
            .filter(|r| r.status == VideoStatus::PermanentlyFailed)
            .map(|r| CleanupCandidate {
                video_id: r.video_id.clone(),
                first_failed_at: r.first_failed_at,
            })
            .collect())
    }

    async fn query_summaries_since(
        &self,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<SummaryRecord>> {
        let summaries = self.summaries.lock().unwrap();
        let mut out: Vec<SummaryRecord> = summaries
            .values()
            .filter(|r| r.summarized_at > since)
            .cloned()
            .collect();
        out.sort_by_key(|r| r.summarized_at);
        Ok(out)
    }

    async fn delete_video(&self, video_id: &VideoId) -> StoreResult<()> {
        self.videos.lock().unwrap().remove(video_id);
        Ok(())
    }

    async fn delete_summary(&self, video_id: &VideoId) -> StoreResult<()> {
        self.summaries.lock().unwrap().remove(video_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn queued(id: &str) -> VideoRecord {
        VideoRecord::new_queued(VideoId::from(id), "Title", "UC1", "Channel", Utc::now())
    }

    #[tokio::test]
    async fn test_create_if_absent_dedups() {
        let store = MemoryStore::new();
        let first = queued("abc123");
        assert!(store.create_video_if_absent(&first).await.unwrap());

        // second create with fresh timestamps must lose and leave the
        // original untouched
        let second = queued("abc123");
        assert!(!store.create_video_if_absent(&second).await.unwrap());
        let stored = store
            .get_video(&VideoId::from("abc123"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.queued_at, first.queued_at);
        assert_eq!(store.video_count(), 1);
    }

    #[tokio::test]
    async fn test_first_failed_at_set_once() {
        let store = MemoryStore::new();
        store.create_video_if_absent(&queued("v1")).await.unwrap();
        let id = VideoId::from("v1");
        let first = Utc::now();
        store
            .update_video(
                &id,
                VideoUpdate {
                    first_failed_at_if_absent: Some(first),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        store
            .update_video(
                &id,
                VideoUpdate {
                    first_failed_at_if_absent: Some(first + Duration::days(1)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let stored = store.get_video(&id).await.unwrap().unwrap();
        assert_eq!(stored.first_failed_at, Some(first));
    }

    #[tokio::test]
    async fn test_mark_sent_idempotent_marker_counting_sends() {
        let store = MemoryStore::new();
        let summary = SummaryRecord::new(
            VideoId::from("v1"),
            "Title",
            "UC1",
            "Channel",
            Utc::now(),
            "text",
        );
        store.put_summary(&summary).await.unwrap();
        let id = VideoId::from("v1");

        let first_send = Utc::now();
        store.mark_summary_sent(&id, first_send).await.unwrap();
        store
            .mark_summary_sent(&id, first_send + Duration::hours(1))
            .await
            .unwrap();

        let stored = store.get_summary(&id).await.unwrap().unwrap();
        assert_eq!(stored.newsletter_sent_at, Some(first_send));
        assert_eq!(stored.newsletter_sent_count, 2);
    }

    #[tokio::test]
    async fn test_scan_retryable_selection() {
        let store = MemoryStore::new();
        let now = Utc::now();

        let mut due = queued("due");
        due.status = VideoStatus::Failed;
        due.failure_reason = Some(FailureReason::NoTranscript);
        due.next_retry_at = Some(now - Duration::hours(1));
        store.create_video_if_absent(&due).await.unwrap();

        let mut future = queued("future");
        future.status = VideoStatus::Failed;
        future.failure_reason = Some(FailureReason::NoTranscript);
        future.next_retry_at = Some(now + Duration::days(1));
        store.create_video_if_absent(&future).await.unwrap();

        let mut wrong_reason = queued("disabled");
        wrong_reason.status = VideoStatus::Failed;
        wrong_reason.failure_reason = Some(FailureReason::TranscriptsDisabled);
        wrong_reason.next_retry_at = Some(now - Duration::hours(1));
        store.create_video_if_absent(&wrong_reason).await.unwrap();

        let candidates = store.scan_retryable(now).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].video_id.as_str(), "due");
    }

    #[tokio::test]
    async fn test_query_summaries_boundary_is_strict() {
        let store = MemoryStore::new();
        let now: DateTime<Utc> = "2024-01-15T00:00:00Z".parse().unwrap();
        let since = now - Duration::days(7);

        let mut inside = SummaryRecord::new(
            VideoId::from("in"),
            "Title",
            "UC1",
            "Channel",
            now,
            "text",
        );
        inside.summarized_at = "2024-01-08T00:00:01Z".parse().unwrap();
        store.put_summary(&inside).await.unwrap();

        let mut outside = SummaryRecord::new(
            VideoId::from("out"),
            "Title",
            "UC1",
            "Channel",
            now,
            "text",
        );
        outside.summarized_at = "2024-01-07T23:59:59Z".parse().unwrap();
        store.put_summary(&outside).await.unwrap();

        let mut exact = SummaryRecord::new(
            VideoId::from("exact"),
            "Title",
            "UC1",
            "Channel",
            now,
            "text",
        );
        exact.summarized_at = "2024-01-08T00:00:00Z".parse().unwrap();
        store.put_summary(&exact).await.unwrap();

        let found = store.query_summaries_since(since).await.unwrap();
        let ids: Vec<&str> = found.iter().map(|r| r.video_id.as_str()).collect();
        assert_eq!(ids, vec!["in"]);
    }

    #[tokio::test]
    async fn test_deletes_tolerate_absence() {
        let store = MemoryStore::new();
        store.delete_video(&VideoId::from("ghost")).await.unwrap();
        store.delete_summary(&VideoId::from("ghost")).await.unwrap();
    }
}
