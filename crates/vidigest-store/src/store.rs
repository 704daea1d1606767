//! The record store contract consumed by the rest of the pipeline.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use vidigest_models::{FailureReason, SummaryRecord, VideoId, VideoRecord, VideoStatus};

use crate::error::StoreResult;

/// Partial update against a video record.
///
/// Unset fields are left untouched. `first_failed_at_if_absent` only applies
/// when the stored attribute is missing, and `clear_next_retry` removes the
/// attribute entirely so "retry pending" stays equivalent to "attribute
/// present".
#[derive(Debug, Clone, Default)]
pub struct VideoUpdate {
    pub status: Option<VideoStatus>,
    pub failure_reason: Option<FailureReason>,
    pub retry_count: Option<u32>,
    pub first_failed_at_if_absent: Option<DateTime<Utc>>,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub clear_next_retry: bool,
    pub failed_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub summary: Option<String>,
    pub error: Option<String>,
}

impl VideoUpdate {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.failure_reason.is_none()
            && self.retry_count.is_none()
            && self.first_failed_at_if_absent.is_none()
            && self.next_retry_at.is_none()
            && !self.clear_next_retry
            && self.failed_at.is_none()
            && self.processed_at.is_none()
            && self.summary.is_none()
            && self.error.is_none()
    }
}

/// A FAILED/NO_TRANSCRIPT record whose scheduled retry has come due.
/// Projected to the fields the re-enqueue sweep needs.
#[derive(Debug, Clone)]
pub struct RetryCandidate {
    pub video_id: VideoId,
    pub title: Option<String>,
    pub channel_id: Option<String>,
    pub channel_title: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

/// A PERMANENTLY_FAILED record, projected for the age-gated cleanup sweep.
#[derive(Debug, Clone)]
pub struct CleanupCandidate {
    pub video_id: VideoId,
    pub first_failed_at: Option<DateTime<Utc>>,
}

/// Key-value store contract: video records, summary records, and one
/// date-ordered secondary index over summaries.
///
/// All writes are visible to subsequent reads against the same key within
/// one invocation; implementations must use a strongly consistent read path
/// where the backing store is eventually consistent by default.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get_video(&self, video_id: &VideoId) -> StoreResult<Option<VideoRecord>>;

    /// Conditional create. Returns true if the record was created, false if
    /// one already existed for this key. The existing record is never
    /// touched; a false return is the dedup signal, not an error.
    async fn create_video_if_absent(&self, record: &VideoRecord) -> StoreResult<bool>;

    async fn update_video(&self, video_id: &VideoId, update: VideoUpdate) -> StoreResult<()>;

    /// Unconditional put. Re-processing a video overwrites its summary,
    /// which only happens under manual intervention.
    async fn put_summary(&self, record: &SummaryRecord) -> StoreResult<()>;

    async fn get_summary(&self, video_id: &VideoId) -> StoreResult<Option<SummaryRecord>>;

    /// Idempotent sent-marking: `newsletter_sent_at` is set only if absent,
    /// `newsletter_sent_count` increments on every call.
    async fn mark_summary_sent(&self, video_id: &VideoId, sent_at: DateTime<Utc>)
        -> StoreResult<()>;

    /// Records with status=FAILED, failure_reason=NO_TRANSCRIPT and
    /// next_retry_at <= `now`. Pages internally; no bound on result size.
    async fn scan_retryable(&self, now: DateTime<Utc>) -> StoreResult<Vec<RetryCandidate>>;

    /// All PERMANENTLY_FAILED records. Pages internally.
    async fn scan_permanently_failed(&self) -> StoreResult<Vec<CleanupCandidate>>;

    /// Summaries with summarized_at strictly greater than `since`, ordered
    /// by summarized_at ascending.
    async fn query_summaries_since(&self, since: DateTime<Utc>)
        -> StoreResult<Vec<SummaryRecord>>;

    /// Idempotent delete; absent keys are not an error.
    async fn delete_video(&self, video_id: &VideoId) -> StoreResult<()>;

    /// Idempotent delete; absent keys are not an error.
    async fn delete_summary(&self, video_id: &VideoId) -> StoreResult<()>;
}
