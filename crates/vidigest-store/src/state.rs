//! Video state machine.
//!
//! Owns every status transition a video record can make:
//! QUEUED → PROCESSED, QUEUED → FAILED, FAILED(NO_TRANSCRIPT) →
//! FAILED(NO_TRANSCRIPT) with an incremented retry count, and
//! FAILED(NO_TRANSCRIPT) → PERMANENTLY_FAILED once retries run out.
//! Callers only classify outcomes; the bookkeeping lives here.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use vidigest_models::video::{truncate_chars, MAX_ERROR_LEN};
use vidigest_models::{
    FailureReason, RetryDecision, RetryPolicy, SummaryRecord, VideoId, VideoStatus,
};

use crate::error::StoreResult;
use crate::store::{RecordStore, VideoUpdate};

/// Metadata carried alongside a successful summary, taken from the queued
/// work item rather than re-read from the store.
#[derive(Debug, Clone)]
pub struct VideoDetails {
    pub title: String,
    pub channel_id: String,
    pub channel_title: String,
    pub published_at: DateTime<Utc>,
}

/// State-transition layer over a [`RecordStore`].
#[derive(Clone)]
pub struct VideoStateMachine {
    store: Arc<dyn RecordStore>,
    policy: RetryPolicy,
}

impl VideoStateMachine {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            policy: RetryPolicy,
        }
    }

    /// Record a processing failure for `video_id`.
    ///
    /// Non-NO_TRANSCRIPT reasons are terminal: one write, no retry
    /// bookkeeping. NO_TRANSCRIPT consults the retry policy and either
    /// schedules the next attempt or marks the video permanently failed.
    ///
    /// Queue redelivery can apply the same failure twice, double-counting a
    /// retry. That miscount is accepted rather than guarded; the decision
    /// logic stays Exhausted for any count at or past the budget.
    pub async fn record_failure(
        &self,
        video_id: &VideoId,
        error: &str,
        reason: FailureReason,
    ) -> StoreResult<()> {
        let now = Utc::now();
        let error = truncate_chars(error, MAX_ERROR_LEN);

        if reason != FailureReason::NoTranscript {
            warn!(video_id = %video_id, reason = %reason, "recording terminal failure");
            return self
                .store
                .update_video(
                    video_id,
                    VideoUpdate {
                        status: Some(VideoStatus::Failed),
                        failure_reason: Some(reason),
                        failed_at: Some(now),
                        error: Some(error),
                        ..Default::default()
                    },
                )
                .await;
        }

        let current_count = self
            .store
            .get_video(video_id)
            .await?
            .map(|r| r.retry_count)
            .unwrap_or(0);

        match self.policy.decide(current_count, now) {
            RetryDecision::Exhausted { retry_count } => {
                warn!(
                    video_id = %video_id,
                    retry_count,
                    "transcript retries exhausted, marking permanently failed"
                );
                self.store
                    .update_video(
                        video_id,
                        VideoUpdate {
                            status: Some(VideoStatus::PermanentlyFailed),
                            failure_reason: Some(FailureReason::NoTranscriptExhausted),
                            retry_count: Some(retry_count),
                            first_failed_at_if_absent: Some(now),
                            clear_next_retry: true,
                            failed_at: Some(now),
                            error: Some(error),
                            ..Default::default()
                        },
                    )
                    .await
            }
            RetryDecision::Schedule {
                retry_count,
                next_retry_at,
            } => {
                info!(
                    video_id = %video_id,
                    retry_count,
                    next_retry_at = %next_retry_at,
                    "no transcript yet, retry scheduled"
                );
                self.store
                    .update_video(
                        video_id,
                        VideoUpdate {
                            status: Some(VideoStatus::Failed),
                            failure_reason: Some(FailureReason::NoTranscript),
                            retry_count: Some(retry_count),
                            first_failed_at_if_absent: Some(now),
                            next_retry_at: Some(next_retry_at),
                            failed_at: Some(now),
                            error: Some(error),
                            ..Default::default()
                        },
                    )
                    .await
            }
        }
    }

    /// Record a successful summarization: flips the video record to
    /// PROCESSED and writes the summary record the digest reads from.
    pub async fn record_success(
        &self,
        video_id: &VideoId,
        details: &VideoDetails,
        summary: &str,
    ) -> StoreResult<()> {
        let now = Utc::now();
        self.store
            .update_video(
                video_id,
                VideoUpdate {
                    status: Some(VideoStatus::Processed),
                    processed_at: Some(now),
                    summary: Some(summary.to_string()),
                    ..Default::default()
                },
            )
            .await?;

        let record = SummaryRecord::new(
            video_id.clone(),
            details.title.clone(),
            details.channel_id.clone(),
            details.channel_title.clone(),
            details.published_at,
            summary,
        );
        self.store.put_summary(&record).await?;
        info!(video_id = %video_id, "video processed and summary saved");
        Ok(())
    }
}
