//! Summary record models.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::video::{VideoId, VIDEO_TTL_DAYS};

/// One record per successfully summarized video. Lives independently of the
/// originating video record once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub video_id: VideoId,

    pub title: String,

    pub channel_id: String,

    pub channel_title: String,

    pub published_at: DateTime<Utc>,

    /// LLM-produced summary text (Markdown)
    pub summary: String,

    /// Secondary-index sort key for date-ordered digest queries
    pub summarized_at: DateTime<Utc>,

    /// Set on the first digest send that includes this summary, never after
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newsletter_sent_at: Option<DateTime<Utc>>,

    /// Incremented on every send; a value above 1 means a duplicate-send bug
    #[serde(default)]
    pub newsletter_sent_count: u32,

    /// Unix-seconds auto-delete watermark
    pub expiry: i64,
}

impl SummaryRecord {
    pub fn new(
        video_id: VideoId,
        title: impl Into<String>,
        channel_id: impl Into<String>,
        channel_title: impl Into<String>,
        published_at: DateTime<Utc>,
        summary: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            video_id,
            title: title.into(),
            channel_id: channel_id.into(),
            channel_title: channel_title.into(),
            published_at,
            summary: summary.into(),
            summarized_at: now,
            newsletter_sent_at: None,
            newsletter_sent_count: 0,
            expiry: (now + Duration::days(VIDEO_TTL_DAYS)).timestamp(),
        }
    }
}
