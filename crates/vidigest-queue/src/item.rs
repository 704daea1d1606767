//! The work item payload exchanged between poller and worker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vidigest_models::VideoId;

/// One unit of work: a video to fetch, summarize, and persist.
///
/// The retry sweep synthesizes these from stored records, so the metadata
/// fields may be placeholders; only `video_id` is load-bearing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub video_id: VideoId,
    pub title: String,
    pub channel_id: String,
    pub channel_title: String,
    pub published_at: DateTime<Utc>,
}

impl WorkItem {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(body: &str) -> serde_json::Result<Self> {
        serde_json::from_str(body)
    }
}
