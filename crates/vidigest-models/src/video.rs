//! Video record models.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length of the stored error diagnostic, in characters.
pub const MAX_ERROR_LEN: usize = 500;

/// How long a video record lives before the store's TTL reaper removes it.
pub const VIDEO_TTL_DAYS: i64 = 90;

/// Identifier for a video on the platform. Dedup key for the record store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(pub String);

impl VideoId {
    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VideoId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VideoId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Video processing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VideoStatus {
    /// Discovered and waiting on the work queue
    #[default]
    Queued,
    /// Summarized successfully (terminal)
    Processed,
    /// Failed; may carry a scheduled retry if the reason allows one
    Failed,
    /// Retries exhausted or otherwise unrecoverable (terminal)
    PermanentlyFailed,
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Queued => "QUEUED",
            VideoStatus::Processed => "PROCESSED",
            VideoStatus::Failed => "FAILED",
            VideoStatus::PermanentlyFailed => "PERMANENTLY_FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "QUEUED" => Some(VideoStatus::Queued),
            "PROCESSED" => Some(VideoStatus::Processed),
            "FAILED" => Some(VideoStatus::Failed),
            "PERMANENTLY_FAILED" => Some(VideoStatus::PermanentlyFailed),
            _ => None,
        }
    }
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a video failed processing. Closed set: the state machine branches
/// exhaustively on this, so new reasons must be added here first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    /// The fetch origin is blocked by the platform (infrastructure problem,
    /// not a per-video one)
    YoutubeBlocked,
    /// No usable transcript track right now; eligible for scheduled retries
    NoTranscript,
    /// NoTranscript retries used up (terminal)
    NoTranscriptExhausted,
    /// Uploader disabled captions (terminal)
    TranscriptsDisabled,
    /// Video is private, removed, or otherwise gone (terminal)
    VideoUnavailable,
    /// Anything we could not classify (terminal)
    Unknown,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::YoutubeBlocked => "YOUTUBE_BLOCKED",
            FailureReason::NoTranscript => "NO_TRANSCRIPT",
            FailureReason::NoTranscriptExhausted => "NO_TRANSCRIPT_EXHAUSTED",
            FailureReason::TranscriptsDisabled => "TRANSCRIPTS_DISABLED",
            FailureReason::VideoUnavailable => "VIDEO_UNAVAILABLE",
            FailureReason::Unknown => "UNKNOWN",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "YOUTUBE_BLOCKED" => Some(FailureReason::YoutubeBlocked),
            "NO_TRANSCRIPT" => Some(FailureReason::NoTranscript),
            "NO_TRANSCRIPT_EXHAUSTED" => Some(FailureReason::NoTranscriptExhausted),
            "TRANSCRIPTS_DISABLED" => Some(FailureReason::TranscriptsDisabled),
            "VIDEO_UNAVAILABLE" => Some(FailureReason::VideoUnavailable),
            "UNKNOWN" => Some(FailureReason::Unknown),
            _ => None,
        }
    }

    /// Only NO_TRANSCRIPT feeds the scheduled-retry path; every other reason
    /// is terminal the moment it is recorded.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FailureReason::NoTranscript)
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One record per discovered video, keyed by `video_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoRecord {
    pub video_id: VideoId,

    pub title: String,

    pub channel_id: String,

    pub channel_title: String,

    /// When the video was published on the platform
    pub published_at: DateTime<Utc>,

    #[serde(default)]
    pub status: VideoStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<FailureReason>,

    /// Failed NO_TRANSCRIPT attempts so far; only ever increases
    #[serde(default)]
    pub retry_count: u32,

    /// Set on the first NO_TRANSCRIPT failure and never overwritten
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_failed_at: Option<DateTime<Utc>>,

    /// Present iff status=FAILED with a NO_TRANSCRIPT retry pending
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_retry_at: Option<DateTime<Utc>>,

    pub queued_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<DateTime<Utc>>,

    /// Diagnostic from the last failure, truncated to [`MAX_ERROR_LEN`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Copied onto the video record on success for convenience; the
    /// authoritative copy lives in the summary record
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// First part of the platform description, carried from discovery
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Unix-seconds auto-delete watermark
    pub expiry: i64,
}

impl VideoRecord {
    /// Create a freshly discovered record in QUEUED state.
    pub fn new_queued(
        video_id: VideoId,
        title: impl Into<String>,
        channel_id: impl Into<String>,
        channel_title: impl Into<String>,
        published_at: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            video_id,
            title: title.into(),
            channel_id: channel_id.into(),
            channel_title: channel_title.into(),
            published_at,
            status: VideoStatus::Queued,
            failure_reason: None,
            retry_count: 0,
            first_failed_at: None,
            next_retry_at: None,
            queued_at: now,
            processed_at: None,
            failed_at: None,
            error: None,
            summary: None,
            description: None,
            expiry: (now + Duration::days(VIDEO_TTL_DAYS)).timestamp(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let d = description.into();
        if !d.is_empty() {
            self.description = Some(truncate_chars(&d, MAX_ERROR_LEN));
        }
        self
    }
}

/// Cut `s` at a character boundary, never mid-codepoint.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
