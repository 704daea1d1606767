//! YouTube Data API v3 search client.

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::error::{PollerError, PollerResult};

const YOUTUBE_BASE_URL: &str = "https://www.googleapis.com";

/// Anti-flood window: only videos published within this many hours are
/// considered, so a fresh deployment never backfills a channel's history.
const LOOKBACK_HOURS: i64 = 24;

const MAX_RESULTS: u32 = 50;

/// One video returned by the video-list API.
#[derive(Debug, Clone)]
pub struct DiscoveredVideo {
    pub video_id: String,
    pub title: String,
    pub channel_title: String,
    pub published_at: DateTime<Utc>,
    pub description: String,
}

/// Seam over the video-list API so discovery can be tested without HTTP.
#[async_trait]
pub trait VideoLister: Send + Sync {
    /// Recent videos for one channel, newest first.
    async fn list_recent(&self, channel_id: &str) -> PollerResult<Vec<DiscoveredVideo>>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
struct SearchItemId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Snippet {
    title: String,
    #[serde(rename = "channelTitle")]
    channel_title: String,
    #[serde(rename = "publishedAt")]
    published_at: DateTime<Utc>,
    #[serde(default)]
    description: String,
}

/// YouTube Data API client.
pub struct YouTubeClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl YouTubeClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: YOUTUBE_BASE_URL.to_string(),
        }
    }

    /// Point the client at a different host. Test hook.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl VideoLister for YouTubeClient {
    async fn list_recent(&self, channel_id: &str) -> PollerResult<Vec<DiscoveredVideo>> {
        let published_after = (Utc::now() - Duration::hours(LOOKBACK_HOURS))
            .to_rfc3339_opts(SecondsFormat::Secs, true);
        let url = format!("{}/youtube/v3/search", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("channelId", channel_id),
                ("part", "snippet"),
                ("order", "date"),
                ("type", "video"),
                ("maxResults", &MAX_RESULTS.to_string()),
                ("publishedAfter", &published_after),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PollerError::api(format!("search returned {status}: {body}")));
        }

        let parsed: SearchResponse = response.json().await?;
        let videos: Vec<DiscoveredVideo> = parsed
            .items
            .into_iter()
            .filter_map(|item| {
                let video_id = item.id.video_id?;
                Some(DiscoveredVideo {
                    video_id,
                    title: item.snippet.title,
                    channel_title: item.snippet.channel_title,
                    published_at: item.snippet.published_at,
                    description: item.snippet.description,
                })
            })
            .collect();
        debug!(channel_id, count = videos.len(), "channel search complete");
        Ok(videos)
    }
}
