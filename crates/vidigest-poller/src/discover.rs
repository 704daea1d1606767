//! Channel discovery with idempotent dedup.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use vidigest_models::{VideoId, VideoRecord};
use vidigest_queue::{WorkItem, WorkQueue};
use vidigest_store::RecordStore;

use crate::youtube::VideoLister;

/// Aggregate counters for one poll run; the only user-visible surface.
#[derive(Debug, Default, Serialize)]
pub struct PollStats {
    pub channels_checked: u32,
    pub videos_found: u32,
    pub videos_queued: u32,
    pub videos_skipped: u32,
    pub retries_requeued: u32,
    pub errors: u32,
}

/// One discovery pass over the configured channels.
pub struct DiscoveryRun {
    lister: Arc<dyn VideoLister>,
    store: Arc<dyn RecordStore>,
    queue: Arc<dyn WorkQueue>,
}

impl DiscoveryRun {
    pub fn new(
        lister: Arc<dyn VideoLister>,
        store: Arc<dyn RecordStore>,
        queue: Arc<dyn WorkQueue>,
    ) -> Self {
        Self {
            lister,
            store,
            queue,
        }
    }

    /// Poll every channel, create-and-enqueue the videos we have not seen.
    /// A failing channel contributes zero videos and never aborts the run.
    pub async fn run(&self, channels: &[String]) -> PollStats {
        let mut stats = PollStats::default();

        for channel_id in channels {
            stats.channels_checked += 1;
            let videos = match self.lister.list_recent(channel_id).await {
                Ok(videos) => videos,
                Err(e) => {
                    warn!(channel_id = %channel_id, error = %e, "channel search failed, skipping");
                    stats.errors += 1;
                    continue;
                }
            };
            stats.videos_found += videos.len() as u32;

            for video in videos {
                let record = VideoRecord::new_queued(
                    VideoId::from_string(&video.video_id),
                    video.title.clone(),
                    channel_id.clone(),
                    video.channel_title.clone(),
                    video.published_at,
                )
                .with_description(&video.description);

                match self.store.create_video_if_absent(&record).await {
                    Ok(true) => {
                        let item = WorkItem {
                            video_id: record.video_id.clone(),
                            title: record.title.clone(),
                            channel_id: record.channel_id.clone(),
                            channel_title: record.channel_title.clone(),
                            published_at: record.published_at,
                        };
                        match self.queue.enqueue(&item).await {
                            Ok(()) => {
                                info!(video_id = %record.video_id, title = %record.title, "new video queued");
                                stats.videos_queued += 1;
                            }
                            Err(e) => {
                                // the record stays QUEUED but unenqueued;
                                // known gap, no rollback
                                error!(video_id = %record.video_id, error = %e, "enqueue failed after create");
                                stats.errors += 1;
                            }
                        }
                    }
                    Ok(false) => {
                        stats.videos_skipped += 1;
                    }
                    Err(e) => {
                        error!(video_id = %record.video_id, error = %e, "create failed");
                        stats.errors += 1;
                    }
                }
            }
        }

        stats
    }
}
