//! Channel discovery, dedup, and the scheduled-retry sweep.

pub mod discover;
pub mod error;
pub mod sweep;
pub mod youtube;

pub use discover::{DiscoveryRun, PollStats};
pub use error::{PollerError, PollerResult};
pub use sweep::run_retry_sweep;
pub use youtube::{DiscoveredVideo, VideoLister, YouTubeClient};
