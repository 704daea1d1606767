//! Channel discovery poller binary. One pass per invocation: discover new
//! videos across the configured channels, then run the retry sweep.

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use tracing::info;

use vidigest_config::{init_tracing, keys, load_channel_list, Parameters, SsmParameters};
use vidigest_poller::{run_retry_sweep, DiscoveryRun, YouTubeClient};
use vidigest_queue::{SqsQueue, WorkQueue};
use vidigest_store::{DynamoStore, RecordStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    dotenvy::dotenv().ok();
    init_tracing();

    info!("Starting vidigest-poller");

    let params = SsmParameters::from_env().await;
    let channels = load_channel_list(&params)
        .await
        .context("failed to load channel list")?;
    let api_key = params
        .get(keys::YOUTUBE_API_KEY)
        .await
        .context("failed to load youtube api key")?;

    let store: Arc<dyn RecordStore> = Arc::new(DynamoStore::from_env().await?);
    let queue: Arc<dyn WorkQueue> = Arc::new(SqsQueue::from_env().await?);
    let lister = Arc::new(YouTubeClient::new(api_key));

    let discovery = DiscoveryRun::new(lister, store.clone(), queue.clone());
    let mut stats = discovery.run(&channels).await;

    run_retry_sweep(&store, &queue, Utc::now(), &mut stats).await;

    info!(stats = %serde_json::to_string(&stats)?, "poll complete");
    Ok(())
}
