//! Cleanup sweep binary. One pass per invocation: delete permanently
//! failed records past the retention cutoff.

use anyhow::Context;
use chrono::Utc;
use tracing::info;

use vidigest_cleanup::run_cleanup;
use vidigest_config::init_tracing;
use vidigest_store::DynamoStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    dotenvy::dotenv().ok();
    init_tracing();

    info!("Starting vidigest-cleanup");

    let store = DynamoStore::from_env()
        .await
        .context("failed to initialize store")?;
    let stats = run_cleanup(&store, Utc::now()).await;

    info!(stats = %serde_json::to_string(&stats)?, "cleanup complete");
    Ok(())
}
