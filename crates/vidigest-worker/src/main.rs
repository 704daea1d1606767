//! Summary pipeline worker binary.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{error, info, warn};

use vidigest_config::{
    init_tracing, keys, load_llm_config, LlmProvider, Parameters, ProxyConfig, SsmParameters,
};
use vidigest_queue::{SqsQueue, WorkQueue};
use vidigest_store::{DynamoStore, RecordStore, VideoStateMachine};
use vidigest_worker::{
    FetchThrottle, GeminiClient, GroqClient, Pipeline, Summarizer, TranscriptFetcher,
    WorkerConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    dotenvy::dotenv().ok();
    init_tracing();

    info!("Starting vidigest-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    let params = SsmParameters::from_env().await;
    let llm_config = load_llm_config(&params)
        .await
        .context("failed to load llm config")?;
    let api_key = params
        .get(keys::LLM_API_KEY)
        .await
        .context("failed to load llm api key")?;

    let summarizer: Arc<dyn Summarizer> = match llm_config.provider {
        LlmProvider::Gemini => Arc::new(GeminiClient::new(
            api_key,
            llm_config.model.clone(),
            llm_config.language.clone(),
        )),
        LlmProvider::Groq => Arc::new(GroqClient::new(
            api_key,
            llm_config.model.clone(),
            llm_config.language.clone(),
        )),
    };

    let proxy = ProxyConfig::from_env();
    if proxy.is_none() {
        info!("no proxy configured, fetching transcripts directly");
    }
    let throttle = Arc::new(FetchThrottle::with_default_interval());
    let fetcher = Arc::new(TranscriptFetcher::new(
        throttle,
        proxy.map(|p| p.url),
        llm_config.language.clone(),
    ));

    let store = Arc::new(DynamoStore::from_env().await?);
    let queue = SqsQueue::from_env().await?;
    let state = VideoStateMachine::new(store as Arc<dyn RecordStore>);
    let pipeline = Pipeline::new(fetcher, summarizer, state);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
            batch = queue.receive(config.batch_size, config.wait_seconds) => {
                let messages = match batch {
                    Ok(messages) => messages,
                    Err(e) => {
                        error!("Failed to receive batch: {}", e);
                        tokio::time::sleep(Duration::from_secs(5)).await;
                        continue;
                    }
                };
                if messages.is_empty() {
                    if config.run_once {
                        info!("Queue drained, exiting");
                        break;
                    }
                    continue;
                }

                info!(count = messages.len(), "processing batch");
                let outcome = pipeline.process_batch(&messages).await;
                for message in &messages {
                    if outcome.is_failed(&message.message_id) {
                        // left on the queue for redelivery via visibility timeout
                        continue;
                    }
                    if let Err(e) = queue.acknowledge(&message.receipt_handle).await {
                        warn!(
                            message_id = %message.message_id,
                            error = %e,
                            "failed to acknowledge message"
                        );
                    }
                }
                if !outcome.failed.is_empty() {
                    warn!(failed = outcome.failed.len(), "batch items left for redelivery");
                }
            }
        }
    }

    info!("Worker shutdown complete");
    Ok(())
}
