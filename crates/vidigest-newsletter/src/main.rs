//! Weekly digest binary. One pass per invocation: compile the unsent
//! summaries from the trailing week, render, send, and mark them sent.

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use tracing::{info, warn};

use vidigest_config::{init_tracing, load_email_config, EmailTransport, SsmParameters};
use vidigest_newsletter::{compile_digest, render_digest, Mailer, SesMailer, SmtpMailer};
use vidigest_store::{DynamoStore, RecordStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    dotenvy::dotenv().ok();
    init_tracing();

    info!("Starting vidigest-newsletter");

    let params = SsmParameters::from_env().await;
    let email = load_email_config(&params)
        .await
        .context("failed to load email config")?;

    let mailer: Arc<dyn Mailer> = match &email.transport {
        EmailTransport::Ses => Arc::new(SesMailer::from_env().await),
        EmailTransport::Gmail { app_password } => {
            Arc::new(SmtpMailer::gmail(&email.sender, app_password)?)
        }
    };

    let store = DynamoStore::from_env().await?;
    let now = Utc::now();

    let summaries = compile_digest(&store, now)
        .await
        .context("failed to compile digest")?;
    info!(count = summaries.len(), "compiled digest");

    // The digest goes out even when empty, so subscribers can tell the
    // pipeline is alive.
    let rendered = render_digest(&summaries, now);
    mailer
        .send(&email.sender, &email.destination, &rendered)
        .await
        .context("failed to send digest")?;
    info!(subject = %rendered.subject, to = %email.destination, "digest sent");

    // Mark after a successful send. A crash between send and mark means a
    // duplicate next week, which the sent-count surfaces.
    for summary in &summaries {
        if let Err(e) = store.mark_summary_sent(&summary.video_id, now).await {
            warn!(video_id = %summary.video_id, error = %e, "failed to mark summary sent");
        }
    }

    Ok(())
}
