//! Digest compilation: the trailing-window, unsent-only summary selection.

use chrono::{DateTime, Duration, Utc};

use vidigest_models::SummaryRecord;
use vidigest_store::{RecordStore, StoreResult};

/// Trailing window for the weekly digest. The boundary is strict: a summary
/// exactly this old is excluded.
pub const DIGEST_WINDOW_DAYS: i64 = 7;

/// Summaries eligible for this week's digest: summarized within the window
/// and never included in a previous send.
pub async fn compile_digest(
    store: &dyn RecordStore,
    now: DateTime<Utc>,
) -> StoreResult<Vec<SummaryRecord>> {
    let since = now - Duration::days(DIGEST_WINDOW_DAYS);
    let recent = store.query_summaries_since(since).await?;
    Ok(recent
        .into_iter()
        .filter(|r| r.newsletter_sent_at.is_none())
        .collect())
}
