//! DynamoDB-backed record store.
//!
//! Single-table layout: video records at `VIDEO#<id>` / `METADATA`, summary
//! records at `SUMMARY#<id>` / `DATA`. GSI1 keys summaries under a constant
//! partition (`gsi1pk = "SUMMARY"`) with `gsi1sk = summarized_at`, giving the
//! digest its date-ordered query. Timestamps are stored as fixed-width
//! RFC 3339 UTC strings so range comparisons work lexicographically.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::debug;

use vidigest_models::{
    FailureReason, SummaryRecord, VideoId, VideoRecord, VideoStatus,
};

use crate::error::{StoreError, StoreResult};
use crate::metrics;
use crate::store::{CleanupCandidate, RecordStore, RetryCandidate, VideoUpdate};

const SUMMARY_INDEX: &str = "gsi1";
const SUMMARY_PARTITION: &str = "SUMMARY";

/// DynamoDB implementation of [`RecordStore`].
#[derive(Clone)]
pub struct DynamoStore {
    client: Client,
    table: String,
}

impl DynamoStore {
    pub fn new(client: Client, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }

    /// Build a store from ambient AWS configuration and `TABLE_NAME`.
    pub async fn from_env() -> StoreResult<Self> {
        let table = std::env::var("TABLE_NAME")
            .map_err(|_| StoreError::request_failed("TABLE_NAME is not set"))?;
        let config = aws_config::load_from_env().await;
        Ok(Self::new(Client::new(&config), table))
    }

    fn video_key(video_id: &VideoId) -> (AttributeValue, AttributeValue) {
        (
            AttributeValue::S(format!("VIDEO#{video_id}")),
            AttributeValue::S("METADATA".to_string()),
        )
    }

    fn summary_key(video_id: &VideoId) -> (AttributeValue, AttributeValue) {
        (
            AttributeValue::S(format!("SUMMARY#{video_id}")),
            AttributeValue::S("DATA".to_string()),
        )
    }
}

fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn av_s(s: impl Into<String>) -> AttributeValue {
    AttributeValue::S(s.into())
}

fn av_n(n: impl ToString) -> AttributeValue {
    AttributeValue::N(n.to_string())
}

fn get_s(item: &HashMap<String, AttributeValue>, key: &str) -> Option<String> {
    item.get(key).and_then(|v| v.as_s().ok()).cloned()
}

fn get_ts(item: &HashMap<String, AttributeValue>, key: &str) -> Option<DateTime<Utc>> {
    get_s(item, key)
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn get_u32(item: &HashMap<String, AttributeValue>, key: &str) -> Option<u32> {
    item.get(key)
        .and_then(|v| v.as_n().ok())
        .and_then(|n| n.parse().ok())
}

fn get_i64(item: &HashMap<String, AttributeValue>, key: &str) -> Option<i64> {
    item.get(key)
        .and_then(|v| v.as_n().ok())
        .and_then(|n| n.parse().ok())
}

fn require_s(item: &HashMap<String, AttributeValue>, key: &str) -> StoreResult<String> {
    get_s(item, key).ok_or_else(|| StoreError::malformed_item(format!("missing {key}")))
}

fn require_ts(item: &HashMap<String, AttributeValue>, key: &str) -> StoreResult<DateTime<Utc>> {
    get_ts(item, key).ok_or_else(|| StoreError::malformed_item(format!("bad timestamp {key}")))
}

fn marshal_video(record: &VideoRecord) -> HashMap<String, AttributeValue> {
    let (pk, sk) = DynamoStore::video_key(&record.video_id);
    let mut item = HashMap::from([
        ("pk".to_string(), pk),
        ("sk".to_string(), sk),
        ("video_id".to_string(), av_s(record.video_id.as_str())),
        ("title".to_string(), av_s(&record.title)),
        ("channel_id".to_string(), av_s(&record.channel_id)),
        ("channel_title".to_string(), av_s(&record.channel_title)),
        ("published_at".to_string(), av_s(fmt_ts(record.published_at))),
        ("status".to_string(), av_s(record.status.as_str())),
        ("retry_count".to_string(), av_n(record.retry_count)),
        ("queued_at".to_string(), av_s(fmt_ts(record.queued_at))),
        ("expiry".to_string(), av_n(record.expiry)),
    ]);
    if let Some(reason) = record.failure_reason {
        item.insert("failure_reason".to_string(), av_s(reason.as_str()));
    }
    if let Some(ts) = record.first_failed_at {
        item.insert("first_failed_at".to_string(), av_s(fmt_ts(ts)));
    }
    if let Some(ts) = record.next_retry_at {
        item.insert("next_retry_at".to_string(), av_s(fmt_ts(ts)));
    }
    if let Some(ts) = record.processed_at {
        item.insert("processed_at".to_string(), av_s(fmt_ts(ts)));
    }
    if let Some(ts) = record.failed_at {
        item.insert("failed_at".to_string(), av_s(fmt_ts(ts)));
    }
    if let Some(ref error) = record.error {
        item.insert("error".to_string(), av_s(error));
    }
    if let Some(ref summary) = record.summary {
        item.insert("summary".to_string(), av_s(summary));
    }
    if let Some(ref description) = record.description {
        item.insert("description".to_string(), av_s(description));
    }
    item
}

fn unmarshal_video(item: &HashMap<String, AttributeValue>) -> StoreResult<VideoRecord> {
    let status_str = require_s(item, "status")?;
    let status = VideoStatus::parse(&status_str)
        .ok_or_else(|| StoreError::malformed_item(format!("unknown status {status_str}")))?;
    Ok(VideoRecord {
        video_id: VideoId::from_string(require_s(item, "video_id")?),
        title: require_s(item, "title")?,
        channel_id: get_s(item, "channel_id").unwrap_or_default(),
        channel_title: get_s(item, "channel_title").unwrap_or_default(),
        published_at: require_ts(item, "published_at")?,
        status,
        failure_reason: get_s(item, "failure_reason")
            .and_then(|s| FailureReason::parse(&s)),
        retry_count: get_u32(item, "retry_count").unwrap_or(0),
        first_failed_at: get_ts(item, "first_failed_at"),
        next_retry_at: get_ts(item, "next_retry_at"),
        queued_at: require_ts(item, "queued_at")?,
        processed_at: get_ts(item, "processed_at"),
        failed_at: get_ts(item, "failed_at"),
        error: get_s(item, "error"),
        summary: get_s(item, "summary"),
        description: get_s(item, "description"),
        expiry: get_i64(item, "expiry").unwrap_or(0),
    })
}

fn marshal_summary(record: &SummaryRecord) -> HashMap<String, AttributeValue> {
    let (pk, sk) = DynamoStore::summary_key(&record.video_id);
    let mut item = HashMap::from([
        ("pk".to_string(), pk),
        ("sk".to_string(), sk),
        ("gsi1pk".to_string(), av_s(SUMMARY_PARTITION)),
        ("gsi1sk".to_string(), av_s(fmt_ts(record.summarized_at))),
        ("video_id".to_string(), av_s(record.video_id.as_str())),
        ("title".to_string(), av_s(&record.title)),
        ("channel_id".to_string(), av_s(&record.channel_id)),
        ("channel_title".to_string(), av_s(&record.channel_title)),
        ("published_at".to_string(), av_s(fmt_ts(record.published_at))),
        ("summary".to_string(), av_s(&record.summary)),
        ("summarized_at".to_string(), av_s(fmt_ts(record.summarized_at))),
        (
            "newsletter_sent_count".to_string(),
            av_n(record.newsletter_sent_count),
        ),
        ("expiry".to_string(), av_n(record.expiry)),
    ]);
    if let Some(ts) = record.newsletter_sent_at {
        item.insert("newsletter_sent_at".to_string(), av_s(fmt_ts(ts)));
    }
    item
}

fn unmarshal_summary(item: &HashMap<String, AttributeValue>) -> StoreResult<SummaryRecord> {
    Ok(SummaryRecord {
        video_id: VideoId::from_string(require_s(item, "video_id")?),
        title: require_s(item, "title")?,
        channel_id: get_s(item, "channel_id").unwrap_or_default(),
        channel_title: get_s(item, "channel_title").unwrap_or_default(),
        published_at: require_ts(item, "published_at")?,
        summary: require_s(item, "summary")?,
        summarized_at: require_ts(item, "summarized_at")?,
        newsletter_sent_at: get_ts(item, "newsletter_sent_at"),
        newsletter_sent_count: get_u32(item, "newsletter_sent_count").unwrap_or(0),
        expiry: get_i64(item, "expiry").unwrap_or(0),
    })
}

/// Build a DynamoDB update expression from a [`VideoUpdate`].
fn build_update_expression(
    update: &VideoUpdate,
) -> (
    String,
    HashMap<String, String>,
    HashMap<String, AttributeValue>,
) {
    let mut sets: Vec<String> = Vec::new();
    let mut names: HashMap<String, String> = HashMap::new();
    let mut values: HashMap<String, AttributeValue> = HashMap::new();

    if let Some(status) = update.status {
        sets.push("#st = :st".to_string());
        names.insert("#st".to_string(), "status".to_string());
        values.insert(":st".to_string(), av_s(status.as_str()));
    }
    if let Some(reason) = update.failure_reason {
        sets.push("failure_reason = :fr".to_string());
        values.insert(":fr".to_string(), av_s(reason.as_str()));
    }
    if let Some(count) = update.retry_count {
        sets.push("retry_count = :rc".to_string());
        values.insert(":rc".to_string(), av_n(count));
    }
    if let Some(ts) = update.first_failed_at_if_absent {
        sets.push("first_failed_at = if_not_exists(first_failed_at, :ffa)".to_string());
        values.insert(":ffa".to_string(), av_s(fmt_ts(ts)));
    }
    if let Some(ts) = update.next_retry_at {
        sets.push("next_retry_at = :nra".to_string());
        values.insert(":nra".to_string(), av_s(fmt_ts(ts)));
    }
    if let Some(ts) = update.failed_at {
        sets.push("failed_at = :fa".to_string());
        values.insert(":fa".to_string(), av_s(fmt_ts(ts)));
    }
    if let Some(ts) = update.processed_at {
        sets.push("processed_at = :pa".to_string());
        values.insert(":pa".to_string(), av_s(fmt_ts(ts)));
    }
    if let Some(ref summary) = update.summary {
        sets.push("summary = :sm".to_string());
        values.insert(":sm".to_string(), av_s(summary));
    }
    if let Some(ref error) = update.error {
        sets.push("#err = :err".to_string());
        names.insert("#err".to_string(), "error".to_string());
        values.insert(":err".to_string(), av_s(error));
    }

    let mut expr = String::new();
    if !sets.is_empty() {
        expr.push_str("SET ");
        expr.push_str(&sets.join(", "));
    }
    if update.clear_next_retry && update.next_retry_at.is_none() {
        if !expr.is_empty() {
            expr.push(' ');
        }
        expr.push_str("REMOVE next_retry_at");
    }
    (expr, names, values)
}

#[async_trait]
impl RecordStore for DynamoStore {
    async fn get_video(&self, video_id: &VideoId) -> StoreResult<Option<VideoRecord>> {
        let (pk, sk) = Self::video_key(video_id);
        let output = self
            .client
            .get_item()
            .table_name(&self.table)
            .key("pk", pk)
            .key("sk", sk)
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| StoreError::request_failed(e.to_string()))?;
        match output.item() {
            Some(item) => Ok(Some(unmarshal_video(item)?)),
            None => Ok(None),
        }
    }

    async fn create_video_if_absent(&self, record: &VideoRecord) -> StoreResult<bool> {
        let result = self
            .client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(marshal_video(record)))
            .condition_expression("attribute_not_exists(pk)")
            .send()
            .await;
        match result {
            Ok(_) => {
                metrics::record_dedup(true);
                Ok(true)
            }
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_conditional_check_failed_exception() {
                    debug!(video_id = %record.video_id, "video already recorded, skipping");
                    metrics::record_dedup(false);
                    Ok(false)
                } else {
                    Err(StoreError::request_failed(service_err.to_string()))
                }
            }
        }
    }

    async fn update_video(&self, video_id: &VideoId, update: VideoUpdate) -> StoreResult<()> {
        if update.is_empty() {
            return Ok(());
        }
        let (expr, names, values) = build_update_expression(&update);
        let (pk, sk) = Self::video_key(video_id);
        let mut req = self
            .client
            .update_item()
            .table_name(&self.table)
            .key("pk", pk)
            .key("sk", sk)
            .update_expression(expr);
        if !names.is_empty() {
            req = req.set_expression_attribute_names(Some(names));
        }
        if !values.is_empty() {
            req = req.set_expression_attribute_values(Some(values));
        }
        let result = req.send().await;
        metrics::record_operation("update_video", result.is_ok());
        result
            .map(|_| ())
            .map_err(|e| StoreError::request_failed(e.to_string()))
    }

    async fn put_summary(&self, record: &SummaryRecord) -> StoreResult<()> {
        let result = self
            .client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(marshal_summary(record)))
            .send()
            .await;
        metrics::record_operation("put_summary", result.is_ok());
        result
            .map(|_| ())
            .map_err(|e| StoreError::request_failed(e.to_string()))
    }

    async fn get_summary(&self, video_id: &VideoId) -> StoreResult<Option<SummaryRecord>> {
        let (pk, sk) = Self::summary_key(video_id);
        let output = self
            .client
            .get_item()
            .table_name(&self.table)
            .key("pk", pk)
            .key("sk", sk)
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| StoreError::request_failed(e.to_string()))?;
        match output.item() {
            Some(item) => Ok(Some(unmarshal_summary(item)?)),
            None => Ok(None),
        }
    }

    async fn mark_summary_sent(
        &self,
        video_id: &VideoId,
        sent_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let (pk, sk) = Self::summary_key(video_id);
        let result = self
            .client
            .update_item()
            .table_name(&self.table)
            .key("pk", pk)
            .key("sk", sk)
            .update_expression(
                "SET newsletter_sent_at = if_not_exists(newsletter_sent_at, :ts) \
                 ADD newsletter_sent_count :one",
            )
            .expression_attribute_values(":ts", av_s(fmt_ts(sent_at)))
            .expression_attribute_values(":one", av_n(1))
            .send()
            .await;
        metrics::record_operation("mark_summary_sent", result.is_ok());
        result
            .map(|_| ())
            .map_err(|e| StoreError::request_failed(e.to_string()))
    }

    async fn scan_retryable(&self, now: DateTime<Utc>) -> StoreResult<Vec<RetryCandidate>> {
        let mut out = Vec::new();
        let mut start_key: Option<HashMap<String, AttributeValue>> = None;
        loop {
            let mut req = self
                .client
                .scan()
                .table_name(&self.table)
                .filter_expression(
                    "sk = :meta AND #st = :st AND failure_reason = :fr AND next_retry_at <= :now",
                )
                .expression_attribute_names("#st", "status")
                .expression_attribute_values(":meta", av_s("METADATA"))
                .expression_attribute_values(":st", av_s(VideoStatus::Failed.as_str()))
                .expression_attribute_values(":fr", av_s(FailureReason::NoTranscript.as_str()))
                .expression_attribute_values(":now", av_s(fmt_ts(now)))
                .projection_expression("video_id, title, channel_id, channel_title, published_at");
            if let Some(key) = start_key.take() {
                req = req.set_exclusive_start_key(Some(key));
            }
            let resp = req
                .send()
                .await
                .map_err(|e| StoreError::request_failed(e.to_string()))?;
            for item in resp.items() {
                out.push(RetryCandidate {
                    video_id: VideoId::from_string(require_s(item, "video_id")?),
                    title: get_s(item, "title"),
                    channel_id: get_s(item, "channel_id"),
                    channel_title: get_s(item, "channel_title"),
                    published_at: get_ts(item, "published_at"),
                });
            }
            match resp.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }
        Ok(out)
    }

    async fn scan_permanently_failed(&self) -> StoreResult<Vec<CleanupCandidate>> {
        let mut out = Vec::new();
        let mut start_key: Option<HashMap<String, AttributeValue>> = None;
        loop {
            let mut req = self
                .client
                .scan()
                .table_name(&self.table)
                .filter_expression("sk = :meta AND #st = :st")
                .expression_attribute_names("#st", "status")
                .expression_attribute_values(":meta", av_s("METADATA"))
                .expression_attribute_values(
                    ":st",
                    av_s(VideoStatus::PermanentlyFailed.as_str()),
                )
                .projection_expression("video_id, first_failed_at");
            if let Some(key) = start_key.take() {
                req = req.set_exclusive_start_key(Some(key));
            }
            let resp = req
                .send()
                .await
                .map_err(|e| StoreError::request_failed(e.to_string()))?;
            for item in resp.items() {
                out.push(CleanupCandidate {
                    video_id: VideoId::from_string(require_s(item, "video_id")?),
                    first_failed_at: get_ts(item, "first_failed_at"),
                });
            }
            match resp.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }
        Ok(out)
    }

    async fn query_summaries_since(
        &self,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<SummaryRecord>> {
        let mut out = Vec::new();
        let mut start_key: Option<HashMap<String, AttributeValue>> = None;
        loop {
            let mut req = self
                .client
                .query()
                .table_name(&self.table)
                .index_name(SUMMARY_INDEX)
                .key_condition_expression("gsi1pk = :pk AND gsi1sk > :start")
                .expression_attribute_values(":pk", av_s(SUMMARY_PARTITION))
                .expression_attribute_values(":start", av_s(fmt_ts(since)))
                .scan_index_forward(true);
            if let Some(key) = start_key.take() {
                req = req.set_exclusive_start_key(Some(key));
            }
            let resp = req
                .send()
                .await
                .map_err(|e| StoreError::request_failed(e.to_string()))?;
            for item in resp.items() {
                out.push(unmarshal_summary(item)?);
            }
            match resp.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }
        Ok(out)
    }

    async fn delete_video(&self, video_id: &VideoId) -> StoreResult<()> {
        let (pk, sk) = Self::video_key(video_id);
        self.client
            .delete_item()
            .table_name(&self.table)
            .key("pk", pk)
            .key("sk", sk)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| StoreError::request_failed(e.to_string()))
    }

    async fn delete_summary(&self, video_id: &VideoId) -> StoreResult<()> {
        let (pk, sk) = Self::summary_key(video_id);
        self.client
            .delete_item()
            .table_name(&self.table)
            .key("pk", pk)
            .key("sk", sk)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| StoreError::request_failed(e.to_string()))
    }
}
