//! Queue implementations: SQS and in-memory.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::error::{QueueError, QueueResult};
use crate::item::WorkItem;

/// A received message awaiting acknowledgment.
///
/// The consumer deletes messages it has handled; anything left undeleted
/// reappears after the visibility timeout, which is what makes per-item
/// failure reporting work.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub message_id: String,
    pub receipt_handle: String,
    pub body: String,
}

/// Enqueue/dequeue contract for video work items.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    async fn enqueue(&self, item: &WorkItem) -> QueueResult<()>;

    /// Receive up to `max_messages`, long-polling for `wait_seconds`.
    async fn receive(&self, max_messages: i32, wait_seconds: i32)
        -> QueueResult<Vec<QueueMessage>>;

    /// Acknowledge one message. Unacknowledged messages are redelivered.
    async fn acknowledge(&self, receipt_handle: &str) -> QueueResult<()>;
}

/// SQS-backed work queue.
#[derive(Clone)]
pub struct SqsQueue {
    client: aws_sdk_sqs::Client,
    queue_url: String,
}

impl SqsQueue {
    pub fn new(client: aws_sdk_sqs::Client, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
        }
    }

    /// Build a queue from ambient AWS configuration and `QUEUE_URL`.
    pub async fn from_env() -> QueueResult<Self> {
        let queue_url = std::env::var("QUEUE_URL")
            .map_err(|_| QueueError::receive_failed("QUEUE_URL is not set"))?;
        let config = aws_config::load_from_env().await;
        Ok(Self::new(aws_sdk_sqs::Client::new(&config), queue_url))
    }
}

#[async_trait]
impl WorkQueue for SqsQueue {
    async fn enqueue(&self, item: &WorkItem) -> QueueResult<()> {
        let body = item.to_json()?;
        self.client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(body)
            .send()
            .await
            .map_err(|e| QueueError::enqueue_failed(e.to_string()))?;
        debug!(video_id = %item.video_id, "work item enqueued");
        Ok(())
    }

    async fn receive(
        &self,
        max_messages: i32,
        wait_seconds: i32,
    ) -> QueueResult<Vec<QueueMessage>> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max_messages)
            .wait_time_seconds(wait_seconds)
            .send()
            .await
            .map_err(|e| QueueError::receive_failed(e.to_string()))?;

        Ok(output
            .messages()
            .iter()
            .filter_map(|m| {
                Some(QueueMessage {
                    message_id: m.message_id()?.to_string(),
                    receipt_handle: m.receipt_handle()?.to_string(),
                    body: m.body()?.to_string(),
                })
            })
            .collect())
    }

    async fn acknowledge(&self, receipt_handle: &str) -> QueueResult<()> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| QueueError::ack_failed(e.to_string()))?;
        Ok(())
    }
}

/// In-memory work queue for tests and local runs. Models SQS visibility:
/// received messages move to an in-flight set and come back via
/// [`MemoryQueue::redeliver_unacknowledged`] unless acknowledged.
#[derive(Default)]
pub struct MemoryQueue {
    pending: Mutex<VecDeque<QueueMessage>>,
    in_flight: Mutex<HashMap<String, QueueMessage>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.lock().unwrap().len()
    }

    /// Simulate the visibility timeout expiring: everything received but not
    /// acknowledged goes back on the queue.
    pub fn redeliver_unacknowledged(&self) {
        let mut in_flight = self.in_flight.lock().unwrap();
        let mut pending = self.pending.lock().unwrap();
        for (_, msg) in in_flight.drain() {
            pending.push_back(msg);
        }
    }
}

#[async_trait]
impl WorkQueue for MemoryQueue {
    async fn enqueue(&self, item: &WorkItem) -> QueueResult<()> {
        let body = item.to_json()?;
        let id = Uuid::new_v4().to_string();
        self.pending.lock().unwrap().push_back(QueueMessage {
            message_id: id.clone(),
            receipt_handle: id,
            body,
        });
        Ok(())
    }

    async fn receive(
        &self,
        max_messages: i32,
        _wait_seconds: i32,
    ) -> QueueResult<Vec<QueueMessage>> {
        let mut pending = self.pending.lock().unwrap();
        let mut in_flight = self.in_flight.lock().unwrap();
        let mut out = Vec::new();
        while out.len() < max_messages as usize {
            match pending.pop_front() {
                Some(msg) => {
                    in_flight.insert(msg.receipt_handle.clone(), msg.clone());
                    out.push(msg);
                }
                None => break,
            }
        }
        Ok(out)
    }

    async fn acknowledge(&self, receipt_handle: &str) -> QueueResult<()> {
        self.in_flight.lock().unwrap().remove(receipt_handle);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use vidigest_models::VideoId;

    fn item(id: &str) -> WorkItem {
        WorkItem {
            video_id: VideoId::from(id),
            title: "Title".to_string(),
            channel_id: "UC1".to_string(),
            channel_title: "Channel".to_string(),
            published_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_receive_moves_messages_in_flight() {
        let queue = MemoryQueue::new();
        queue.enqueue(&item("a")).await.unwrap();
        queue.enqueue(&item("b")).await.unwrap();

        let batch = queue.receive(10, 0).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(queue.pending_len(), 0);
        assert_eq!(queue.in_flight_len(), 2);
    }

    #[tokio::test]
    async fn test_unacknowledged_messages_come_back() {
        let queue = MemoryQueue::new();
        queue.enqueue(&item("a")).await.unwrap();
        queue.enqueue(&item("b")).await.unwrap();

        let batch = queue.receive(10, 0).await.unwrap();
        queue.acknowledge(&batch[0].receipt_handle).await.unwrap();
        queue.redeliver_unacknowledged();

        assert_eq!(queue.pending_len(), 1);
        let redelivered = queue.receive(10, 0).await.unwrap();
        assert_eq!(redelivered[0].message_id, batch[1].message_id);
    }

    #[tokio::test]
    async fn test_receive_respects_batch_size() {
        let queue = MemoryQueue::new();
        for i in 0..5 {
            queue.enqueue(&item(&format!("v{i}"))).await.unwrap();
        }
        let batch = queue.receive(3, 0).await.unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(queue.pending_len(), 2);
    }
}
