//! Publishes detection summaries to the message queue.

use crate::aggregate::AggregatedMessage;
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_sqs::Client;
use tracing::{info, instrument, warn};

/// Anything summaries can be published to.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Publishes a message body and returns its identifier.
    async fn publish(&self, body: String) -> Result<String>;
}

/// Message queue backed by the SQS-compatible queue API.
pub struct SqsQueue {
    client: Client,
    queue_url: String,
}

impl SqsQueue {
    /// Initialize a queue publishing to `queue_url` through the given
    /// client.
    pub fn new(client: Client, queue_url: String) -> Self {
        Self { client, queue_url }
    }
}

#[async_trait]
impl MessageQueue for SqsQueue {
    async fn publish(&self, body: String) -> Result<String> {
        let output = self
            .client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(body)
            .send()
            .await
            .with_context(|| format!("Failed to send message to queue {:?}", self.queue_url))?;
        Ok(output.message_id().unwrap_or("<unknown>").to_string())
    }
}

/// Publishes every summary that found at least one face, in
/// order. Summaries without faces are skipped. The first failure
/// stops the operation; messages sent before it stay sent. Returns
/// how many messages were published.
#[instrument(skip(queue, messages), fields(messages = messages.len()))]
pub async fn publish_all(
    queue: &dyn MessageQueue,
    messages: &[AggregatedMessage],
) -> Result<usize> {
    let mut published = 0;
    for message in messages {
        if !message.has_faces() {
            info!(image = %message.image, "No faces found; skipping");
            continue;
        }
        let body = serde_json::to_string(message).with_context(|| {
            format!("Failed to serialize queue message for image {}", message.image)
        })?;
        let message_id = match queue.publish(body.clone()).await {
            Ok(message_id) => message_id,
            Err(e) => {
                warn!(payload = %body, "Couldn't publish message");
                return Err(e);
            }
        };
        info!(%message_id, payload = %body, "Published message");
        published += 1;
    }
    Ok(published)
}
