//! Change publishers
//!
//! Called after a canonical commit. A publish error means the event was not
//! durably queued; the caller surfaces it as a downstream failure even though
//! the canonical store already holds the new value.

use async_nats::jetstream;
use std::time::Duration;
use tracing::debug;

use super::client::NatsClient;
use super::messages::ChangeEvent;
use crate::types::{PlanError, Result};

/// Sink for change events
#[async_trait::async_trait]
pub trait ChangePublisher: Send + Sync {
    /// Backend name for logs and health output
    fn backend(&self) -> &'static str;

    /// Enqueue one event, returning once it is accepted
    async fn publish(&self, event: &ChangeEvent) -> Result<()>;
}

/// Publishes onto the JetStream change stream and waits for the broker ack
pub struct JetStreamPublisher {
    jetstream: jetstream::Context,
    subject: String,
    ack_timeout: Duration,
}

impl JetStreamPublisher {
    /// Create a publisher, making sure the backing stream exists
    pub async fn new(client: &NatsClient, ack_timeout: Duration) -> Result<Self> {
        client.ensure_stream().await?;
        Ok(Self {
            jetstream: client.jetstream().clone(),
            subject: client.queue_name().to_string(),
            ack_timeout,
        })
    }
}

#[async_trait::async_trait]
impl ChangePublisher for JetStreamPublisher {
    fn backend(&self) -> &'static str {
        "jetstream"
    }

    async fn publish(&self, event: &ChangeEvent) -> Result<()> {
        let payload = event
            .to_bytes()
            .map_err(|e| PlanError::Internal(format!("Failed to encode change event: {e}")))?;

        let ack = self
            .jetstream
            .publish(self.subject.clone(), payload)
            .await
            .map_err(|e| PlanError::Queue(format!("Publish failed: {e}")))?;

        let ack = tokio::time::timeout(self.ack_timeout, ack)
            .await
            .map_err(|_| PlanError::Queue(format!("Publish to {} timed out", self.subject)))?
            .map_err(|e| PlanError::Queue(format!("Publish not acknowledged: {e}")))?;

        debug!(
            doc_id = %event.doc_id,
            operation = %event.operation,
            sequence = ack.sequence,
            "Queued change event"
        );
        Ok(())
    }
}
