//! Change sources for the index worker
//!
//! A [`Delivery`] must be settled explicitly: `ack` once processed,
//! `terminate` when it can never succeed. Dropping it unsettled leaves a
//! JetStream message to be redelivered after the ack deadline.

use async_nats::jetstream::{self, consumer::pull, AckKind};
use bytes::Bytes;
use futures_util::StreamExt;
use std::sync::Arc;
use tracing::info;

use super::client::NatsClient;
use super::memory::MemoryQueueStats;
use crate::types::{PlanError, Result};

/// Ordered stream of change events awaiting processing
#[async_trait::async_trait]
pub trait ChangeSource: Send {
    /// Backend name for logs
    fn backend(&self) -> &'static str;

    /// Wait for the next delivery; `None` once the source is closed
    async fn next(&mut self) -> Result<Option<Delivery>>;
}

enum Acker {
    JetStream(jetstream::Message),
    Local(Arc<MemoryQueueStats>),
}

/// One received change event plus the handle to settle it
pub struct Delivery {
    payload: Bytes,
    acker: Acker,
}

impl Delivery {
    pub(crate) fn local(payload: Bytes, stats: Arc<MemoryQueueStats>) -> Self {
        Self {
            payload,
            acker: Acker::Local(stats),
        }
    }

    fn jetstream(message: jetstream::Message) -> Self {
        Self {
            payload: message.payload.clone(),
            acker: Acker::JetStream(message),
        }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Number of times this event has been delivered, when known
    pub fn delivered(&self) -> Option<i64> {
        match &self.acker {
            Acker::JetStream(message) => message.info().ok().map(|i| i.delivered),
            Acker::Local(_) => None,
        }
    }

    /// Extend the ack deadline while a slow retry loop is running
    pub async fn in_progress(&self) -> Result<()> {
        match &self.acker {
            Acker::JetStream(message) => Ok(message.ack_with(AckKind::Progress).await?),
            Acker::Local(_) => Ok(()),
        }
    }

    /// Mark the event processed
    pub async fn ack(self) -> Result<()> {
        match self.acker {
            Acker::JetStream(message) => Ok(message.ack().await?),
            Acker::Local(stats) => {
                stats.record_ack();
                Ok(())
            }
        }
    }

    /// Give up on the event; it will not be redelivered
    pub async fn terminate(self) -> Result<()> {
        match self.acker {
            Acker::JetStream(message) => Ok(message.ack_with(AckKind::Term).await?),
            Acker::Local(stats) => {
                stats.record_terminate();
                Ok(())
            }
        }
    }
}

/// Pulls from the durable JetStream consumer
pub struct JetStreamSource {
    messages: pull::Stream,
}

impl JetStreamSource {
    pub async fn new(client: &NatsClient) -> Result<Self> {
        let stream = client.ensure_stream().await?;
        let consumer = client.ensure_consumer(&stream).await?;
        let messages = consumer
            .messages()
            .await
            .map_err(|e| PlanError::Queue(format!("Failed to open message stream: {e}")))?;

        info!(queue = client.queue_name(), "Change source ready");
        Ok(Self { messages })
    }
}

#[async_trait::async_trait]
impl ChangeSource for JetStreamSource {
    fn backend(&self) -> &'static str {
        "jetstream"
    }

    async fn next(&mut self) -> Result<Option<Delivery>> {
        match self.messages.next().await {
            Some(Ok(message)) => Ok(Some(Delivery::jetstream(message))),
            Some(Err(e)) => Err(PlanError::Queue(format!("Error receiving message: {e}"))),
            None => Ok(None),
        }
    }
}
