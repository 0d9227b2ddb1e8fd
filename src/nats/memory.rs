//! In-process change queue for tests and dev mode

use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::messages::ChangeEvent;
use super::publisher::ChangePublisher;
use super::source::{ChangeSource, Delivery};
use crate::types::{PlanError, Result};

/// Settlement counters shared by both ends of a memory queue
#[derive(Debug, Default)]
pub struct MemoryQueueStats {
    published: AtomicUsize,
    acked: AtomicUsize,
    terminated: AtomicUsize,
}

impl MemoryQueueStats {
    pub fn published(&self) -> usize {
        self.published.load(Ordering::SeqCst)
    }

    pub fn acked(&self) -> usize {
        self.acked.load(Ordering::SeqCst)
    }

    pub fn terminated(&self) -> usize {
        self.terminated.load(Ordering::SeqCst)
    }

    /// Events published but not yet settled
    pub fn pending(&self) -> usize {
        self.published()
            .saturating_sub(self.acked() + self.terminated())
    }

    pub(crate) fn record_ack(&self) {
        self.acked.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_terminate(&self) {
        self.terminated.fetch_add(1, Ordering::SeqCst);
    }
}

/// Create a connected publisher/source pair
pub fn memory_queue() -> (MemoryPublisher, MemorySource) {
    let (tx, rx) = mpsc::unbounded_channel();
    let stats = Arc::new(MemoryQueueStats::default());
    (
        MemoryPublisher {
            tx,
            stats: stats.clone(),
        },
        MemorySource { rx, stats },
    )
}

/// Sending half of a memory queue
#[derive(Clone)]
pub struct MemoryPublisher {
    tx: mpsc::UnboundedSender<Bytes>,
    stats: Arc<MemoryQueueStats>,
}

impl MemoryPublisher {
    pub fn stats(&self) -> Arc<MemoryQueueStats> {
        self.stats.clone()
    }

    /// Enqueue raw bytes, bypassing event encoding
    pub fn publish_raw(&self, payload: impl Into<Bytes>) -> Result<()> {
        self.tx
            .send(payload.into())
            .map_err(|_| PlanError::Queue("memory queue closed".into()))?;
        self.stats.published.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait::async_trait]
impl ChangePublisher for MemoryPublisher {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn publish(&self, event: &ChangeEvent) -> Result<()> {
        let payload = event
            .to_bytes()
            .map_err(|e| PlanError::Internal(format!("Failed to encode change event: {e}")))?;
        self.publish_raw(payload)
    }
}

/// Receiving half of a memory queue
pub struct MemorySource {
    rx: mpsc::UnboundedReceiver<Bytes>,
    stats: Arc<MemoryQueueStats>,
}

#[async_trait::async_trait]
impl ChangeSource for MemorySource {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn next(&mut self) -> Result<Option<Delivery>> {
        Ok(self
            .rx
            .recv()
            .await
            .map(|payload| Delivery::local(payload, self.stats.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let (publisher, mut source) = memory_queue();
        publisher.publish(&ChangeEvent::delete("plans", "a")).await.unwrap();
        publisher.publish(&ChangeEvent::delete("plans", "b")).await.unwrap();

        for expected in ["a", "b"] {
            let delivery = source.next().await.unwrap().unwrap();
            let event = ChangeEvent::from_bytes(delivery.payload()).unwrap();
            assert_eq!(event.doc_id, expected);
            delivery.ack().await.unwrap();
        }

        let stats = publisher.stats();
        assert_eq!(stats.published(), 2);
        assert_eq!(stats.acked(), 2);
        assert_eq!(stats.pending(), 0);
    }

    #[tokio::test]
    async fn test_source_closes_with_publishers() {
        let (publisher, mut source) = memory_queue();
        publisher.publish_raw("x").unwrap();
        drop(publisher);

        let delivery = source.next().await.unwrap().unwrap();
        delivery.terminate().await.unwrap();
        assert!(source.next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_publish_after_source_dropped_fails() {
        let (publisher, source) = memory_queue();
        drop(source);

        let err = publisher
            .publish(&ChangeEvent::delete("plans", "a"))
            .await
            .unwrap_err();
        assert!(matches!(err, PlanError::Queue(_)));
    }
}
