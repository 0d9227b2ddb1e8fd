//! Supervised index worker
//!
//! One task pulls change events in delivery order and processes them one at
//! a time. Events are acknowledged only after processing, so a crash leads
//! to redelivery instead of loss. Downstream failures are retried with
//! exponential backoff; permanent failures and exhausted retries terminate
//! the event.
//!
//! Shutdown stops the worker from taking new events. An event already being
//! processed is finished first; one waiting out a retry backoff is left
//! unacknowledged for redelivery.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::processor::ChangeProcessor;
use crate::nats::{ChangeEvent, ChangeSource, Delivery};
use crate::types::{PlanError, Result};

/// Pause after a failed receive before polling the source again
const RECEIVE_ERROR_PAUSE: Duration = Duration::from_secs(1);

/// Upper bound for a single retry backoff
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Retry schedule for failed events
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    /// Delay after the first failure, doubled for each later one
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff: Duration::from_millis(initial_backoff_ms),
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << shift)
            .min(MAX_BACKOFF)
    }
}

/// Worker configuration
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Worker ID for logs
    pub worker_id: String,
    pub retry: RetryPolicy,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: uuid::Uuid::new_v4().to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Handle to a running index worker
pub struct WorkerHandle {
    shutdown_tx: broadcast::Sender<()>,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    /// Signal shutdown and wait for the worker to drain and exit
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown_tx.send(());
        self.join
            .await
            .map_err(|e| PlanError::Internal(format!("Index worker panicked: {}", e)))
    }
}

/// Spawn the index worker on the current runtime
pub fn spawn_index_worker(
    source: Box<dyn ChangeSource>,
    processor: Arc<ChangeProcessor>,
    config: WorkerConfig,
) -> WorkerHandle {
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let worker = IndexWorker {
        source,
        processor,
        config,
    };
    let join = tokio::spawn(worker.run(shutdown_rx));

    WorkerHandle { shutdown_tx, join }
}

struct IndexWorker {
    source: Box<dyn ChangeSource>,
    processor: Arc<ChangeProcessor>,
    config: WorkerConfig,
}

/// Whether the worker should keep going after an event
enum Flow {
    Continue,
    Stop,
}

impl IndexWorker {
    async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(
            worker_id = %self.config.worker_id,
            backend = self.source.backend(),
            max_attempts = self.config.retry.max_attempts,
            "Index worker started"
        );

        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    info!("Index worker received shutdown signal");
                    break;
                }
                next = self.source.next() => next,
            };

            match next {
                Ok(Some(delivery)) => {
                    let flow =
                        handle_event(&self.processor, &self.config.retry, delivery, &mut shutdown_rx)
                            .await;
                    if let Flow::Stop = flow {
                        break;
                    }
                }
                Ok(None) => {
                    info!("Change source closed, index worker stopping");
                    break;
                }
                Err(e) => {
                    error!("Error receiving change event: {}", e);
                    tokio::select! {
                        _ = shutdown_rx.recv() => break,
                        _ = tokio::time::sleep(RECEIVE_ERROR_PAUSE) => {}
                    }
                }
            }
        }

        info!(worker_id = %self.config.worker_id, "Index worker stopped");
    }
}

/// Process one delivery to completion, retrying downstream failures.
///
/// Must not borrow the worker: its source is `Send` but not `Sync`.
async fn handle_event(
    processor: &ChangeProcessor,
    policy: &RetryPolicy,
    delivery: Delivery,
    shutdown_rx: &mut broadcast::Receiver<()>,
) -> Flow {
    let event = match ChangeEvent::from_bytes(delivery.payload()) {
        Ok(event) => event,
        Err(e) => {
            error!("Dropping malformed change event: {}", e);
            settle(delivery.terminate().await);
            return Flow::Continue;
        }
    };

    let mut attempt = 1;

    loop {
        match processor.process(&event).await {
            Ok(documents) => {
                debug!(
                    doc_id = %event.doc_id,
                    operation = %event.operation,
                    documents,
                    attempt,
                    "Change event processed"
                );
                settle(delivery.ack().await);
                return Flow::Continue;
            }
            Err(e) if !e.is_downstream() => {
                error!(
                    doc_id = %event.doc_id,
                    operation = %event.operation,
                    "Change event rejected: {}", e
                );
                settle(delivery.terminate().await);
                return Flow::Continue;
            }
            Err(e) if attempt >= policy.max_attempts => {
                error!(
                    doc_id = %event.doc_id,
                    operation = %event.operation,
                    attempts = attempt,
                    delivered = ?delivery.delivered(),
                    "Giving up on change event: {}", e
                );
                settle(delivery.terminate().await);
                return Flow::Continue;
            }
            Err(e) => {
                let delay = policy.backoff(attempt);
                warn!(
                    doc_id = %event.doc_id,
                    operation = %event.operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Change event failed, retrying: {}", e
                );
                if let Err(e) = delivery.in_progress().await {
                    warn!("Failed to extend ack deadline: {}", e);
                }

                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!(doc_id = %event.doc_id, "Shutdown during retry, leaving event for redelivery");
                        return Flow::Stop;
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
                attempt += 1;
            }
        }
    }
}

fn settle(result: Result<()>) {
    if let Err(e) = result {
        warn!("Failed to settle change event: {}", e);
    }
}
