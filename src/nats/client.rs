//! NATS JetStream client wrapper
//!
//! Connection management plus the stream and durable consumer that carry
//! plan change events.

use async_nats::jetstream::{self, consumer::PullConsumer, stream::Stream};
use async_nats::ConnectOptions;
use std::time::Duration;
use tracing::info;

use crate::config::NatsArgs;
use crate::types::{PlanError, Result};

/// JetStream stream holding change events
pub const STREAM_NAME: &str = "PLAN_CHANGES";

/// Durable consumer shared by every index worker
pub const CONSUMER_NAME: &str = "plansync_indexer";

/// Default ping interval for keep-alive
const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(120);

/// How long change events are retained in the stream
const STREAM_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 3600);

/// Redelivery deadline for an unacknowledged event
const CONSUMER_ACK_WAIT: Duration = Duration::from_secs(60);

/// NATS client wrapper with JetStream support
#[derive(Clone)]
pub struct NatsClient {
    /// JetStream context on top of the connection
    jetstream: jetstream::Context,
    /// Subject change events are published on
    queue_name: String,
}

impl NatsClient {
    /// Create a new NATS client
    pub async fn new(args: &NatsArgs, name: &str) -> Result<Self> {
        info!("Connecting to NATS at {}", args.nats_url);

        // No retry_on_initial_connect(): fail fast so dev mode can fall back.
        let mut options = ConnectOptions::new()
            .name(name)
            .ping_interval(DEFAULT_PING_INTERVAL)
            .connection_timeout(Duration::from_secs(5));

        if let (Some(user), Some(pass)) = (&args.nats_user, &args.nats_password) {
            options = options.user_and_password(user.clone(), pass.clone());
        }

        let client = options
            .connect(&args.nats_url)
            .await
            .map_err(|e| PlanError::Queue(format!("Failed to connect: {}", e)))?;

        info!("Connected to NATS at {}", args.nats_url);

        Ok(Self {
            jetstream: jetstream::new(client),
            queue_name: args.queue_name.clone(),
        })
    }

    /// Get the JetStream context
    pub fn jetstream(&self) -> &jetstream::Context {
        &self.jetstream
    }

    /// Subject change events travel on
    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Ensure the change-event stream exists
    pub async fn ensure_stream(&self) -> Result<Stream> {
        let stream = self
            .jetstream
            .get_or_create_stream(jetstream::stream::Config {
                name: STREAM_NAME.to_string(),
                subjects: vec![self.queue_name.clone()],
                max_age: STREAM_MAX_AGE,
                storage: jetstream::stream::StorageType::File,
                ..Default::default()
            })
            .await
            .map_err(|e| PlanError::Queue(format!("Failed to create stream: {e}")))?;

        info!("Using stream {} with subject {}", STREAM_NAME, self.queue_name);
        Ok(stream)
    }

    /// Ensure the durable index consumer exists.
    ///
    /// One event in flight at a time keeps processing in delivery order.
    pub async fn ensure_consumer(&self, stream: &Stream) -> Result<PullConsumer> {
        let consumer = stream
            .get_or_create_consumer(
                CONSUMER_NAME,
                jetstream::consumer::pull::Config {
                    durable_name: Some(CONSUMER_NAME.to_string()),
                    ack_policy: jetstream::consumer::AckPolicy::Explicit,
                    ack_wait: CONSUMER_ACK_WAIT,
                    filter_subject: self.queue_name.clone(),
                    max_ack_pending: 1,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| PlanError::Queue(format!("Failed to create consumer: {e}")))?;

        info!("Using consumer {}", CONSUMER_NAME);
        Ok(consumer)
    }
}

