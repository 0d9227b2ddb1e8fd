//! Change-event queue over NATS JetStream
//!
//! Publishing side: the concurrency controller hands each committed mutation
//! to a [`ChangePublisher`]. Consuming side: the index worker pulls from a
//! [`ChangeSource`] and acknowledges each [`Delivery`] once it is processed.
//! Both sides have an in-memory implementation for tests and dev mode.

pub mod client;
pub mod memory;
pub mod messages;
pub mod publisher;
pub mod source;

pub use client::{NatsClient, CONSUMER_NAME, STREAM_NAME};
pub use memory::{memory_queue, MemoryPublisher, MemoryQueueStats, MemorySource};
pub use messages::{ChangeEvent, Operation};
pub use publisher::{ChangePublisher, JetStreamPublisher};
pub use source::{ChangeSource, Delivery, JetStreamSource};
