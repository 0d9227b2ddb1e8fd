//! Plansync - plan records with an asynchronously indexed search projection
//!
//! Canonical plan records live in one store and are guarded by content
//! fingerprints (ETags). Every committed change is queued as an event; an
//! index worker drains the queue and keeps a joined parent/child document
//! tree in the search store in step with the canonical copy.
//!
//! ## Components
//!
//! - **Concurrency**: fingerprints, conditional headers, and the controller
//!   that checks them before committing
//! - **Store**: canonical record storage with compare-and-set writes
//! - **NATS**: change-event publishing and consumption over JetStream
//! - **Projection**: record → document tree mapping, indexing, cascading delete
//! - **Worker**: supervised, retrying consumer feeding the projection

pub mod auth;
pub mod concurrency;
pub mod config;
pub mod db;
pub mod logging;
pub mod models;
pub mod nats;
pub mod projection;
pub mod routes;
pub mod server;
pub mod store;
pub mod types;
pub mod worker;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{PlanError, Result};
