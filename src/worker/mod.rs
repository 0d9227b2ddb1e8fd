//! Index worker
//!
//! Consumes change events and keeps the search projection in step with the
//! canonical store. Runs in the server process by default, or standalone via
//! the `plansync-indexer` binary.

pub mod processor;
pub mod runner;

pub use processor::ChangeProcessor;
pub use runner::{spawn_index_worker, RetryPolicy, WorkerConfig, WorkerHandle};
