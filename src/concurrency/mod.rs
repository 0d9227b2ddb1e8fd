//! Optimistic concurrency for canonical plan records
//!
//! Fingerprints, conditional headers, and the controller that enforces the
//! conditional mutation protocol before committing and publishing.

pub mod controller;
pub mod fingerprint;
pub mod preconditions;

pub use controller::{MergeOutcome, PlanController, ReadOutcome};
pub use fingerprint::{fingerprint, fingerprint_plan, header_matches, to_entity_tag};
pub use preconditions::Preconditions;
