//! Database schemas for Plansync
//!
//! Defines the MongoDB document structure for canonical plan records.

mod metadata;
mod plan_record;

pub use metadata::Metadata;
pub use plan_record::PlanRecordDoc;
