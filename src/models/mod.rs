//! Plan domain model
//!
//! Typed records, validation, and merge-patch semantics.

pub mod merge;
pub mod plan;
pub mod validation;

pub use merge::merge_plan;
pub use plan::{CostShares, LinkedPlanService, LinkedService, Plan};
pub use validation::{is_valid_creation_date, validate_plan, CREATION_DATE_FORMAT};
