//! Shared types for Plansync

pub mod error;

pub use error::{PlanError, Result};
