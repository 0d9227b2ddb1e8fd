//! HTTP routes for Plansync

pub mod health;
pub mod plans;

pub use health::health_check;
pub use plans::{error_response, handle_plans_request};
