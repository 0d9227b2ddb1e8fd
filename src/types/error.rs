//! Error types for Plansync
//!
//! One error enum for the whole crate. Synchronous request errors map to an
//! HTTP status; indexing errors only ever surface in worker logs.

use hyper::StatusCode;

/// Main error type for Plansync operations
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Precondition required: {0}")]
    PreconditionRequired(String),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Search store error: {0}")]
    Search(String),

    /// A single node of a derived document tree could not be written.
    #[error("Failed to write {kind} document {id}: {reason}")]
    IndexWrite {
        kind: &'static str,
        id: String,
        reason: String,
    },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PlanError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PreconditionRequired(_) => StatusCode::PRECONDITION_REQUIRED,
            Self::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
            Self::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Queue(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Search(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::IndexWrite { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for JSON error bodies
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::PreconditionRequired(_) => "PRECONDITION_REQUIRED",
            Self::PreconditionFailed(_) => "PRECONDITION_FAILED",
            Self::Database(_) | Self::Queue(_) | Self::Search(_) | Self::IndexWrite { .. } => {
                "DOWNSTREAM_UNAVAILABLE"
            }
            Self::Internal(_) => "INTERNAL",
            Self::Config(_) => "CONFIG",
        }
    }

    /// Whether the failure came from an unreachable or failing backend.
    ///
    /// The index worker retries these; anything else is permanent.
    pub fn is_downstream(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::Queue(_) | Self::Search(_) | Self::IndexWrite { .. }
        )
    }
}

// Implement From conversions for common error types

impl From<std::io::Error> for PlanError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for PlanError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(format!("JSON error: {}", err))
    }
}

impl From<async_nats::Error> for PlanError {
    fn from(err: async_nats::Error) -> Self {
        Self::Queue(err.to_string())
    }
}

impl From<mongodb::error::Error> for PlanError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<bson::ser::Error> for PlanError {
    fn from(err: bson::ser::Error) -> Self {
        Self::Internal(format!("BSON encoding error: {}", err))
    }
}

impl From<jsonwebtoken::errors::Error> for PlanError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::Unauthorized(format!("JWT error: {}", err))
    }
}

/// Result type alias for Plansync operations
pub type Result<T> = std::result::Result<T, PlanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_status_codes() {
        assert_eq!(
            PlanError::Conflict("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            PlanError::PreconditionRequired("x".into()).status_code(),
            StatusCode::PRECONDITION_REQUIRED
        );
        assert_eq!(
            PlanError::PreconditionFailed("x".into()).status_code(),
            StatusCode::PRECONDITION_FAILED
        );
        assert_eq!(
            PlanError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_downstream_errors_are_retryable() {
        assert!(PlanError::Queue("down".into()).is_downstream());
        assert!(PlanError::IndexWrite {
            kind: "plan",
            id: "p1".into(),
            reason: "timeout".into(),
        }
        .is_downstream());
        assert!(!PlanError::Validation("bad".into()).is_downstream());
        assert_eq!(PlanError::Search("down".into()).code(), "DOWNSTREAM_UNAVAILABLE");
    }

    #[test]
    fn test_index_write_message_names_node() {
        let err = PlanError::IndexWrite {
            kind: "linkedService",
            id: "svc-1".into(),
            reason: "boom".into(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to write linkedService document svc-1: boom"
        );
    }
}
