//! Change-event wire format
//!
//! One JSON message per committed canonical mutation:
//! `{"operation": "PUT", "index": "plans", "doc_id": "...", "payload": {...}}`.
//! `payload` carries the full post-mutation record and is absent for deletes.

use serde::{Deserialize, Serialize};

use crate::models::Plan;

/// Mutation that produced a change event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Post,
    Put,
    Patch,
    Delete,
}

impl Operation {
    /// Whether this operation rebuilds the derived tree (as opposed to removing it)
    pub fn is_write(self) -> bool {
        !matches!(self, Self::Delete)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A committed canonical mutation, queued for the index worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub operation: Operation,

    /// Search index the derived documents live in
    pub index: String,

    /// Top-level plan id
    pub doc_id: String,

    /// Post-mutation record (writes only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Plan>,
}

impl ChangeEvent {
    /// Event for a POST/PUT/PATCH carrying the committed record
    pub fn write(operation: Operation, index: impl Into<String>, plan: Plan) -> Self {
        Self {
            operation,
            index: index.into(),
            doc_id: plan.object_id.clone(),
            payload: Some(plan),
        }
    }

    /// Event for a DELETE
    pub fn delete(index: impl Into<String>, doc_id: impl Into<String>) -> Self {
        Self {
            operation: Operation::Delete,
            index: index.into(),
            doc_id: doc_id.into(),
            payload: None,
        }
    }

    /// Serialize to bytes for NATS
    pub fn to_bytes(&self) -> Result<bytes::Bytes, serde_json::Error> {
        serde_json::to_vec(self).map(bytes::Bytes::from)
    }

    /// Deserialize from NATS message bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }
}
