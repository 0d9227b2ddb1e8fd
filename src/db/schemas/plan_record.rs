//! Canonical plan record schema
//!
//! One document per plan, keyed by the plan's `objectId`. The record body is
//! kept as the exact serialized JSON the fingerprint was computed over, so a
//! read never re-serializes and the ETag always matches the bytes returned.

use bson::{doc, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Canonical plan record stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct PlanRecordDoc {
    /// Plan objectId
    pub _id: String,

    /// Serialized plan JSON
    pub body: String,

    /// Fingerprint of `body`
    pub etag: String,

    /// Common metadata
    #[serde(default)]
    pub metadata: Metadata,
}

impl PlanRecordDoc {
    pub fn new(id: impl Into<String>, body: impl Into<String>, etag: impl Into<String>) -> Self {
        Self {
            _id: id.into(),
            body: body.into(),
            etag: etag.into(),
            metadata: Metadata::new(),
        }
    }
}

impl IntoIndexes for PlanRecordDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        // `_id` is indexed implicitly; the etag index backs compare-and-set filters.
        vec![(
            doc! { "_id": 1, "etag": 1 },
            Some(
                IndexOptions::builder()
                    .name("id_etag_index".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for PlanRecordDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serializes_with_string_id() {
        let record = PlanRecordDoc::new("p1", "{}", "abc");
        let doc = bson::to_document(&record).unwrap();
        assert_eq!(doc.get_str("_id").unwrap(), "p1");
        assert_eq!(doc.get_str("etag").unwrap(), "abc");
        assert!(doc.get_document("metadata").is_ok());
    }
}
