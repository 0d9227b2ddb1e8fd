//! Change-event dispatch
//!
//! Turns one decoded change event into search index work: writes rebuild the
//! plan's whole tree, deletes cascade through it. Both are idempotent, so a
//! redelivered event converges to the same index state.

use std::sync::Arc;
use tracing::debug;

use crate::nats::ChangeEvent;
use crate::projection::{DescendantDeletor, DocumentIndexer, SearchIndex};
use crate::types::{PlanError, Result};

pub struct ChangeProcessor {
    indexer: DocumentIndexer,
    deletor: DescendantDeletor,
}

impl ChangeProcessor {
    pub fn new(index: Arc<dyn SearchIndex>) -> Self {
        Self {
            indexer: DocumentIndexer::new(index.clone()),
            deletor: DescendantDeletor::new(index),
        }
    }

    /// Apply one event, returning the number of documents written or removed
    pub async fn process(&self, event: &ChangeEvent) -> Result<usize> {
        debug!(doc_id = %event.doc_id, operation = %event.operation, "Processing change event");

        if !event.operation.is_write() {
            return self.deletor.delete_tree(&event.index, &event.doc_id).await;
        }

        let plan = event.payload.as_ref().ok_or_else(|| {
            PlanError::Validation(format!(
                "{} event for {} has no payload",
                event.operation, event.doc_id
            ))
        })?;
        if plan.object_id != event.doc_id {
            return Err(PlanError::Validation(format!(
                "{} event for {} carries plan {}",
                event.operation, event.doc_id, plan.object_id
            )));
        }

        let written = self.indexer.index_plan(&event.index, plan).await?;
        self.deletor.prune_stale(&event.index, plan).await?;
        Ok(written)
    }
}
