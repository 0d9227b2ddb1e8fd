//! Writes a plan's flattened document tree into the search index

use std::sync::Arc;
use tracing::{debug, info};

use super::mapper::flatten;
use super::store::SearchIndex;
use crate::models::Plan;
use crate::types::{PlanError, Result};

/// Upserts every node of a plan, ancestors first
pub struct DocumentIndexer {
    index: Arc<dyn SearchIndex>,
}

impl DocumentIndexer {
    pub fn new(index: Arc<dyn SearchIndex>) -> Self {
        Self { index }
    }

    /// Index `plan` into `index_name`, returning the number of documents written.
    ///
    /// Stops at the first failing node. Nodes already written stay written;
    /// rerunning the same plan converges because every write is an upsert.
    pub async fn index_plan(&self, index_name: &str, plan: &Plan) -> Result<usize> {
        let nodes = flatten(plan);

        for node in &nodes {
            let doc = node.to_document();
            self.index
                .upsert(index_name, &doc)
                .await
                .map_err(|e| PlanError::IndexWrite {
                    kind: node.kind().relation_name(),
                    id: doc.id.clone(),
                    reason: e.to_string(),
                })?;
            debug!(doc_id = %doc.id, kind = %node.kind(), "Indexed node");
        }

        info!(
            doc_id = %plan.object_id,
            documents = nodes.len(),
            "Indexed plan tree"
        );
        Ok(nodes.len())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::plan::fixtures;
    use crate::projection::document::{NodeKind, SearchDocument};
    use crate::projection::store::MemorySearchIndex;

    /// Memory index that rejects writes and deletes of one document id
    pub(crate) struct FailingIndex {
        pub inner: MemorySearchIndex,
        pub fail_id: String,
    }

    #[async_trait::async_trait]
    impl SearchIndex for FailingIndex {
        fn backend(&self) -> &'static str {
            "failing"
        }
        async fn ensure_index(&self, _index: &str) -> Result<()> {
            Ok(())
        }
        async fn upsert(&self, index: &str, doc: &SearchDocument) -> Result<()> {
            if doc.id == self.fail_id {
                return Err(PlanError::Search("connection reset".into()));
            }
            self.inner.upsert(index, doc).await
        }
        async fn get(&self, index: &str, id: &str) -> Result<Option<SearchDocument>> {
            self.inner.get(index, id).await
        }
        async fn children_of(
            &self,
            index: &str,
            parent_id: &str,
            kind: NodeKind,
        ) -> Result<Vec<String>> {
            self.inner.children_of(index, parent_id, kind).await
        }
        async fn delete(&self, index: &str, id: &str) -> Result<bool> {
            if id == self.fail_id {
                return Err(PlanError::Search("connection reset".into()));
            }
            self.inner.delete(index, id).await
        }
        async fn count(&self, index: &str) -> Result<usize> {
            self.inner.count(index).await
        }
    }

    #[tokio::test]
    async fn test_index_plan_writes_every_node() {
        let index = Arc::new(MemorySearchIndex::new());
        let indexer = DocumentIndexer::new(index.clone());
        let plan = fixtures::plan("p1", &["e1", "e2"]);

        assert_eq!(indexer.index_plan("plans", &plan).await.unwrap(), 8);
        assert_eq!(index.count("plans").await.unwrap(), 8);

        let pscs = index.get("plans", "e2-pscs").await.unwrap().unwrap();
        assert_eq!(pscs.kind(), NodeKind::PlanServiceCostShares);
        assert_eq!(pscs.relation.parent.as_deref(), Some("e2"));
    }

    #[tokio::test]
    async fn test_redelivery_is_idempotent() {
        let index = Arc::new(MemorySearchIndex::new());
        let indexer = DocumentIndexer::new(index.clone());
        let plan = fixtures::plan("p1", &["e1"]);

        indexer.index_plan("plans", &plan).await.unwrap();
        indexer.index_plan("plans", &plan).await.unwrap();
        assert_eq!(index.count("plans").await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_first_failure_aborts_and_names_node() {
        let index = Arc::new(FailingIndex {
            inner: MemorySearchIndex::new(),
            fail_id: "e1-svc".into(),
        });
        let indexer = DocumentIndexer::new(index.clone());
        let plan = fixtures::plan("p1", &["e1", "e2"]);

        let err = indexer.index_plan("plans", &plan).await.unwrap_err();
        match err {
            PlanError::IndexWrite { kind, id, .. } => {
                assert_eq!(kind, "linkedService");
                assert_eq!(id, "e1-svc");
            }
            other => panic!("unexpected error: {other}"),
        }

        // plan, planCostShares and e1 were written before the failure; nothing after.
        assert_eq!(index.count("plans").await.unwrap(), 3);
        assert!(index.get("plans", "e2").await.unwrap().is_none());
    }
}
