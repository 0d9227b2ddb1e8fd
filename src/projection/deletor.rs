//! Removes derived documents from the search index
//!
//! Walks the join tree depth first and deletes children before their
//! parent, so an interrupted pass never leaves an orphan behind a missing
//! parent. A document that is already gone counts as removed work done by
//! an earlier delivery, not as a failure.

use futures_util::future::{BoxFuture, FutureExt};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use super::document::NodeKind;
use super::mapper::flatten;
use super::store::SearchIndex;
use crate::models::Plan;
use crate::types::{PlanError, Result};

pub struct DescendantDeletor {
    index: Arc<dyn SearchIndex>,
}

impl DescendantDeletor {
    pub fn new(index: Arc<dyn SearchIndex>) -> Self {
        Self { index }
    }

    /// Delete a plan and everything beneath it.
    ///
    /// Returns how many documents this pass removed (`2 + 3N` for a fully
    /// indexed plan, fewer on a redelivery).
    pub async fn delete_tree(&self, index_name: &str, plan_id: &str) -> Result<usize> {
        let removed = self
            .delete_subtree(index_name, plan_id, NodeKind::Plan)
            .await?;
        info!(doc_id = %plan_id, removed, "Deleted plan tree");
        Ok(removed)
    }

    /// Remove documents still joined under `plan` that it no longer contains,
    /// such as linked entries dropped by a replace.
    pub async fn prune_stale(&self, index_name: &str, plan: &Plan) -> Result<usize> {
        let nodes = flatten(plan);
        let live: HashSet<&str> = nodes.iter().map(|n| n.id()).collect();
        let mut removed = 0;

        for node in &nodes {
            for &child_kind in node.kind().child_kinds() {
                for child_id in self.index.children_of(index_name, node.id(), child_kind).await? {
                    if !live.contains(child_id.as_str()) {
                        removed += self.delete_subtree(index_name, &child_id, child_kind).await?;
                    }
                }
            }
        }

        if removed > 0 {
            info!(doc_id = %plan.object_id, removed, "Pruned stale documents");
        }
        Ok(removed)
    }

    fn delete_subtree<'a>(
        &'a self,
        index_name: &'a str,
        id: &'a str,
        kind: NodeKind,
    ) -> BoxFuture<'a, Result<usize>> {
        async move {
            let mut removed = 0;

            for &child_kind in kind.child_kinds() {
                for child_id in self.index.children_of(index_name, id, child_kind).await? {
                    removed += self.delete_subtree(index_name, &child_id, child_kind).await?;
                }
            }

            let existed = self
                .index
                .delete(index_name, id)
                .await
                .map_err(|e| PlanError::IndexWrite {
                    kind: kind.relation_name(),
                    id: id.to_string(),
                    reason: e.to_string(),
                })?;

            if existed {
                debug!(doc_id = %id, kind = %kind, "Deleted search document");
                removed += 1;
            }
            Ok(removed)
        }
        .boxed()
    }
}
