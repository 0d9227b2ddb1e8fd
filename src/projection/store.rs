//! Search index backends
//!
//! The index holds the flattened document tree for every plan. Writes never
//! touch a document's join relation once it exists: an upsert inserts the
//! relation and routing only when the document is new, and afterwards
//! updates the node's own fields.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::warn;

use super::document::{NodeKind, SearchDocument};
use crate::types::Result;

/// Backend for the derived search documents
#[async_trait::async_trait]
pub trait SearchIndex: Send + Sync {
    /// Backend name for logs and health output
    fn backend(&self) -> &'static str;

    /// Create the lookup indexes for `index` if they are missing
    async fn ensure_index(&self, index: &str) -> Result<()>;

    /// Insert `doc` with its relation and routing, or update its fields
    async fn upsert(&self, index: &str, doc: &SearchDocument) -> Result<()>;

    /// Fetch one document
    async fn get(&self, index: &str, id: &str) -> Result<Option<SearchDocument>>;

    /// Ids of documents of `kind` whose relation parent is `parent_id`
    async fn children_of(&self, index: &str, parent_id: &str, kind: NodeKind)
        -> Result<Vec<String>>;

    /// Remove one document; `false` if it was already gone
    async fn delete(&self, index: &str, id: &str) -> Result<bool>;

    /// Number of documents in `index`
    async fn count(&self, index: &str) -> Result<usize>;
}

#[derive(Debug, Clone)]
struct IndexedEntry {
    doc: SearchDocument,
    indexed_at: DateTime<Utc>,
}

/// In-memory search index (tests and dev mode)
#[derive(Default)]
pub struct MemorySearchIndex {
    docs: DashMap<(String, String), IndexedEntry>,
}

impl MemorySearchIndex {
    pub fn new() -> Self {
        warn!("Search index running in memory-only mode (no MongoDB)");
        Self::default()
    }

    /// When `id` was last written, if present
    pub fn indexed_at(&self, index: &str, id: &str) -> Option<DateTime<Utc>> {
        self.docs
            .get(&(index.to_string(), id.to_string()))
            .map(|e| e.indexed_at)
    }
}

#[async_trait::async_trait]
impl SearchIndex for MemorySearchIndex {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ensure_index(&self, _index: &str) -> Result<()> {
        Ok(())
    }

    async fn upsert(&self, index: &str, doc: &SearchDocument) -> Result<()> {
        let now = Utc::now();
        self.docs
            .entry((index.to_string(), doc.id.clone()))
            .and_modify(|existing| {
                existing.doc.fields = doc.fields.clone();
                existing.indexed_at = now;
            })
            .or_insert_with(|| IndexedEntry {
                doc: doc.clone(),
                indexed_at: now,
            });
        Ok(())
    }

    async fn get(&self, index: &str, id: &str) -> Result<Option<SearchDocument>> {
        Ok(self
            .docs
            .get(&(index.to_string(), id.to_string()))
            .map(|e| e.doc.clone()))
    }

    async fn children_of(
        &self,
        index: &str,
        parent_id: &str,
        kind: NodeKind,
    ) -> Result<Vec<String>> {
        Ok(self
            .docs
            .iter()
            .filter(|e| {
                let ((idx, _), entry) = (e.key(), e.value());
                idx == index
                    && entry.doc.relation.name == kind
                    && entry.doc.relation.parent.as_deref() == Some(parent_id)
            })
            .map(|e| e.value().doc.id.clone())
            .collect())
    }

    async fn delete(&self, index: &str, id: &str) -> Result<bool> {
        Ok(self
            .docs
            .remove(&(index.to_string(), id.to_string()))
            .is_some())
    }

    async fn count(&self, index: &str) -> Result<usize> {
        Ok(self.docs.iter().filter(|e| e.key().0 == index).count())
    }
}
