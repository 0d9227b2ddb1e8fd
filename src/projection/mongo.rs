//! MongoDB search index
//!
//! Each search index is a collection of untyped documents shaped as
//! `{_id, relation: {name, parent?}, routing?, ...fields, indexed_at}`.

use bson::{doc, Bson, DateTime, Document};
use futures_util::TryStreamExt;
use mongodb::options::{FindOptions, IndexOptions, UpdateOptions};
use mongodb::{Collection, IndexModel};
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, info, warn};

use super::document::{JoinRelation, NodeKind, SearchDocument};
use super::store::SearchIndex;
use crate::db::MongoClient;
use crate::types::{PlanError, Result};

const RESERVED_KEYS: [&str; 4] = ["_id", "relation", "routing", "indexed_at"];

/// Search index backed by one MongoDB collection per index name
pub struct MongoSearchIndex {
    mongo: MongoClient,
}

impl MongoSearchIndex {
    pub fn new(mongo: MongoClient) -> Self {
        Self { mongo }
    }

    fn collection(&self, index: &str) -> Collection<Document> {
        self.mongo
            .inner()
            .database(self.mongo.db_name())
            .collection::<Document>(index)
    }

    fn decode(raw: Document) -> Result<SearchDocument> {
        let id = raw
            .get_str("_id")
            .map_err(|e| PlanError::Search(format!("search document without string _id: {e}")))?
            .to_string();
        let relation: JoinRelation = match raw.get_document("relation") {
            Ok(rel) => bson::from_document(rel.clone())
                .map_err(|e| PlanError::Search(format!("bad relation on {id}: {e}")))?,
            Err(e) => return Err(PlanError::Search(format!("document {id} has no relation: {e}"))),
        };
        let routing = raw.get_str("routing").ok().map(str::to_string);

        let fields: Map<String, JsonValue> = raw
            .into_iter()
            .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key, value.into_relaxed_extjson()))
            .collect();

        Ok(SearchDocument {
            id,
            relation,
            routing,
            fields,
        })
    }
}

#[async_trait::async_trait]
impl SearchIndex for MongoSearchIndex {
    fn backend(&self) -> &'static str {
        "mongodb"
    }

    async fn ensure_index(&self, index: &str) -> Result<()> {
        let collection = self.collection(index);

        let indexes = vec![
            (doc! { "relation.parent": 1, "relation.name": 1 }, "relation_parent_name"),
            (doc! { "routing": 1 }, "routing"),
        ];

        for (keys, name) in indexes {
            let model = IndexModel::builder()
                .keys(keys)
                .options(IndexOptions::builder().name(name.to_string()).build())
                .build();
            if let Err(e) = collection.create_index(model).await {
                warn!(index, "Failed to create search index {}: {}", name, e);
            }
        }

        info!(index, "Search index ready");
        Ok(())
    }

    async fn upsert(&self, index: &str, doc: &SearchDocument) -> Result<()> {
        let mut set = bson::to_document(&doc.fields)?;
        set.insert("indexed_at", DateTime::now());

        let mut on_insert = doc! { "relation": bson::to_bson(&doc.relation)? };
        if let Some(routing) = &doc.routing {
            on_insert.insert("routing", routing.as_str());
        }

        self.collection(index)
            .update_one(
                doc! { "_id": &doc.id },
                doc! { "$set": set, "$setOnInsert": on_insert },
            )
            .with_options(UpdateOptions::builder().upsert(true).build())
            .await
            .map_err(|e| PlanError::Search(format!("Upsert of {} failed: {}", doc.id, e)))?;

        debug!(index, doc_id = %doc.id, kind = %doc.kind(), "Search document upserted");
        Ok(())
    }

    async fn get(&self, index: &str, id: &str) -> Result<Option<SearchDocument>> {
        self.collection(index)
            .find_one(doc! { "_id": id })
            .await
            .map_err(|e| PlanError::Search(format!("Find failed: {}", e)))?
            .map(Self::decode)
            .transpose()
    }

    async fn children_of(
        &self,
        index: &str,
        parent_id: &str,
        kind: NodeKind,
    ) -> Result<Vec<String>> {
        let options = FindOptions::builder().projection(doc! { "_id": 1 }).build();
        let cursor = self
            .collection(index)
            .find(doc! { "relation.parent": parent_id, "relation.name": kind.relation_name() })
            .with_options(options)
            .await
            .map_err(|e| PlanError::Search(format!("Child query failed: {}", e)))?;

        let docs: Vec<Document> = cursor
            .try_collect()
            .await
            .map_err(|e| PlanError::Search(format!("Child query failed: {}", e)))?;

        Ok(docs
            .into_iter()
            .filter_map(|d| match d.get("_id") {
                Some(Bson::String(id)) => Some(id.clone()),
                _ => None,
            })
            .collect())
    }

    async fn delete(&self, index: &str, id: &str) -> Result<bool> {
        let result = self
            .collection(index)
            .delete_one(doc! { "_id": id })
            .await
            .map_err(|e| PlanError::Search(format!("Delete of {} failed: {}", id, e)))?;
        Ok(result.deleted_count == 1)
    }

    async fn count(&self, index: &str) -> Result<usize> {
        let n = self
            .collection(index)
            .count_documents(doc! {})
            .await
            .map_err(|e| PlanError::Search(format!("Count failed: {}", e)))?;
        Ok(n as usize)
    }
}
