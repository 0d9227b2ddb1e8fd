//! MongoDB canonical store

use bson::{doc, DateTime};
use tracing::{debug, info};

use super::{PlanStore, StoredPlan};
use crate::db::schemas::PlanRecordDoc;
use crate::db::{MongoClient, MongoCollection};
use crate::models::Plan;
use crate::types::{PlanError, Result};

/// Plan store over a single MongoDB collection
pub struct MongoPlanStore {
    collection: MongoCollection<PlanRecordDoc>,
}

impl MongoPlanStore {
    pub async fn new(mongo: &MongoClient, collection_name: &str) -> Result<Self> {
        let collection = mongo.collection::<PlanRecordDoc>(collection_name).await?;
        info!(collection = collection_name, "Canonical plan store ready");
        Ok(Self { collection })
    }

    fn decode(doc: PlanRecordDoc) -> Result<StoredPlan> {
        let plan: Plan = serde_json::from_str(&doc.body).map_err(|e| {
            PlanError::Internal(format!("stored plan {} is unreadable: {}", doc._id, e))
        })?;
        Ok(StoredPlan {
            id: doc._id,
            plan,
            body: doc.body,
            etag: doc.etag,
        })
    }
}

#[async_trait::async_trait]
impl PlanStore for MongoPlanStore {
    fn backend(&self) -> &'static str {
        "mongodb"
    }

    async fn get(&self, id: &str) -> Result<Option<StoredPlan>> {
        self.collection
            .find_one(doc! { "_id": id })
            .await?
            .map(Self::decode)
            .transpose()
    }

    async fn insert(&self, record: &StoredPlan) -> Result<()> {
        let doc = PlanRecordDoc::new(&record.id, &record.body, &record.etag);
        if self.collection.insert_unique(doc).await? {
            debug!(doc_id = %record.id, "Inserted canonical plan");
            Ok(())
        } else {
            Err(PlanError::Conflict(format!("plan {} already exists", record.id)))
        }
    }

    async fn replace_if_match(&self, expected_etag: &str, record: &StoredPlan) -> Result<bool> {
        let result = self
            .collection
            .update_one(
                doc! { "_id": &record.id, "etag": expected_etag },
                doc! { "$set": {
                    "body": &record.body,
                    "etag": &record.etag,
                    "metadata.updated_at": DateTime::now(),
                }},
            )
            .await?;
        Ok(result.matched_count == 1)
    }

    async fn delete_if_match(&self, id: &str, expected_etag: &str) -> Result<bool> {
        let result = self
            .collection
            .delete_one(doc! { "_id": id, "etag": expected_etag })
            .await?;
        Ok(result.deleted_count == 1)
    }

    async fn list(&self) -> Result<Vec<StoredPlan>> {
        self.collection
            .find_many(doc! {})
            .await?
            .into_iter()
            .map(Self::decode)
            .collect()
    }
}
