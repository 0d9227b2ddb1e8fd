//! Conditional mutation protocol for canonical plan records
//!
//! Every mutation reads the current record, checks the caller's conditional
//! headers against its fingerprint, then commits with a compare-and-set on
//! that same fingerprint. A writer that loses the race between check and
//! commit gets `PreconditionFailed`. After a commit the change event is
//! published; a failed publish fails the request even though the new value
//! is already stored.

use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::preconditions::Preconditions;
use crate::models::{merge_plan, validate_plan, Plan};
use crate::nats::{ChangeEvent, ChangePublisher, Operation};
use crate::store::{PlanStore, StoredPlan};
use crate::types::{PlanError, Result};

/// Result of a conditional read
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    Found(StoredPlan),
    /// The caller already holds the current version
    NotModified { etag: String },
}

/// Result of a conditional merge
#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    Updated(StoredPlan),
    /// `If-None-Match` named the current version; nothing was written
    NotModified { etag: String },
}

pub struct PlanController {
    store: Arc<dyn PlanStore>,
    publisher: Arc<dyn ChangePublisher>,
    index_name: String,
}

impl PlanController {
    pub fn new(
        store: Arc<dyn PlanStore>,
        publisher: Arc<dyn ChangePublisher>,
        index_name: impl Into<String>,
    ) -> Self {
        Self {
            store,
            publisher,
            index_name: index_name.into(),
        }
    }

    pub fn store(&self) -> &Arc<dyn PlanStore> {
        &self.store
    }

    pub fn publisher(&self) -> &Arc<dyn ChangePublisher> {
        &self.publisher
    }

    /// Create a new record; `Conflict` if the id is taken
    pub async fn create(&self, plan: Plan) -> Result<StoredPlan> {
        validate_plan(&plan)?;
        let record = StoredPlan::from_plan(plan)?;

        self.store.insert(&record).await?;
        info!(doc_id = %record.id, etag = %record.etag, "Plan created");

        self.publish(ChangeEvent::write(Operation::Post, &self.index_name, record.plan.clone()))
            .await?;
        Ok(record)
    }

    /// Read a record, honoring `If-None-Match`
    pub async fn get(&self, id: &str, pre: &Preconditions) -> Result<ReadOutcome> {
        let current = self.load(id).await?;
        if pre.forbidden_match(&current.etag) {
            return Ok(ReadOutcome::NotModified { etag: current.etag });
        }
        Ok(ReadOutcome::Found(current))
    }

    /// Replace a record wholesale
    pub async fn replace(&self, id: &str, plan: Plan, pre: &Preconditions) -> Result<StoredPlan> {
        validate_plan(&plan)?;
        if plan.object_id != id {
            return Err(PlanError::Validation(format!(
                "objectId {} does not match path id {}",
                plan.object_id, id
            )));
        }

        let current = self.load(id).await?;
        self.check_write(&current, pre)?;
        if pre.forbidden_match(&current.etag) {
            return Err(PlanError::PreconditionFailed(
                "resource already matches If-None-Match".into(),
            ));
        }

        let next = StoredPlan::from_plan(plan)?;
        self.commit(&current, &next).await?;
        self.publish(ChangeEvent::write(Operation::Put, &self.index_name, next.plan.clone()))
            .await?;
        Ok(next)
    }

    /// Merge a partial update into a record
    pub async fn merge(&self, id: &str, update: &JsonValue, pre: &Preconditions) -> Result<MergeOutcome> {
        let current = self.load(id).await?;
        self.check_write(&current, pre)?;
        if pre.forbidden_match(&current.etag) {
            debug!(doc_id = %id, "Merge skipped, caller holds current version");
            return Ok(MergeOutcome::NotModified { etag: current.etag });
        }

        let merged = merge_plan(&current.plan, update)?;
        let next = StoredPlan::from_plan(merged)?;
        self.commit(&current, &next).await?;
        self.publish(ChangeEvent::write(Operation::Patch, &self.index_name, next.plan.clone()))
            .await?;
        Ok(MergeOutcome::Updated(next))
    }

    /// Delete a record; requires `If-Match`
    pub async fn delete(&self, id: &str, pre: &Preconditions) -> Result<()> {
        let current = self.load(id).await?;
        match pre.required_match(&current.etag) {
            None => {
                return Err(PlanError::PreconditionRequired(
                    "If-Match header is required".into(),
                ))
            }
            Some(false) => return Err(stale()),
            Some(true) => {}
        }

        if !self.store.delete_if_match(id, &current.etag).await? {
            return Err(stale());
        }
        info!(doc_id = %id, "Plan deleted");

        self.publish(ChangeEvent::delete(&self.index_name, id)).await
    }

    /// Republish a write event for every stored record.
    ///
    /// Repairs drift left by failed publishes or abandoned index events.
    pub async fn reindex_all(&self) -> Result<usize> {
        let records = self.store.list().await?;
        for record in &records {
            self.publish(ChangeEvent::write(Operation::Put, &self.index_name, record.plan.clone()))
                .await?;
        }
        info!(published = records.len(), "Reindex events published");
        Ok(records.len())
    }

    async fn load(&self, id: &str) -> Result<StoredPlan> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| PlanError::NotFound(format!("plan {} not found", id)))
    }

    /// Shared replace/merge checks: some precondition present, `If-Match` current
    fn check_write(&self, current: &StoredPlan, pre: &Preconditions) -> Result<()> {
        if pre.is_empty() {
            return Err(PlanError::PreconditionRequired(
                "At least one of If-Match or If-None-Match headers is required".into(),
            ));
        }
        if pre.required_match(&current.etag) == Some(false) {
            return Err(stale());
        }
        Ok(())
    }

    async fn commit(&self, current: &StoredPlan, next: &StoredPlan) -> Result<()> {
        if !self.store.replace_if_match(&current.etag, next).await? {
            warn!(doc_id = %next.id, "Lost write race, record changed since precondition check");
            return Err(stale());
        }
        info!(doc_id = %next.id, etag = %next.etag, "Plan updated");
        Ok(())
    }

    async fn publish(&self, event: ChangeEvent) -> Result<()> {
        self.publisher.publish(&event).await.map_err(|e| {
            warn!(
                doc_id = %event.doc_id,
                operation = %event.operation,
                "Committed but failed to queue change event: {}", e
            );
            match e {
                PlanError::Queue(_) => e,
                other => PlanError::Queue(other.to_string()),
            }
        })
    }
}

fn stale() -> PlanError {
    PlanError::PreconditionFailed(
        "ETag mismatch. The resource has been modified by another process.".into(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concurrency::fingerprint::to_entity_tag;
    use crate::models::plan::fixtures;
    use crate::nats::{memory_queue, ChangeSource, MemorySource};
    use crate::store::MemoryPlanStore;
    use serde_json::json;

    struct DownPublisher;

    #[async_trait::async_trait]
    impl ChangePublisher for DownPublisher {
        fn backend(&self) -> &'static str {
            "down"
        }
        async fn publish(&self, _event: &ChangeEvent) -> Result<()> {
            Err(PlanError::Queue("broker unreachable".into()))
        }
    }

    /// Memory store whose full scan fails, like a cursor dropped mid-read
    struct BrokenListStore(MemoryPlanStore);

    #[async_trait::async_trait]
    impl PlanStore for BrokenListStore {
        fn backend(&self) -> &'static str {
            "broken-list"
        }
        async fn get(&self, id: &str) -> Result<Option<StoredPlan>> {
            self.0.get(id).await
        }
        async fn insert(&self, record: &StoredPlan) -> Result<()> {
            self.0.insert(record).await
        }
        async fn replace_if_match(&self, expected_etag: &str, record: &StoredPlan) -> Result<bool> {
            self.0.replace_if_match(expected_etag, record).await
        }
        async fn delete_if_match(&self, id: &str, expected_etag: &str) -> Result<bool> {
            self.0.delete_if_match(id, expected_etag).await
        }
        async fn list(&self) -> Result<Vec<StoredPlan>> {
            Err(PlanError::Database("Reading documents failed: cursor killed".into()))
        }
    }

    fn setup() -> (PlanController, Arc<MemoryPlanStore>, MemorySource) {
        let store = Arc::new(MemoryPlanStore::new());
        let (publisher, source) = memory_queue();
        let controller = PlanController::new(store.clone(), Arc::new(publisher), "plans");
        (controller, store, source)
    }

    async fn next_event(source: &mut MemorySource) -> ChangeEvent {
        let delivery = source.next().await.unwrap().unwrap();
        ChangeEvent::from_bytes(delivery.payload()).unwrap()
    }

    #[tokio::test]
    async fn test_create_publishes_post() {
        let (controller, _, mut source) = setup();
        let record = controller.create(fixtures::plan("p1", &["e1"])).await.unwrap();

        let event = next_event(&mut source).await;
        assert_eq!(event.operation, Operation::Post);
        assert_eq!(event.doc_id, "p1");
        assert_eq!(event.payload, Some(record.plan));
    }

    #[tokio::test]
    async fn test_create_conflict() {
        let (controller, _, _source) = setup();
        controller.create(fixtures::plan("p1", &[])).await.unwrap();

        let err = controller.create(fixtures::plan("p1", &[])).await.unwrap_err();
        assert!(matches!(err, PlanError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_get_not_modified() {
        let (controller, _, _source) = setup();
        let record = controller.create(fixtures::plan("p1", &[])).await.unwrap();

        let outcome = controller
            .get("p1", &Preconditions::if_none_match(to_entity_tag(&record.etag)))
            .await
            .unwrap();
        assert_eq!(outcome, ReadOutcome::NotModified { etag: record.etag.clone() });

        let outcome = controller
            .get("p1", &Preconditions::if_none_match("\"old\""))
            .await
            .unwrap();
        assert!(matches!(outcome, ReadOutcome::Found(_)));

        let err = controller.get("missing", &Preconditions::default()).await.unwrap_err();
        assert!(matches!(err, PlanError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_replace_protocol() {
        let (controller, _, _source) = setup();
        let record = controller.create(fixtures::plan("p1", &[])).await.unwrap();
        let next = || fixtures::plan("p1", &["e1"]);

        let err = controller
            .replace("p1", next(), &Preconditions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PlanError::PreconditionRequired(_)));

        let err = controller
            .replace("p1", next(), &Preconditions::if_match("\"stale\""))
            .await
            .unwrap_err();
        assert!(matches!(err, PlanError::PreconditionFailed(_)));

        let err = controller
            .replace("p1", next(), &Preconditions::if_none_match(to_entity_tag(&record.etag)))
            .await
            .unwrap_err();
        assert!(matches!(err, PlanError::PreconditionFailed(_)));

        let updated = controller
            .replace("p1", next(), &Preconditions::if_match(to_entity_tag(&record.etag)))
            .await
            .unwrap();
        assert_ne!(updated.etag, record.etag);
        assert_eq!(updated.plan.linked_plan_services.len(), 1);
    }

    #[tokio::test]
    async fn test_replace_identity_and_existence() {
        let (controller, _, _source) = setup();

        let err = controller
            .replace("p1", fixtures::plan("p1", &[]), &Preconditions::if_match("*"))
            .await
            .unwrap_err();
        assert!(matches!(err, PlanError::NotFound(_)));

        controller.create(fixtures::plan("p1", &[])).await.unwrap();
        let err = controller
            .replace("p1", fixtures::plan("p2", &[]), &Preconditions::if_match("*"))
            .await
            .unwrap_err();
        assert!(matches!(err, PlanError::Validation(_)));
    }

    #[tokio::test]
    async fn test_stale_writer_loses_race() {
        let (controller, store, _source) = setup();
        let record = controller.create(fixtures::plan("p1", &[])).await.unwrap();

        // Another writer commits between our read and our commit.
        let other = StoredPlan::from_plan(fixtures::plan("p1", &["x"])).unwrap();
        assert!(store.replace_if_match(&record.etag, &other).await.unwrap());

        let err = controller
            .replace("p1", fixtures::plan("p1", &["y"]), &Preconditions::if_match(&record.etag))
            .await
            .unwrap_err();
        assert!(matches!(err, PlanError::PreconditionFailed(_)));
        assert_eq!(store.get("p1").await.unwrap().unwrap().etag, other.etag);
    }

    #[tokio::test]
    async fn test_merge_outcomes() {
        let (controller, _, mut source) = setup();
        let record = controller
            .create(fixtures::plan("p1", &["a", "b", "c"]))
            .await
            .unwrap();
        next_event(&mut source).await;

        let not_modified = controller
            .merge("p1", &json!({}), &Preconditions::if_none_match(to_entity_tag(&record.etag)))
            .await
            .unwrap();
        assert_eq!(not_modified, MergeOutcome::NotModified { etag: record.etag.clone() });

        let mut replaced = fixtures::linked("b");
        replaced.linked_service.name = "Renamed".into();
        let update = json!({ "linkedPlanServices": [replaced, fixtures::linked("d")] });

        let outcome = controller
            .merge("p1", &update, &Preconditions::if_match(to_entity_tag(&record.etag)))
            .await
            .unwrap();
        let MergeOutcome::Updated(updated) = outcome else {
            panic!("expected an update");
        };
        assert_eq!(updated.plan.linked_plan_services.len(), 4);

        let event = next_event(&mut source).await;
        assert_eq!(event.operation, Operation::Patch);
        assert_eq!(event.payload.unwrap().linked_plan_services.len(), 4);
    }

    #[tokio::test]
    async fn test_merge_requires_precondition() {
        let (controller, _, _source) = setup();
        controller.create(fixtures::plan("p1", &[])).await.unwrap();

        let err = controller
            .merge("p1", &json!({ "planType": "x" }), &Preconditions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PlanError::PreconditionRequired(_)));
    }

    #[tokio::test]
    async fn test_delete_protocol() {
        let (controller, store, mut source) = setup();
        let record = controller.create(fixtures::plan("p1", &[])).await.unwrap();
        next_event(&mut source).await;

        let err = controller
            .delete("p1", &Preconditions::if_none_match("*"))
            .await
            .unwrap_err();
        assert!(matches!(err, PlanError::PreconditionRequired(_)));

        let err = controller
            .delete("p1", &Preconditions::if_match("\"stale\""))
            .await
            .unwrap_err();
        assert!(matches!(err, PlanError::PreconditionFailed(_)));

        controller
            .delete("p1", &Preconditions::if_match(to_entity_tag(&record.etag)))
            .await
            .unwrap();
        assert!(store.is_empty());

        let event = next_event(&mut source).await;
        assert_eq!(event, ChangeEvent::delete("plans", "p1"));

        let err = controller
            .delete("p1", &Preconditions::if_match("*"))
            .await
            .unwrap_err();
        assert!(matches!(err, PlanError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_publish_failure_reported_after_commit() {
        let store = Arc::new(MemoryPlanStore::new());
        let controller = PlanController::new(store.clone(), Arc::new(DownPublisher), "plans");

        let err = controller.create(fixtures::plan("p1", &[])).await.unwrap_err();
        assert!(matches!(err, PlanError::Queue(_)));
        assert_eq!(err.status_code(), hyper::StatusCode::SERVICE_UNAVAILABLE);
        // The canonical write is not rolled back.
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_reindex_all_republishes_every_record() {
        let (controller, _, mut source) = setup();
        controller.create(fixtures::plan("p1", &[])).await.unwrap();
        controller.create(fixtures::plan("p2", &[])).await.unwrap();
        next_event(&mut source).await;
        next_event(&mut source).await;

        assert_eq!(controller.reindex_all().await.unwrap(), 2);
        for _ in 0..2 {
            assert_eq!(next_event(&mut source).await.operation, Operation::Put);
        }
    }

    #[tokio::test]
    async fn test_reindex_fails_when_listing_fails() {
        let (publisher, _source) = memory_queue();
        let stats = publisher.stats();
        let controller = PlanController::new(
            Arc::new(BrokenListStore(MemoryPlanStore::new())),
            Arc::new(publisher),
            "plans",
        );
        controller.create(fixtures::plan("p1", &[])).await.unwrap();

        let err = controller.reindex_all().await.unwrap_err();
        assert!(matches!(err, PlanError::Database(_)));
        assert_eq!(err.status_code(), hyper::StatusCode::SERVICE_UNAVAILABLE);
        // Only the create was published; no partial reindex went out.
        assert_eq!(stats.published(), 1);
    }
}
