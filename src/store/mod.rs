//! Canonical plan store
//!
//! The authoritative copy of every plan, keyed by its top-level `objectId`.
//! Writes after creation are compare-and-set on the fingerprint observed by
//! the caller, so two racing writers cannot both win.

mod memory;
mod mongo;

pub use memory::MemoryPlanStore;
pub use mongo::MongoPlanStore;

use crate::concurrency::fingerprint::fingerprint_plan;
use crate::models::Plan;
use crate::types::Result;

/// A plan as held by the canonical store
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPlan {
    pub id: String,
    pub plan: Plan,
    /// Exact serialized form the fingerprint covers
    pub body: String,
    pub etag: String,
}

impl StoredPlan {
    /// Serialize and fingerprint a plan for storage
    pub fn from_plan(plan: Plan) -> Result<Self> {
        let (body, etag) = fingerprint_plan(&plan)?;
        Ok(Self {
            id: plan.object_id.clone(),
            plan,
            body,
            etag,
        })
    }
}

/// Storage backend for canonical plan records
#[async_trait::async_trait]
pub trait PlanStore: Send + Sync {
    /// Backend name for logs and health output
    fn backend(&self) -> &'static str;

    /// Fetch a record by id
    async fn get(&self, id: &str) -> Result<Option<StoredPlan>>;

    /// Insert a new record; `Conflict` if the id is taken
    async fn insert(&self, record: &StoredPlan) -> Result<()>;

    /// Replace `record.id` only if its current fingerprint is `expected_etag`.
    ///
    /// Returns `false` when the record changed or vanished since it was read.
    async fn replace_if_match(&self, expected_etag: &str, record: &StoredPlan) -> Result<bool>;

    /// Delete `id` only if its current fingerprint is `expected_etag`
    async fn delete_if_match(&self, id: &str, expected_etag: &str) -> Result<bool>;

    /// Every stored record, in no particular order
    async fn list(&self) -> Result<Vec<StoredPlan>>;
}
