//! In-memory canonical store for tests and dev mode

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::{PlanStore, StoredPlan};
use crate::types::{PlanError, Result};

/// DashMap-backed plan store
#[derive(Default)]
pub struct MemoryPlanStore {
    records: DashMap<String, StoredPlan>,
}

impl MemoryPlanStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait::async_trait]
impl PlanStore for MemoryPlanStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, id: &str) -> Result<Option<StoredPlan>> {
        Ok(self.records.get(id).map(|r| r.value().clone()))
    }

    async fn insert(&self, record: &StoredPlan) -> Result<()> {
        match self.records.entry(record.id.clone()) {
            Entry::Occupied(_) => Err(PlanError::Conflict(format!(
                "plan {} already exists",
                record.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(())
            }
        }
    }

    async fn replace_if_match(&self, expected_etag: &str, record: &StoredPlan) -> Result<bool> {
        match self.records.get_mut(&record.id) {
            Some(mut current) if current.etag == expected_etag => {
                *current = record.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_if_match(&self, id: &str, expected_etag: &str) -> Result<bool> {
        Ok(self
            .records
            .remove_if(id, |_, current| current.etag == expected_etag)
            .is_some())
    }

    async fn list(&self) -> Result<Vec<StoredPlan>> {
        Ok(self.records.iter().map(|r| r.value().clone()).collect())
    }
}
