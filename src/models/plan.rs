//! Plan record and its embedded sub-entities
//!
//! Field names follow the public JSON contract exactly, including the
//! `_org` prefix and the lower-case `planserviceCostShares` key.

use serde::{Deserialize, Serialize};

/// Cost shares attached to a plan or to a linked service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostShares {
    pub deductible: i64,
    #[serde(rename = "_org")]
    pub org: String,
    pub copay: i64,
    #[serde(rename = "objectId")]
    pub object_id: String,
    #[serde(rename = "objectType")]
    pub object_type: String,
}

/// Descriptor of the service a linked entry points at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedService {
    #[serde(rename = "_org")]
    pub org: String,
    #[serde(rename = "objectId")]
    pub object_id: String,
    #[serde(rename = "objectType")]
    pub object_type: String,
    pub name: String,
}

/// One entry of a plan's linked-service collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedPlanService {
    #[serde(rename = "linkedService")]
    pub linked_service: LinkedService,
    #[serde(rename = "planserviceCostShares")]
    pub plan_service_cost_shares: CostShares,
    #[serde(rename = "_org")]
    pub org: String,
    #[serde(rename = "objectId")]
    pub object_id: String,
    #[serde(rename = "objectType")]
    pub object_type: String,
}

/// The canonical plan record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(rename = "planCostShares")]
    pub plan_cost_shares: CostShares,
    #[serde(rename = "linkedPlanServices")]
    pub linked_plan_services: Vec<LinkedPlanService>,
    #[serde(rename = "_org")]
    pub org: String,
    #[serde(rename = "objectId")]
    pub object_id: String,
    #[serde(rename = "objectType")]
    pub object_type: String,
    #[serde(rename = "planType")]
    pub plan_type: String,
    #[serde(rename = "creationDate")]
    pub creation_date: String,
}

impl Plan {
    /// Canonical serialized form, the input to the fingerprint
    pub fn to_canonical_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Number of documents this plan projects into the search store
    pub fn derived_document_count(&self) -> usize {
        2 + 3 * self.linked_plan_services.len()
    }
}
