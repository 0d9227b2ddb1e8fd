//! Search document types
//!
//! A plan projects into a tree of five node kinds joined parent to child:
//!
//! ```text
//! plan
//! ├── planCostShares
//! └── linkedPlanServices (one per entry)
//!     ├── linkedService
//!     └── planServiceCostShares
//! ```
//!
//! Every document carries its join relation (`name` + `parent` id) and a
//! routing key equal to its nearest ancestor's id. The root has neither.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};

use crate::models::{CostShares, LinkedPlanService, LinkedService, Plan};

/// Relation name of a node in the joined tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    Plan,
    PlanCostShares,
    LinkedPlanServices,
    LinkedService,
    PlanServiceCostShares,
}

impl NodeKind {
    /// Name stored in `relation.name`
    pub fn relation_name(self) -> &'static str {
        match self {
            Self::Plan => "plan",
            Self::PlanCostShares => "planCostShares",
            Self::LinkedPlanServices => "linkedPlanServices",
            Self::LinkedService => "linkedService",
            Self::PlanServiceCostShares => "planServiceCostShares",
        }
    }

    pub fn from_relation_name(name: &str) -> Option<Self> {
        match name {
            "plan" => Some(Self::Plan),
            "planCostShares" => Some(Self::PlanCostShares),
            "linkedPlanServices" => Some(Self::LinkedPlanServices),
            "linkedService" => Some(Self::LinkedService),
            "planServiceCostShares" => Some(Self::PlanServiceCostShares),
            _ => None,
        }
    }

    /// Kinds that may sit directly beneath this one
    pub fn child_kinds(self) -> &'static [NodeKind] {
        match self {
            Self::Plan => &[Self::PlanCostShares, Self::LinkedPlanServices],
            Self::LinkedPlanServices => &[Self::LinkedService, Self::PlanServiceCostShares],
            Self::PlanCostShares | Self::LinkedService | Self::PlanServiceCostShares => &[],
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.relation_name())
    }
}

/// Join relation of a search document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRelation {
    pub name: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

/// One flattened node, borrowed from the plan it came from
#[derive(Debug, Clone, Copy)]
pub enum IndexNode<'a> {
    Plan(&'a Plan),
    PlanCostShares {
        plan_id: &'a str,
        shares: &'a CostShares,
    },
    LinkedPlanService {
        plan_id: &'a str,
        entry: &'a LinkedPlanService,
    },
    LinkedService {
        entry_id: &'a str,
        service: &'a LinkedService,
    },
    PlanServiceCostShares {
        entry_id: &'a str,
        shares: &'a CostShares,
    },
}

impl<'a> IndexNode<'a> {
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Plan(_) => NodeKind::Plan,
            Self::PlanCostShares { .. } => NodeKind::PlanCostShares,
            Self::LinkedPlanService { .. } => NodeKind::LinkedPlanServices,
            Self::LinkedService { .. } => NodeKind::LinkedService,
            Self::PlanServiceCostShares { .. } => NodeKind::PlanServiceCostShares,
        }
    }

    /// Document id (the node's own `objectId`)
    pub fn id(&self) -> &'a str {
        match self {
            Self::Plan(plan) => &plan.object_id,
            Self::PlanCostShares { shares, .. } => &shares.object_id,
            Self::LinkedPlanService { entry, .. } => &entry.object_id,
            Self::LinkedService { service, .. } => &service.object_id,
            Self::PlanServiceCostShares { shares, .. } => &shares.object_id,
        }
    }

    /// Id of the nearest ancestor, `None` for the root
    pub fn parent_id(&self) -> Option<&'a str> {
        match self {
            Self::Plan(_) => None,
            Self::PlanCostShares { plan_id, .. } | Self::LinkedPlanService { plan_id, .. } => {
                Some(plan_id)
            }
            Self::LinkedService { entry_id, .. } | Self::PlanServiceCostShares { entry_id, .. } => {
                Some(entry_id)
            }
        }
    }

    /// The node's own scalar fields; nested children are separate documents
    pub fn fields(&self) -> Map<String, JsonValue> {
        let value = match self {
            Self::Plan(plan) => json!({
                "_org": plan.org,
                "objectId": plan.object_id,
                "objectType": plan.object_type,
                "planType": plan.plan_type,
                "creationDate": plan.creation_date,
            }),
            Self::PlanCostShares { shares, .. } | Self::PlanServiceCostShares { shares, .. } => {
                json!({
                    "_org": shares.org,
                    "copay": shares.copay,
                    "deductible": shares.deductible,
                    "objectId": shares.object_id,
                    "objectType": shares.object_type,
                })
            }
            Self::LinkedPlanService { entry, .. } => json!({
                "_org": entry.org,
                "objectId": entry.object_id,
                "objectType": entry.object_type,
            }),
            Self::LinkedService { service, .. } => json!({
                "_org": service.org,
                "objectId": service.object_id,
                "objectType": service.object_type,
                "name": service.name,
            }),
        };

        match value {
            JsonValue::Object(map) => map,
            _ => Map::new(),
        }
    }

    /// Build the search document for this node
    pub fn to_document(&self) -> SearchDocument {
        let parent = self.parent_id().map(str::to_string);
        SearchDocument {
            id: self.id().to_string(),
            relation: JoinRelation {
                name: self.kind(),
                parent: parent.clone(),
            },
            routing: parent,
            fields: self.fields(),
        }
    }
}

/// A document in the search index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchDocument {
    pub id: String,
    pub relation: JoinRelation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing: Option<String>,
    pub fields: Map<String, JsonValue>,
}

impl SearchDocument {
    pub fn kind(&self) -> NodeKind {
        self.relation.name
    }
}
