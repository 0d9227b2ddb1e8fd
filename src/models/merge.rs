//! Partial-update (PATCH) semantics for plan records
//!
//! Top-level fields are overwritten wholesale. The linked-service collection
//! is the one exception: entries are matched by `objectId`, replaced in place
//! when present and appended when new; entries the update does not name are
//! kept as they are.

use serde_json::{Map, Value as JsonValue};

use super::plan::{LinkedPlanService, Plan};
use super::validation::validate_plan;
use crate::types::{PlanError, Result};

const LINKED_SERVICES_FIELD: &str = "linkedPlanServices";
const OBJECT_ID_FIELD: &str = "objectId";

/// Apply a merge-patch body to `current`, returning the validated result.
///
/// `current` is left untouched; the caller commits the returned plan.
pub fn merge_plan(current: &Plan, update: &JsonValue) -> Result<Plan> {
    let update = update
        .as_object()
        .ok_or_else(|| PlanError::BadRequest("merge body must be a JSON object".into()))?;

    let mut merged = serde_json::to_value(current)?;
    let target = merged
        .as_object_mut()
        .ok_or_else(|| PlanError::Internal("plan did not serialize to an object".into()))?;

    for (key, value) in update {
        match key.as_str() {
            LINKED_SERVICES_FIELD => merge_linked_services(target, value)?,
            OBJECT_ID_FIELD if value.as_str() != Some(current.object_id.as_str()) => {
                return Err(PlanError::Validation("objectId cannot be changed".into()));
            }
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }

    let plan: Plan = serde_json::from_value(merged)
        .map_err(|e| PlanError::Validation(format!("merged plan is malformed: {e}")))?;
    validate_plan(&plan)?;
    Ok(plan)
}

fn merge_linked_services(target: &mut Map<String, JsonValue>, value: &JsonValue) -> Result<()> {
    let incoming = value.as_array().ok_or_else(|| {
        PlanError::Validation(format!("{LINKED_SERVICES_FIELD} must be an array"))
    })?;

    let existing = target
        .get(LINKED_SERVICES_FIELD)
        .cloned()
        .unwrap_or(JsonValue::Array(Vec::new()));
    let mut entries: Vec<LinkedPlanService> = serde_json::from_value(existing)?;

    for (i, raw) in incoming.iter().enumerate() {
        let entry: LinkedPlanService = serde_json::from_value(raw.clone()).map_err(|e| {
            PlanError::Validation(format!("{LINKED_SERVICES_FIELD}[{i}] is malformed: {e}"))
        })?;

        match entries.iter_mut().find(|e| e.object_id == entry.object_id) {
            Some(slot) => *slot = entry,
            None => entries.push(entry),
        }
    }

    target.insert(LINKED_SERVICES_FIELD.into(), serde_json::to_value(entries)?);
    Ok(())
}
