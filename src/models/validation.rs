//! Field-level validation for plan records
//!
//! Collects every violation before failing so a caller sees the whole list
//! in one response.

use chrono::NaiveDate;

use super::plan::{CostShares, LinkedPlanService, LinkedService, Plan};
use crate::types::{PlanError, Result};

/// Date format required for `creationDate` (e.g. `12-31-2017`)
pub const CREATION_DATE_FORMAT: &str = "%m-%d-%Y";

#[derive(Default)]
struct Violations(Vec<String>);

impl Violations {
    fn required(&mut self, path: &str, value: &str) {
        if value.trim().is_empty() {
            self.0.push(format!("{path} is required"));
        }
    }

    fn non_negative(&mut self, path: &str, value: i64) {
        if value < 0 {
            self.0.push(format!("{path} must be >= 0 (got {value})"));
        }
    }

    fn into_result(self) -> Result<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(PlanError::Validation(self.0.join("; ")))
        }
    }
}

/// Validate a complete plan record
pub fn validate_plan(plan: &Plan) -> Result<()> {
    let mut v = Violations::default();

    v.required("objectId", &plan.object_id);
    v.required("objectType", &plan.object_type);
    v.required("_org", &plan.org);
    v.required("planType", &plan.plan_type);
    v.required("creationDate", &plan.creation_date);
    if !plan.creation_date.trim().is_empty() && !is_valid_creation_date(&plan.creation_date) {
        v.0.push(format!(
            "creationDate must use MM-DD-YYYY (got {:?})",
            plan.creation_date
        ));
    }

    check_cost_shares(&mut v, "planCostShares", &plan.plan_cost_shares);

    for (i, entry) in plan.linked_plan_services.iter().enumerate() {
        check_linked_entry(&mut v, &format!("linkedPlanServices[{i}]"), entry);
    }

    v.into_result()
}

/// Whether `date` parses under the fixed creation date format
pub fn is_valid_creation_date(date: &str) -> bool {
    NaiveDate::parse_from_str(date, CREATION_DATE_FORMAT).is_ok()
}

fn check_cost_shares(v: &mut Violations, path: &str, cs: &CostShares) {
    v.required(&format!("{path}.objectId"), &cs.object_id);
    v.required(&format!("{path}.objectType"), &cs.object_type);
    v.required(&format!("{path}._org"), &cs.org);
    v.non_negative(&format!("{path}.deductible"), cs.deductible);
    v.non_negative(&format!("{path}.copay"), cs.copay);
}

fn check_descriptor(v: &mut Violations, path: &str, svc: &LinkedService) {
    v.required(&format!("{path}.objectId"), &svc.object_id);
    v.required(&format!("{path}.objectType"), &svc.object_type);
    v.required(&format!("{path}._org"), &svc.org);
    v.required(&format!("{path}.name"), &svc.name);
}

fn check_linked_entry(v: &mut Violations, path: &str, entry: &LinkedPlanService) {
    v.required(&format!("{path}.objectId"), &entry.object_id);
    v.required(&format!("{path}.objectType"), &entry.object_type);
    v.required(&format!("{path}._org"), &entry.org);
    check_descriptor(v, &format!("{path}.linkedService"), &entry.linked_service);
    check_cost_shares(
        v,
        &format!("{path}.planserviceCostShares"),
        &entry.plan_service_cost_shares,
    );
}
