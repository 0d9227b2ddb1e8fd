//! Flattens a plan into its joined node list
//!
//! Output order is ancestors first: every node appears after its parent, so
//! writing the list front to back never creates an orphan.

use super::document::IndexNode;
use crate::models::Plan;

/// Flatten `plan` into `2 + 3N` nodes, parents before children
pub fn flatten(plan: &Plan) -> Vec<IndexNode<'_>> {
    let plan_id = plan.object_id.as_str();
    let mut nodes = Vec::with_capacity(plan.derived_document_count());

    nodes.push(IndexNode::Plan(plan));
    nodes.push(IndexNode::PlanCostShares {
        plan_id,
        shares: &plan.plan_cost_shares,
    });

    for entry in &plan.linked_plan_services {
        let entry_id = entry.object_id.as_str();
        nodes.push(IndexNode::LinkedPlanService { plan_id, entry });
        nodes.push(IndexNode::LinkedService {
            entry_id,
            service: &entry.linked_service,
        });
        nodes.push(IndexNode::PlanServiceCostShares {
            entry_id,
            shares: &entry.plan_service_cost_shares,
        });
    }

    nodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::plan::fixtures;
    use crate::projection::document::NodeKind;
    use std::collections::HashSet;

    #[test]
    fn test_node_count() {
        for n in 0..4 {
            let ids: Vec<String> = (0..n).map(|i| format!("e{i}")).collect();
            let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
            let plan = fixtures::plan("p1", &refs);
            assert_eq!(flatten(&plan).len(), 2 + 3 * n);
        }
    }

    #[test]
    fn test_parents_precede_children() {
        let plan = fixtures::plan("p1", &["e1", "e2"]);
        let mut seen = HashSet::new();

        for node in flatten(&plan) {
            if let Some(parent) = node.parent_id() {
                assert!(seen.contains(parent), "{} written before {}", node.id(), parent);
            }
            seen.insert(node.id());
        }
    }

    #[test]
    fn test_kinds_in_order() {
        let plan = fixtures::plan("p1", &["e1"]);
        let kinds: Vec<NodeKind> = flatten(&plan).iter().map(|n| n.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                NodeKind::Plan,
                NodeKind::PlanCostShares,
                NodeKind::LinkedPlanServices,
                NodeKind::LinkedService,
                NodeKind::PlanServiceCostShares,
            ]
        );
    }
}
