//! Shared fixtures for integration tests

#![allow(dead_code)]

use serde_json::{json, Value};

pub fn cost_shares(id: &str) -> Value {
    json!({
        "deductible": 2000,
        "_org": "example.com",
        "copay": 23,
        "objectId": id,
        "objectType": "membercostshare"
    })
}

pub fn linked(id: &str) -> Value {
    json!({
        "linkedService": {
            "_org": "example.com",
            "objectId": format!("{id}-svc"),
            "objectType": "service",
            "name": format!("Service {id}")
        },
        "planserviceCostShares": cost_shares(&format!("{id}-pscs")),
        "_org": "example.com",
        "objectId": id,
        "objectType": "planservice"
    })
}

pub fn plan_json(id: &str, linked_ids: &[&str]) -> Value {
    json!({
        "planCostShares": cost_shares(&format!("{id}-pcs")),
        "linkedPlanServices": linked_ids.iter().map(|l| linked(l)).collect::<Vec<_>>(),
        "_org": "example.com",
        "objectId": id,
        "objectType": "plan",
        "planType": "inNetwork",
        "creationDate": "12-12-2017"
    })
}

pub fn plan(id: &str, linked_ids: &[&str]) -> plansync::models::Plan {
    serde_json::from_value(plan_json(id, linked_ids)).expect("fixture plan is valid")
}
