// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn short_truncates_long_ids() {
    let id = AgentId::new("architect-with-a-long-name");
    assert_eq!(id.short(9), "architect");
}

#[test]
fn short_keeps_short_ids_whole() {
    let id = AgentId::new("coder");
    assert_eq!(id.short(9), "coder");
}

#[test]
fn unique_agent_id_format_is_stable() {
    let id = AgentId::new("planner");
    assert_eq!(unique_agent_id(&id, 0), "planner-step-0");
    assert_eq!(unique_agent_id(&id, 12), "planner-step-12");
}

#[test]
fn monitoring_id_serializes_as_bare_integer() {
    let id = MonitoringId(7);
    assert_eq!(serde_json::to_string(&id).unwrap(), "7");
    let back: MonitoringId = serde_json::from_str("7").unwrap();
    assert_eq!(back, id);
}

#[test]
fn agent_id_compares_with_str() {
    let id = AgentId::new("reviewer");
    assert_eq!(id, "reviewer");
    assert_eq!(id, *"reviewer");
}
