// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn parses_loop_with_skip_list() {
    let payload = json!({
        "action": "loop",
        "stepsBack": 2,
        "skipList": ["designer", "reviewer"],
        "maxIterations": 3,
        "reason": "tests still failing"
    });
    let directive = Directive::from_payload(&payload).unwrap();
    assert_eq!(
        directive,
        Directive::Loop(LoopDirective {
            steps_back: 2,
            skip_list: vec![AgentId::new("designer"), AgentId::new("reviewer")],
            max_iterations: Some(3),
            reason: Some("tests still failing".to_string()),
        })
    );
}

#[test]
fn loop_without_steps_back_is_rejected() {
    assert_eq!(Directive::from_payload(&json!({"action": "loop"})), None);
}

#[test]
fn parses_trigger() {
    let payload = json!({"action": "trigger", "triggerAgentId": "security-check"});
    assert_eq!(
        Directive::from_payload(&payload).unwrap(),
        Directive::Trigger {
            trigger_agent_id: AgentId::new("security-check"),
            reason: None,
        }
    );
}

#[test]
fn error_without_reason_gets_a_default() {
    let directive = Directive::from_payload(&json!({"action": "error"})).unwrap();
    match directive {
        Directive::Error { reason } => assert!(!reason.is_empty()),
        other => panic!("expected error, got {other:?}"),
    }
}

#[test]
fn unknown_action_degrades_to_continue() {
    let payload = json!({"action": "celebrate", "confetti": true});
    assert_eq!(
        Directive::from_payload(&payload).unwrap(),
        Directive::Continue
    );
}

#[test]
fn missing_action_is_not_a_directive() {
    assert_eq!(Directive::from_payload(&json!({"reason": "x"})), None);
    assert_eq!(Directive::from_payload(&json!("continue")), None);
}

#[yare::parameterized(
    error_beats_stop = { json!({"action": "error", "reason": "r"}), json!({"action": "stop"}) },
    stop_beats_trigger = { json!({"action": "stop"}), json!({"action": "trigger", "triggerAgentId": "a"}) },
    trigger_beats_checkpoint = { json!({"action": "trigger", "triggerAgentId": "a"}), json!({"action": "checkpoint"}) },
    checkpoint_beats_loop = { json!({"action": "checkpoint"}), json!({"action": "loop", "stepsBack": 1}) },
    loop_beats_pause = { json!({"action": "loop", "stepsBack": 1}), json!({"action": "pause"}) },
    pause_beats_continue = { json!({"action": "pause"}), json!({"action": "continue"}) },
)]
fn precedence_ordering(higher: serde_json::Value, lower: serde_json::Value) {
    let higher = Directive::from_payload(&higher).unwrap();
    let lower = Directive::from_payload(&lower).unwrap();
    assert!(higher.precedence() > lower.precedence());
}

#[test]
fn serde_tag_is_lowercase_action() {
    let json = serde_json::to_value(Directive::Stop { reason: None }).unwrap();
    assert_eq!(json.get("action").and_then(|v| v.as_str()), Some("stop"));
}
