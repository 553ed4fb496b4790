#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Regression tests for maestro-security: AuditLog persistence, RulePolicy
//! ordering, SecurityGate auditing.

use maestro_core::{CapabilitySet, ExecutorDescriptor, ExecutorKind, Subtask};
use maestro_security::{AuditLog, AuditOutcome, DenyRule, RulePolicy, SecurityGate};
use std::sync::Arc;
use uuid::Uuid;

fn subtask(id: &str, caps: &[&str]) -> Subtask {
    Subtask::new(
        Uuid::new_v4(),
        id,
        "work",
        caps.iter().copied().collect::<CapabilitySet>(),
    )
}

// --- AuditLog ---

#[tokio::test]
async fn test_audit_log_writes_entries() {
    let tmp = tempfile::tempdir().unwrap();
    let log_dir = tmp.path().join("audit");
    let audit = AuditLog::with_file(log_dir.clone());

    let task_id = Uuid::new_v4();
    audit.log_decision(
        task_id,
        "a".into(),
        "e1".into(),
        serde_json::json!({"reason": "quarantined"}),
        AuditOutcome::Denied,
    );

    // Give the background task time to write
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    let contents = tokio::fs::read_to_string(log_dir.join("audit.jsonl"))
        .await
        .unwrap();
    assert!(contents.contains("quarantined"));
    assert!(contents.contains("denied"));
    assert!(contents.contains(&task_id.to_string()));
}

#[tokio::test]
async fn test_audit_log_multiple_entries_in_order() {
    let tmp = tempfile::tempdir().unwrap();
    let log_dir = tmp.path().join("audit");
    let audit = AuditLog::with_file(log_dir.clone());

    let task_id = Uuid::new_v4();
    for i in 0..5 {
        audit.log_decision(
            task_id,
            format!("s{i}").into(),
            "e1".into(),
            serde_json::json!({"index": i}),
            AuditOutcome::Allowed,
        );
    }

    tokio::time::sleep(std::time::Duration::from_millis(300)).await;

    let contents = tokio::fs::read_to_string(log_dir.join("audit.jsonl"))
        .await
        .unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 5);
    for (i, line) in lines.iter().enumerate() {
        let v: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(v["details"]["index"], i);
    }
    assert_eq!(audit.entries().len(), 5);
}

// --- RulePolicy through the gate ---

#[tokio::test]
async fn test_first_matching_rule_decides() {
    let policy = RulePolicy::default()
        .deny(DenyRule::new("first").for_capability("pii"))
        .deny(DenyRule::new("second").for_kind(ExecutorKind::Automated));
    let audit = Arc::new(AuditLog::in_memory());
    let gate = SecurityGate::new(Arc::new(policy), audit.clone());

    let bot = ExecutorDescriptor::automated("bot", ["pii"].into_iter().collect());
    let decision = gate.authorize(&bot, &subtask("s", &["pii"])).await;
    assert_eq!(decision, maestro_core::AuthorizationDecision::deny("first"));

    let decision = gate.authorize(&bot, &subtask("t", &[])).await;
    assert_eq!(decision, maestro_core::AuthorizationDecision::deny("second"));

    let human = ExecutorDescriptor::human("h", CapabilitySet::new());
    assert!(gate.authorize(&human, &subtask("u", &[])).await.is_allowed());

    assert_eq!(audit.count(AuditOutcome::Denied), 2);
    assert_eq!(audit.count(AuditOutcome::Allowed), 1);
}

#[tokio::test]
async fn test_permissive_gate_allows() {
    let gate = SecurityGate::permissive();
    let exec = ExecutorDescriptor::automated("e", CapabilitySet::new());
    assert!(gate.authorize(&exec, &subtask("a", &["x"])).await.is_allowed());
    assert_eq!(gate.audit().entries().len(), 1);
}
