// crates/overseer-server/tests/toolgate_unit.rs
// ============================================================================
// Module: Tool Gate Unit Tests
// Description: Tool classification, bash token scan, and auto-approve gates.
// Purpose: Validate the risk tables, the allow/deny command scan, the
//          per-mode auto-approval matrix, and the outcome mapping.
// ============================================================================

//! ## Overview
//! Pure-function tests for the gate:
//! - Bash is high/large; Write and Edit medium/medium; everything else
//!   low/small
//! - The bash scan classifies the first command of a chain; unknown first
//!   tokens are destructive
//! - Orchestrator never auto-approves; ecosystem blocks only destructive
//!   large-blast calls; adaptive applies the trust thresholds 30/50/60/80
//! - Resolution-to-outcome mapping is pure and shared

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    missing_docs,
    clippy::missing_docs_in_private_items,
    reason = "Test-only assertions and helpers are permitted."
)]

use overseer_core::ActionKind;
use overseer_core::AgentId;
use overseer_core::ApprovalAction;
use overseer_core::BlastRadius;
use overseer_core::ControlMode;
use overseer_core::DecisionEvent;
use overseer_core::DecisionId;
use overseer_core::DecisionOption;
use overseer_core::DecisionResolution;
use overseer_core::OptionDecision;
use overseer_core::Severity;
use overseer_core::ToolApprovalDecision;
use overseer_core::TrustOutcome;
use overseer_server::resolver::outcome_for_resolution;
use overseer_server::toolgate::BashRisk;
use overseer_server::toolgate::adaptive_threshold;
use overseer_server::toolgate::auto_approves;
use overseer_server::toolgate::classify_bash;
use overseer_server::toolgate::classify_tool;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn bash_risk(command: &str) -> overseer_server::toolgate::ToolRisk {
    classify_tool("Bash", &serde_json::json!({ "command": command }))
}

fn tool_resolution(action: ApprovalAction) -> DecisionResolution {
    DecisionResolution::ToolApproval {
        action,
        rationale: None,
        action_kind: ActionKind::Review,
        auto_resolved: false,
        modified_args: None,
    }
}

fn option_event(recommended: Option<&str>) -> DecisionEvent {
    DecisionEvent::Option(OptionDecision {
        decision_id: DecisionId::new("d-1"),
        agent_id: AgentId::new("a-1"),
        title: "pick".to_string(),
        summary: "pick one".to_string(),
        severity: Severity::Medium,
        confidence: 0.5,
        blast_radius: BlastRadius::Medium,
        options: vec![DecisionOption {
            option_id: "opt-1".to_string(),
            label: "first".to_string(),
            description: None,
        }],
        recommended_option_id: recommended.map(str::to_string),
        affected_artifact_ids: Vec::new(),
        requires_rationale: false,
        due_by_tick: None,
    })
}

fn tool_event() -> DecisionEvent {
    DecisionEvent::ToolApproval(ToolApprovalDecision {
        decision_id: DecisionId::new("d-1"),
        agent_id: AgentId::new("a-1"),
        tool_name: "Bash".to_string(),
        tool_args: serde_json::json!({}),
        tool_use_id: None,
        reasoning: None,
        severity: None,
        blast_radius: None,
        due_by_tick: None,
    })
}

// ============================================================================
// SECTION: Tool Classification
// ============================================================================

#[test]
fn tool_table_matches_the_contract() {
    let bash = bash_risk("ls -la");
    assert_eq!(bash.severity, Severity::High);
    assert_eq!(bash.blast_radius, BlastRadius::Large);
    assert_eq!(bash.bash_risk, Some(BashRisk::Safe));

    let write = classify_tool("Write", &serde_json::json!({ "path": "x" }));
    assert_eq!(write.severity, Severity::Medium);
    assert_eq!(write.blast_radius, BlastRadius::Medium);
    assert!(write.bash_risk.is_none());

    let edit = classify_tool("Edit", &serde_json::json!({}));
    assert_eq!(edit.severity, Severity::Medium);
    assert_eq!(edit.blast_radius, BlastRadius::Medium);

    let other = classify_tool("Glob", &serde_json::json!({}));
    assert_eq!(other.severity, Severity::Low);
    assert_eq!(other.blast_radius, BlastRadius::Small);
}

// ============================================================================
// SECTION: Bash Token Scan
// ============================================================================

#[test]
fn safe_first_tokens_classify_safe() {
    assert_eq!(classify_bash("ls -la /tmp"), BashRisk::Safe);
    assert_eq!(classify_bash("grep -rn pattern src"), BashRisk::Safe);
    assert_eq!(classify_bash("cat README.md | head -5"), BashRisk::Safe);
}

#[test]
fn denied_and_unknown_first_tokens_classify_destructive() {
    assert_eq!(classify_bash("rm -rf build"), BashRisk::Destructive);
    assert_eq!(classify_bash("curl https://example.com"), BashRisk::Destructive);
    assert_eq!(classify_bash("my-custom-script --go"), BashRisk::Destructive);
    assert_eq!(classify_bash(""), BashRisk::Destructive);
}

#[test]
fn only_the_first_command_of_a_chain_is_scanned() {
    // Safe head, destructive tail: the scan sees the head.
    assert_eq!(classify_bash("ls && rm -rf /"), BashRisk::Safe);
    // Destructive head taints the call regardless of the tail.
    assert_eq!(classify_bash("rm -rf build; ls"), BashRisk::Destructive);
    assert_eq!(classify_bash("sudo ls || true"), BashRisk::Destructive);
}

#[test]
fn env_assignments_and_paths_are_normalized() {
    assert_eq!(classify_bash("RUST_LOG=debug ls"), BashRisk::Safe);
    assert_eq!(classify_bash("/bin/ls -la"), BashRisk::Safe);
    assert_eq!(classify_bash("FOO=1 BAR=2 rm -rf x"), BashRisk::Destructive);
}

// ============================================================================
// SECTION: Auto-Approval Matrix
// ============================================================================

#[test]
fn adaptive_thresholds_follow_the_risk_buckets() {
    assert_eq!(adaptive_threshold(BlastRadius::Trivial, false), 30);
    assert_eq!(adaptive_threshold(BlastRadius::Small, false), 30);
    assert_eq!(adaptive_threshold(BlastRadius::Medium, false), 50);
    assert_eq!(adaptive_threshold(BlastRadius::Large, false), 60);
    assert_eq!(adaptive_threshold(BlastRadius::Large, true), 80);
}

#[test]
fn orchestrator_never_auto_approves() {
    let risk = classify_tool("Glob", &serde_json::json!({}));
    assert!(!auto_approves(ControlMode::Orchestrator, risk, 100));
}

#[test]
fn ecosystem_blocks_only_destructive_large_blast_calls() {
    assert!(auto_approves(ControlMode::Ecosystem, bash_risk("ls"), 0));
    assert!(auto_approves(
        ControlMode::Ecosystem,
        classify_tool("Write", &serde_json::json!({})),
        0
    ));
    assert!(!auto_approves(ControlMode::Ecosystem, bash_risk("rm -rf /"), 100));
}

#[test]
fn adaptive_compares_trust_against_the_bucket_threshold() {
    let write = classify_tool("Write", &serde_json::json!({}));
    assert!(auto_approves(ControlMode::Adaptive, write, 50));
    assert!(!auto_approves(ControlMode::Adaptive, write, 49));

    let safe_bash = bash_risk("ls");
    assert!(auto_approves(ControlMode::Adaptive, safe_bash, 60));
    assert!(!auto_approves(ControlMode::Adaptive, safe_bash, 59));

    let destructive_bash = bash_risk("rm -rf build");
    assert!(auto_approves(ControlMode::Adaptive, destructive_bash, 80));
    assert!(!auto_approves(ControlMode::Adaptive, destructive_bash, 79));
}

// ============================================================================
// SECTION: Outcome Mapping
// ============================================================================

#[test]
fn option_resolutions_map_by_recommendation_match() {
    let followed = DecisionResolution::Option {
        chosen_option_id: "opt-1".to_string(),
        rationale: None,
        action_kind: ActionKind::Review,
        auto_resolved: false,
    };
    assert_eq!(
        outcome_for_resolution(&followed, &option_event(Some("opt-1"))),
        Some(TrustOutcome::HumanApprovesRecommendedOption)
    );
    assert_eq!(
        outcome_for_resolution(&followed, &option_event(Some("opt-2"))),
        Some(TrustOutcome::HumanOverridesAgentDecision)
    );
}

#[test]
fn tool_resolutions_map_by_action() {
    let event = tool_event();
    assert_eq!(
        outcome_for_resolution(&tool_resolution(ApprovalAction::Approve), &event),
        Some(TrustOutcome::HumanApprovesToolCall)
    );
    assert_eq!(
        outcome_for_resolution(&tool_resolution(ApprovalAction::Reject), &event),
        Some(TrustOutcome::HumanRejectsToolCall)
    );
    assert_eq!(
        outcome_for_resolution(&tool_resolution(ApprovalAction::Modify), &event),
        Some(TrustOutcome::HumanOverridesAgentDecision)
    );
}

#[test]
fn mismatched_resolution_kinds_map_to_no_outcome() {
    let resolution = tool_resolution(ApprovalAction::Approve);
    assert_eq!(outcome_for_resolution(&resolution, &option_event(None)), None);
}
