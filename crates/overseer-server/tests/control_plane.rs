// crates/overseer-server/tests/control_plane.rs
// ============================================================================
// Module: Control Plane Integration Tests
// Description: Wired-state scenarios across gate, queue, trust, and ingest.
// Purpose: Validate auto-approval, human approval, tick timeouts, sequence
//          quarantine, and auth flows against a fully wired AppState.
// ============================================================================

//! ## Overview
//! These tests build the real [`AppState`] over an in-memory store with no
//! transports and drive it the way the HTTP layer would:
//! - Adaptive mode auto-approves a trusted `Write` with no trust delta
//! - Orchestrator mode blocks until a human resolution lands (+1 trust)
//! - Manual tick advancement auto-resolves an overdue option decision
//! - Sequence regressions and duplicates never reach the bus twice
//! - The auth service issues, refreshes, and renews tokens

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

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use overseer_config::AuthSection;
use overseer_config::DatabaseSection;
use overseer_config::DecisionSection;
use overseer_config::OverseerConfig;
use overseer_core::ActionKind;
use overseer_core::AgentBrief;
use overseer_core::AgentEvent;
use overseer_core::AgentHandle;
use overseer_core::AgentId;
use overseer_core::AgentStatus;
use overseer_core::ApprovalAction;
use overseer_core::ControlMode;
use overseer_core::DecisionEvent;
use overseer_core::DecisionId;
use overseer_core::DecisionOption;
use overseer_core::DecisionResolution;
use overseer_core::DecisionStatus;
use overseer_core::EventEnvelope;
use overseer_core::EventFilter;
use overseer_core::EventKind;
use overseer_core::OptionDecision;
use overseer_core::RunId;
use overseer_core::Severity;
use overseer_core::SourceEventId;
use overseer_core::Tick;
use overseer_core::Timestamp;
use overseer_core::TrustConfigPatch;
use overseer_core::WorkstreamId;
use overseer_server::AppState;
use overseer_server::auth::AuthService;
use overseer_server::auth::TokenKind;
use overseer_server::resolver;
use overseer_server::resolver::ResolutionSource;
use overseer_server::toolgate;
use overseer_server::toolgate::ApprovalRequest;
use sha2::Digest;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn test_config() -> OverseerConfig {
    OverseerConfig {
        database: DatabaseSection {
            path: PathBuf::from(":memory:"),
            read_pool_size: 2,
        },
        decisions: DecisionSection {
            timeout_ticks: Some(10),
        },
        auth: AuthSection {
            secret: "test-secret".to_string(),
            ..AuthSection::default()
        },
        ..OverseerConfig::default()
    }
}

fn build_state() -> Arc<AppState> {
    AppState::build(test_config(), Box::new(|_, _| Vec::new())).expect("state build")
}

fn running_agent(state: &Arc<AppState>, agent: &str) {
    let handle = AgentHandle {
        agent_id: AgentId::new(agent),
        plugin_name: "test".to_string(),
        status: AgentStatus::Running,
        session_id: None,
    };
    let brief = AgentBrief {
        agent_id: AgentId::new(agent),
        role: "builder".to_string(),
        workstream: WorkstreamId::new("ws-a"),
        readable_workstreams: Vec::new(),
        escalation_protocol: overseer_core::EscalationProtocol::default(),
        allowed_tools: Vec::new(),
        session_policy: overseer_core::SessionPolicy::default(),
        context_injection_policy: None,
        model_preference: None,
        project_brief: None,
        knowledge_snapshot: None,
    };
    state.gateway.registry().insert(handle.clone());
    state.store.register_agent(&handle, &brief).expect("register agent");
    state.trust.register_agent(&AgentId::new(agent), state.tick.current());
}

fn approval_request(agent: &str, tool: &str, input: serde_json::Value) -> ApprovalRequest {
    serde_json::from_value(serde_json::json!({
        "agentId": agent,
        "toolName": tool,
        "toolInput": input,
    }))
    .expect("approval request")
}

fn option_decision(id: &str, agent: &str) -> DecisionEvent {
    DecisionEvent::Option(OptionDecision {
        decision_id: DecisionId::new(id),
        agent_id: AgentId::new(agent),
        title: "choose storage".to_string(),
        summary: "sqlite or sled".to_string(),
        severity: Severity::Medium,
        confidence: 0.7,
        blast_radius: overseer_core::BlastRadius::Medium,
        options: vec![
            DecisionOption {
                option_id: "opt-1".to_string(),
                label: "sqlite".to_string(),
                description: None,
            },
            DecisionOption {
                option_id: "opt-2".to_string(),
                label: "sled".to_string(),
                description: None,
            },
        ],
        recommended_option_id: Some("opt-1".to_string()),
        affected_artifact_ids: Vec::new(),
        requires_rationale: false,
        due_by_tick: None,
    })
}

fn status_envelope(agent: &str, run: &str, sequence: u64) -> EventEnvelope {
    EventEnvelope {
        source_event_id: SourceEventId::new(format!("evt-{agent}-{run}-{sequence}")),
        source_sequence: sequence,
        source_occurred_at: Timestamp::now(),
        agent_id: AgentId::new(agent),
        run_id: RunId::new(run),
        ingested_at: Timestamp::now(),
        event: AgentEvent::Status {
            message: format!("step {sequence}"),
        },
    }
}

// ============================================================================
// SECTION: Tool Gate Scenarios
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn adaptive_mode_auto_approves_a_trusted_write() {
    let state = build_state();
    state.control.set(ControlMode::Adaptive);
    state.trust.reconfigure(&TrustConfigPatch {
        initial_score: Some(70),
        ..TrustConfigPatch::default()
    });
    running_agent(&state, "a-1");
    assert_eq!(state.trust.score(&AgentId::new("a-1")), 70);

    let response = toolgate::request_approval(
        &state,
        approval_request("a-1", "Write", serde_json::json!({ "path": "x" })),
    )
    .await
    .expect("approval");

    assert_eq!(response.action, ApprovalAction::Approve);
    assert!(response.auto_resolved);
    assert!(!response.timed_out);
    assert!(response.rationale.unwrap().contains("adaptive"));

    // The decision is terminal and queryable.
    let record = state.queue.get(&response.decision_id).unwrap();
    assert_eq!(record.status, DecisionStatus::Resolved);

    // No trust movement on auto-resolutions, but the audit trail records it.
    assert_eq!(state.trust.score(&AgentId::new("a-1")), 70);
    let audit = state.store.audit_log(Some("trust"), Some("a-1")).unwrap();
    let outcome_entry =
        audit.iter().find(|entry| entry.action == "trust_outcome").expect("audit entry");
    let details = outcome_entry.details.as_ref().unwrap();
    assert_eq!(details["autoResolved"], serde_json::json!(true));
    assert_eq!(details["effectiveDelta"], serde_json::json!(0));
}

#[tokio::test(flavor = "multi_thread")]
async fn orchestrator_mode_waits_for_the_human() {
    let state = build_state();
    running_agent(&state, "a-1");

    let gate_state = Arc::clone(&state);
    let waiting = tokio::spawn(async move {
        toolgate::request_approval(
            &gate_state,
            approval_request("a-1", "Bash", serde_json::json!({ "command": "ls" })),
        )
        .await
    });

    // The decision event lands in the queue and the stored event log before
    // any resolution exists.
    let decision_id = loop {
        if let Some(record) = state.queue.list_pending(None).into_iter().next() {
            break record.event.decision_id().clone();
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    };
    let stored = state
        .store
        .events(&EventFilter {
            types: vec![EventKind::Decision],
            ..EventFilter::default()
        })
        .unwrap();
    assert_eq!(stored.len(), 1);

    let applied = resolver::apply_resolution(
        &state,
        &decision_id,
        DecisionResolution::ToolApproval {
            action: ApprovalAction::Approve,
            rationale: Some("looks safe".to_string()),
            action_kind: ActionKind::Review,
            auto_resolved: false,
            modified_args: None,
        },
        ResolutionSource::Human,
    )
    .await
    .expect("resolution")
    .expect("not already terminal");
    assert!(!applied.is_auto_resolved());

    let response = waiting.await.expect("join").expect("approval");
    assert_eq!(response.action, ApprovalAction::Approve);
    assert!(!response.auto_resolved);
    assert!(!response.timed_out);

    // human_approves_tool_call moves trust by +1.
    assert_eq!(state.trust.score(&AgentId::new("a-1")), 51);
    assert_eq!(state.store.trust_profile(&AgentId::new("a-1")).unwrap().score, 51);

    // Double resolution is a silent conflict.
    let second = resolver::apply_resolution(
        &state,
        &decision_id,
        DecisionResolution::ToolApproval {
            action: ApprovalAction::Reject,
            rationale: None,
            action_kind: ActionKind::Review,
            auto_resolved: false,
            modified_args: None,
        },
        ResolutionSource::Human,
    )
    .await
    .expect("pipeline");
    assert!(second.is_none());
}

// ============================================================================
// SECTION: Tick Timeouts
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn overdue_option_decisions_auto_resolve_on_tick() {
    let state = build_state();
    running_agent(&state, "a-1");
    state.queue.enqueue(option_decision("d-timeout", "a-1"), state.tick.current());

    let waiter_queue = Arc::clone(&state.queue);
    let waiter = tokio::spawn(async move {
        waiter_queue.wait_for_resolution(&DecisionId::new("d-timeout")).await
    });
    tokio::task::yield_now().await;

    state.tick.advance(9);
    assert_eq!(
        state.queue.get(&DecisionId::new("d-timeout")).unwrap().status,
        DecisionStatus::Pending
    );
    state.tick.advance(1);
    assert_eq!(state.tick.current(), Tick::new(10));

    let record = state.queue.get(&DecisionId::new("d-timeout")).unwrap();
    assert_eq!(record.status, DecisionStatus::TimedOut);
    match record.resolution.clone().unwrap() {
        DecisionResolution::Option {
            chosen_option_id,
            rationale,
            ..
        } => {
            assert_eq!(chosen_option_id, "opt-1");
            assert!(rationale.unwrap().contains("timeout"));
        }
        DecisionResolution::ToolApproval {
            ..
        } => panic!("wrong resolution kind"),
    }
    assert!(waiter.await.expect("join").is_some());
}

// ============================================================================
// SECTION: Ingestion Guards
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn sequence_regressions_are_quarantined() {
    let state = build_state();
    running_agent(&state, "a-1");

    state.ingestor.ingest_envelope(status_envelope("a-1", "run-1", 2));
    state.ingestor.ingest_envelope(status_envelope("a-1", "run-1", 1));

    let stored = state.store.events(&EventFilter::default()).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].source_sequence, 2);
    let quarantined = state.quarantine.list();
    assert_eq!(quarantined.len(), 1);
    assert!(quarantined[0].reason.contains("sequence regression"));

    // A fresh run restarts the sequence space.
    state.ingestor.ingest_envelope(status_envelope("a-1", "run-2", 1));
    assert_eq!(state.store.events(&EventFilter::default()).unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_event_ids_are_dropped_silently() {
    let state = build_state();
    running_agent(&state, "a-1");

    let first = status_envelope("a-1", "run-1", 1);
    let mut replay = first.clone();
    // Same adapter event id re-sent with a fresh sequence.
    replay.source_sequence = 2;
    state.ingestor.ingest_envelope(first);
    state.ingestor.ingest_envelope(replay);

    assert_eq!(state.store.events(&EventFilter::default()).unwrap().len(), 1);
    assert!(state.quarantine.list().is_empty());
}

// ============================================================================
// SECTION: Auth
// ============================================================================

#[test]
fn auth_issues_refreshes_and_renews_tokens() {
    let digest = format!("{:x}", sha2::Sha256::digest(b"hunter2"));
    let auth = AuthService::new(AuthSection {
        secret: "test-secret".to_string(),
        users: vec![overseer_config::ApiUserSection {
            username: "op".to_string(),
            password_sha256: digest,
            role: "operator".to_string(),
        }],
        ..AuthSection::default()
    });

    assert!(auth.login("op", "wrong").is_err());
    let pair = auth.login("op", "hunter2").expect("login");
    let claims = auth.verify_kind(&pair.access_token, TokenKind::Access).expect("access");
    assert_eq!(claims.sub, "op");
    // Access tokens are not refresh tokens.
    assert!(auth.refresh(&pair.access_token).is_err());
    let rotated = auth.refresh(&pair.refresh_token).expect("refresh");
    assert!(auth.verify_kind(&rotated.access_token, TokenKind::Access).is_ok());

    let (sandbox, expires_at) = auth.issue_sandbox(&AgentId::new("a-1")).expect("sandbox");
    assert!(expires_at > 0);
    let (renewed, _) = auth.renew_sandbox(&sandbox).expect("renew");
    let claims = auth.verify_kind(&renewed, TokenKind::Sandbox).expect("sandbox claims");
    assert_eq!(claims.sub, "a-1");
    // Operator tokens cannot renew sandbox tokens.
    assert!(auth.renew_sandbox(&pair.access_token).is_err());
}

// ============================================================================
// SECTION: Broadcasts
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn state_sync_reaches_hub_subscribers() {
    let state = build_state();
    running_agent(&state, "a-1");
    let mut receiver = state.hub.subscribe();
    state.broadcast_state_sync();
    let frame = receiver.recv().await.expect("frame");
    let message: serde_json::Value = serde_json::from_str(&frame).expect("json frame");
    assert_eq!(message["type"], "state_sync");
    assert_eq!(message["controlMode"], "orchestrator");
    assert_eq!(message["activeAgents"][0]["agentId"], "a-1");
}
