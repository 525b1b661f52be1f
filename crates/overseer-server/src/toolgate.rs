// crates/overseer-server/src/toolgate.rs
// ============================================================================
// Module: Server Tool Gate
// Description: Blocking approval checkpoint for risky tool calls.
// Purpose: Classify tools, auto-resolve by mode and trust, or long-poll.
// Dependencies: overseer-core, tokio, uuid, crate::{resolver, state}
// ============================================================================

//! ## Overview
//! The sandboxed adapter's pre-tool-use hook calls
//! `POST /api/tool-gate/request-approval` and blocks until the control plane
//! answers. The gate derives severity and blast radius from the tool name,
//! classifies Bash commands with a fixed allow/deny token table (unknown
//! first tokens are destructive), enqueues a tool-approval decision *before*
//! publishing its envelope, auto-resolves when the control mode and trust
//! permit, and otherwise long-polls the queue with a five-minute deadline
//! that falls back to rejection.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use overseer_core::ActionKind;
use overseer_core::AgentEvent;
use overseer_core::AgentId;
use overseer_core::ApprovalAction;
use overseer_core::BlastRadius;
use overseer_core::ControlMode;
use overseer_core::DecisionEvent;
use overseer_core::DecisionId;
use overseer_core::DecisionResolution;
use overseer_core::EventEnvelope;
use overseer_core::RunId;
use overseer_core::Severity;
use overseer_core::SourceEventId;
use overseer_core::Timestamp;
use overseer_core::ToolApprovalDecision;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error::ApiError;
use crate::resolver;
use crate::resolver::ResolutionSource;
use crate::state::AppState;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// How long a blocked approval waits for a human before auto-rejecting.
pub const APPROVAL_WAIT: Duration = Duration::from_secs(5 * 60);

/// First tokens considered safe in a Bash command chain.
///
/// The table is deliberately explicit data, not heuristics; unknown tokens
/// classify as destructive.
pub const SAFE_BASH_TOKENS: &[&str] = &[
    "ls", "cat", "echo", "pwd", "cd", "grep", "rg", "find", "head", "tail", "wc", "which",
    "whoami", "date", "env", "printenv", "ps", "du", "df", "stat", "file", "uname", "sort",
    "uniq", "diff", "tree", "basename", "dirname", "readlink", "sleep", "true", "false",
];

/// First tokens always considered destructive in a Bash command chain.
pub const DESTRUCTIVE_BASH_TOKENS: &[&str] = &[
    "rm", "rmdir", "mv", "dd", "mkfs", "chmod", "chown", "chgrp", "truncate", "ln", "sudo",
    "su", "kill", "killall", "pkill", "shutdown", "reboot", "halt", "curl", "wget", "nc",
    "mount", "umount",
];

// ============================================================================
// SECTION: Classification
// ============================================================================

/// Bash command risk classification.
///
/// # Invariants
/// - Variants are stable for serialization and audit records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BashRisk {
    /// First command is on the allow list.
    Safe,
    /// First command is denied or unknown.
    Destructive,
}

/// Risk classification for a proposed tool call.
///
/// # Invariants
/// - `bash_risk` is present only for Bash invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolRisk {
    /// Derived severity.
    pub severity: Severity,
    /// Derived blast radius.
    pub blast_radius: BlastRadius,
    /// Bash command classification, when applicable.
    pub bash_risk: Option<BashRisk>,
}

/// Derives severity and blast radius from a tool name and input.
#[must_use]
pub fn classify_tool(tool_name: &str, tool_input: &Value) -> ToolRisk {
    match tool_name {
        "Bash" => {
            let command = tool_input.get("command").and_then(Value::as_str).unwrap_or("");
            ToolRisk {
                severity: Severity::High,
                blast_radius: BlastRadius::Large,
                bash_risk: Some(classify_bash(command)),
            }
        }
        "Write" | "Edit" => ToolRisk {
            severity: Severity::Medium,
            blast_radius: BlastRadius::Medium,
            bash_risk: None,
        },
        _ => ToolRisk {
            severity: Severity::Low,
            blast_radius: BlastRadius::Small,
            bash_risk: None,
        },
    }
}

/// Classifies a Bash command by scanning the first command in the chain.
/// Env-var assignments are skipped; an absent or unknown first token is
/// destructive.
#[must_use]
pub fn classify_bash(command: &str) -> BashRisk {
    let first_segment = command
        .split(['\n', ';'])
        .flat_map(|segment| segment.split("&&"))
        .flat_map(|segment| segment.split("||"))
        .flat_map(|segment| segment.split('|'))
        .next()
        .unwrap_or("");
    let token = first_segment
        .split_whitespace()
        .find(|token| !token.contains('='))
        .map(|token| token.rsplit('/').next().unwrap_or(token))
        .unwrap_or("");
    if SAFE_BASH_TOKENS.contains(&token) {
        BashRisk::Safe
    } else {
        BashRisk::Destructive
    }
}

/// Returns the adaptive-mode trust threshold for a risk bucket.
#[must_use]
pub const fn adaptive_threshold(blast_radius: BlastRadius, destructive: bool) -> i64 {
    match blast_radius {
        BlastRadius::Trivial | BlastRadius::Small => 30,
        BlastRadius::Medium | BlastRadius::Unknown => 50,
        BlastRadius::Large => {
            if destructive {
                80
            } else {
                60
            }
        }
    }
}

/// Decides whether a mode auto-approves a call at a given trust score.
#[must_use]
pub fn auto_approves(mode: ControlMode, risk: ToolRisk, trust_score: i64) -> bool {
    let destructive = matches!(risk.bash_risk, Some(BashRisk::Destructive));
    match mode {
        ControlMode::Orchestrator => false,
        ControlMode::Ecosystem => !(risk.blast_radius == BlastRadius::Large && destructive),
        ControlMode::Adaptive => trust_score >= adaptive_threshold(risk.blast_radius, destructive),
    }
}

// ============================================================================
// SECTION: Gate State
// ============================================================================

/// Aggregate tool-gate counters.
#[derive(Debug, Default)]
pub struct ToolGateStats {
    /// Approval requests received.
    pub requested: AtomicU64,
    /// Requests auto-resolved by mode or trust.
    pub auto_approved: AtomicU64,
    /// Requests resolved by a human.
    pub human_resolved: AtomicU64,
    /// Requests rejected by the five-minute deadline.
    pub timed_out: AtomicU64,
}

/// Serializable stats snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolGateStatsSnapshot {
    /// Approval requests received.
    pub requested: u64,
    /// Requests auto-resolved by mode or trust.
    pub auto_approved: u64,
    /// Requests resolved by a human.
    pub human_resolved: u64,
    /// Requests rejected by the five-minute deadline.
    pub timed_out: u64,
}

impl ToolGateStats {
    /// Takes a snapshot of the counters.
    #[must_use]
    pub fn snapshot(&self) -> ToolGateStatsSnapshot {
        ToolGateStatsSnapshot {
            requested: self.requested.load(Ordering::Relaxed),
            auto_approved: self.auto_approved.load(Ordering::Relaxed),
            human_resolved: self.human_resolved.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
        }
    }
}

/// Tool gate shared state: counters, the last-status tracker, and the
/// synthetic event sequence.
///
/// # Invariants
/// - The status tracker is last-write-wins per agent.
#[derive(Debug, Default)]
pub struct ToolGate {
    /// Aggregate counters.
    pub stats: ToolGateStats,
    /// Last status message per agent, fed by a bus subscription.
    last_status: Mutex<HashMap<AgentId, String>>,
    /// Sequence counter for synthetic tool-gate envelopes.
    sequence: AtomicU64,
}

impl ToolGate {
    /// Creates an empty gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the latest status message for an agent.
    pub fn record_status(&self, agent_id: &AgentId, message: &str) {
        let mut statuses = match self.last_status.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        statuses.insert(agent_id.clone(), message.to_string());
    }

    /// Returns the latest status message for an agent.
    #[must_use]
    pub fn last_status(&self, agent_id: &AgentId) -> Option<String> {
        let statuses = match self.last_status.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        statuses.get(agent_id).cloned()
    }

    /// Returns the next synthetic sequence number.
    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed) + 1
    }
}

// ============================================================================
// SECTION: Request Surface
// ============================================================================

/// Body of `POST /api/tool-gate/request-approval`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ApprovalRequest {
    /// Requesting agent.
    pub agent_id: AgentId,
    /// Tool name.
    pub tool_name: String,
    /// Proposed tool arguments.
    #[serde(default)]
    pub tool_input: Value,
    /// Adapter-side tool-use correlation id.
    #[serde(default)]
    pub tool_use_id: Option<String>,
}

/// Response of the approval endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalResponse {
    /// Decision identifier assigned to the request.
    pub decision_id: DecisionId,
    /// Action taken.
    pub action: ApprovalAction,
    /// Rationale attached to the resolution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    /// Whether the control plane resolved without a human.
    pub auto_resolved: bool,
    /// Whether the wait deadline produced the resolution.
    pub timed_out: bool,
    /// Replacement arguments when the action is modify.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_args: Option<Value>,
}

/// Builds a response from a tool-approval resolution.
fn response_from(
    decision_id: DecisionId,
    resolution: &DecisionResolution,
    timed_out: bool,
) -> Result<ApprovalResponse, ApiError> {
    match resolution {
        DecisionResolution::ToolApproval {
            action,
            rationale,
            auto_resolved,
            modified_args,
            ..
        } => Ok(ApprovalResponse {
            decision_id,
            action: *action,
            rationale: rationale.clone(),
            auto_resolved: *auto_resolved,
            timed_out,
            modified_args: modified_args.clone(),
        }),
        DecisionResolution::Option {
            ..
        } => Err(ApiError::Internal("option resolution on a tool approval".to_string())),
    }
}

/// Runs the blocking approval flow.
///
/// # Errors
///
/// Returns [`ApiError::NotFound`] for unknown agents and
/// [`ApiError::Internal`] when the queue drops the wait.
pub async fn request_approval(
    state: &Arc<AppState>,
    request: ApprovalRequest,
) -> Result<ApprovalResponse, ApiError> {
    if state.gateway.registry().get(&request.agent_id).is_none() {
        return Err(ApiError::NotFound(format!("unknown agent: {}", request.agent_id)));
    }
    let risk = classify_tool(&request.tool_name, &request.tool_input);
    let decision_id = DecisionId::new(format!("dec-{}", Uuid::new_v4()));
    let decision = DecisionEvent::ToolApproval(ToolApprovalDecision {
        decision_id: decision_id.clone(),
        agent_id: request.agent_id.clone(),
        tool_name: request.tool_name.clone(),
        tool_args: request.tool_input.clone(),
        tool_use_id: request.tool_use_id.clone(),
        reasoning: state.toolgate.last_status(&request.agent_id),
        severity: Some(risk.severity),
        blast_radius: Some(risk.blast_radius),
        due_by_tick: None,
    });
    state.toolgate.stats.requested.fetch_add(1, Ordering::Relaxed);

    // Queue first, publish second: dashboards observing the bus must be
    // able to query the decision they just saw.
    state.queue.enqueue(decision.clone(), state.tick.current());
    let envelope = EventEnvelope {
        source_event_id: SourceEventId::new(format!("tg-{}", Uuid::new_v4())),
        source_sequence: state.toolgate.next_sequence(),
        source_occurred_at: Timestamp::now(),
        agent_id: request.agent_id.clone(),
        run_id: RunId::new("tool-gate"),
        ingested_at: Timestamp::now(),
        event: AgentEvent::Decision {
            decision,
        },
    };
    state.ingestor.ingest_envelope(envelope);

    let mode = state.control.get();
    let trust_score = state.trust.score(&request.agent_id);
    if auto_approves(mode, risk, trust_score) {
        let resolution = DecisionResolution::ToolApproval {
            action: ApprovalAction::Approve,
            rationale: Some(format!("Auto-approved by {} mode", mode.as_str())),
            action_kind: ActionKind::Review,
            auto_resolved: true,
            modified_args: None,
        };
        let applied =
            resolver::apply_resolution(state, &decision_id, resolution, ResolutionSource::Auto)
                .await?
                .ok_or_else(|| ApiError::Internal("auto-resolution lost a race".to_string()))?;
        state.toolgate.stats.auto_approved.fetch_add(1, Ordering::Relaxed);
        return response_from(decision_id, &applied, false);
    }

    match tokio::time::timeout(APPROVAL_WAIT, state.queue.wait_for_resolution(&decision_id)).await
    {
        Ok(Some(resolution)) => {
            state.toolgate.stats.human_resolved.fetch_add(1, Ordering::Relaxed);
            response_from(decision_id, &resolution, false)
        }
        Ok(None) => Err(ApiError::Internal("approval wait dropped".to_string())),
        Err(_) => {
            let resolution = DecisionResolution::ToolApproval {
                action: ApprovalAction::Reject,
                rationale: Some("Timed out waiting for human approval".to_string()),
                action_kind: ActionKind::Review,
                auto_resolved: true,
                modified_args: None,
            };
            let applied =
                resolver::apply_resolution(state, &decision_id, resolution, ResolutionSource::Auto)
                    .await?;
            state.toolgate.stats.timed_out.fetch_add(1, Ordering::Relaxed);
            match applied {
                Some(resolution) => response_from(decision_id, &resolution, true),
                // A human resolved in the same instant the deadline fired;
                // honor their resolution.
                None => {
                    let record = state
                        .queue
                        .get(&decision_id)
                        .and_then(|record| record.resolution)
                        .ok_or_else(|| {
                            ApiError::Internal("decision vanished at deadline".to_string())
                        })?;
                    response_from(decision_id, &record, false)
                }
            }
        }
    }
}
