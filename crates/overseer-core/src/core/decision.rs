// crates/overseer-core/src/core/decision.rs
// ============================================================================
// Module: Overseer Decisions
// Description: Pending decision events, resolutions, and queue records.
// Purpose: Model option and tool-approval decisions and their lifecycle.
// Dependencies: serde, serde_json, crate::core::{identifiers, risk, time}
// ============================================================================

//! ## Overview
//! A decision is a queued item requiring human or automatic resolution. Two
//! kinds exist: **option** decisions (pick from alternatives) and
//! **tool-approval** decisions (gate a risky tool call). Status transitions
//! are `pending -> {resolved, timed_out, triage, suspended}`; triage and
//! suspended are reversible, resolved and timed-out are terminal, and exactly
//! one resolution object is attached when terminal.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::AgentId;
use crate::core::identifiers::ArtifactId;
use crate::core::identifiers::DecisionId;
use crate::core::risk::BlastRadius;
use crate::core::risk::Severity;
use crate::core::time::Tick;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Decision Events
// ============================================================================

/// A selectable alternative in an option decision.
///
/// # Invariants
/// - `option_id` is unique within the owning decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionOption {
    /// Option identifier.
    pub option_id: String,
    /// Short label for the option.
    pub label: String,
    /// Optional longer description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Option decision payload: pick from alternatives.
///
/// # Invariants
/// - `options` is non-empty.
/// - `recommended_option_id`, when set, names an entry in `options`.
/// - `confidence` lies in `[0.0, 1.0]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionDecision {
    /// Decision identifier.
    pub decision_id: DecisionId,
    /// Agent that raised the decision.
    pub agent_id: AgentId,
    /// Short title.
    pub title: String,
    /// Summary of the choice at hand.
    pub summary: String,
    /// Severity grade.
    #[serde(default)]
    pub severity: Severity,
    /// Agent confidence in its recommendation, `[0, 1]`.
    #[serde(default)]
    pub confidence: f64,
    /// Blast radius of the choice.
    #[serde(default)]
    pub blast_radius: BlastRadius,
    /// Selectable alternatives.
    pub options: Vec<DecisionOption>,
    /// Recommended option, when the agent has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommended_option_id: Option<String>,
    /// Artifacts affected by the choice.
    #[serde(default)]
    pub affected_artifact_ids: Vec<ArtifactId>,
    /// Whether resolution requires a human rationale.
    #[serde(default)]
    pub requires_rationale: bool,
    /// Optional absolute tick deadline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_by_tick: Option<Tick>,
}

/// Tool-approval decision payload: gate a risky tool call.
///
/// # Invariants
/// - `tool_args` is the verbatim argument payload the agent proposed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolApprovalDecision {
    /// Decision identifier.
    pub decision_id: DecisionId,
    /// Agent requesting the tool call.
    pub agent_id: AgentId,
    /// Tool name (e.g. `Bash`, `Write`).
    pub tool_name: String,
    /// Proposed tool arguments.
    pub tool_args: Value,
    /// Adapter-side tool-use correlation id, when provided.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_use_id: Option<String>,
    /// Most recent agent status message, attached as reasoning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    /// Severity grade derived from the tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    /// Blast radius derived from the tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blast_radius: Option<BlastRadius>,
    /// Optional absolute tick deadline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_by_tick: Option<Tick>,
}

/// Decision event union carried in envelopes and queued for resolution.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecisionEvent {
    /// Pick from alternatives.
    Option(OptionDecision),
    /// Approve or reject a tool call.
    ToolApproval(ToolApprovalDecision),
}

impl DecisionEvent {
    /// Returns the decision identifier.
    #[must_use]
    pub const fn decision_id(&self) -> &DecisionId {
        match self {
            Self::Option(event) => &event.decision_id,
            Self::ToolApproval(event) => &event.decision_id,
        }
    }

    /// Returns the agent that owns the decision.
    #[must_use]
    pub const fn agent_id(&self) -> &AgentId {
        match self {
            Self::Option(event) => &event.agent_id,
            Self::ToolApproval(event) => &event.agent_id,
        }
    }

    /// Returns the severity grade used for priority computation.
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Self::Option(event) => event.severity,
            Self::ToolApproval(event) => event.severity.unwrap_or_default(),
        }
    }

    /// Returns the absolute tick deadline, when present.
    #[must_use]
    pub const fn due_by_tick(&self) -> Option<Tick> {
        match self {
            Self::Option(event) => event.due_by_tick,
            Self::ToolApproval(event) => event.due_by_tick,
        }
    }

    /// Returns the artifacts affected by the decision.
    #[must_use]
    pub fn affected_artifact_ids(&self) -> &[ArtifactId] {
        match self {
            Self::Option(event) => &event.affected_artifact_ids,
            Self::ToolApproval(_) => &[],
        }
    }

    /// Returns a short human-readable title.
    #[must_use]
    pub fn title(&self) -> String {
        match self {
            Self::Option(event) => event.title.clone(),
            Self::ToolApproval(event) => format!("tool approval: {}", event.tool_name),
        }
    }

    /// Returns a stable label for the decision kind.
    #[must_use]
    pub const fn kind_label(&self) -> &'static str {
        match self {
            Self::Option(_) => "option",
            Self::ToolApproval(_) => "tool_approval",
        }
    }
}

// ============================================================================
// SECTION: Resolutions
// ============================================================================

/// Action taken on a tool-approval decision.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalAction {
    /// Allow the tool call.
    Approve,
    /// Block the tool call.
    Reject,
    /// Allow with modified arguments.
    Modify,
}

impl ApprovalAction {
    /// Returns a stable label for the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Modify => "modify",
        }
    }
}

/// How a resolution was produced.
///
/// # Invariants
/// - Variants are stable for serialization and audit records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Human (or policy) reviewed the decision as presented.
    #[default]
    Review,
    /// Human substituted their own outcome.
    Override,
    /// Decision was escalated to a different authority.
    Escalate,
}

/// Resolution attached to a terminal decision.
///
/// # Invariants
/// - Exactly one resolution attaches per decision; it never changes after.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DecisionResolution {
    /// Resolution of an option decision.
    Option {
        /// Chosen option identifier.
        chosen_option_id: String,
        /// Rationale for the choice.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rationale: Option<String>,
        /// How the resolution was produced.
        #[serde(default)]
        action_kind: ActionKind,
        /// Whether the control plane resolved without a human.
        #[serde(default)]
        auto_resolved: bool,
    },
    /// Resolution of a tool-approval decision.
    ToolApproval {
        /// Approval action taken.
        action: ApprovalAction,
        /// Rationale for the action.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rationale: Option<String>,
        /// How the resolution was produced.
        #[serde(default)]
        action_kind: ActionKind,
        /// Whether the control plane resolved without a human.
        #[serde(default)]
        auto_resolved: bool,
        /// Replacement arguments when `action` is modify.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        modified_args: Option<Value>,
    },
}

impl DecisionResolution {
    /// Returns true when the resolution was produced without a human.
    #[must_use]
    pub const fn is_auto_resolved(&self) -> bool {
        match self {
            Self::Option {
                auto_resolved, ..
            }
            | Self::ToolApproval {
                auto_resolved, ..
            } => *auto_resolved,
        }
    }

    /// Returns the rationale text, when present.
    #[must_use]
    pub fn rationale(&self) -> Option<&str> {
        match self {
            Self::Option {
                rationale, ..
            }
            | Self::ToolApproval {
                rationale, ..
            } => rationale.as_deref(),
        }
    }
}

// ============================================================================
// SECTION: Queue Records
// ============================================================================

/// Decision lifecycle status tracked by the queue.
///
/// # Invariants
/// - `Resolved` and `TimedOut` are terminal; a terminal decision never
///   changes status again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    /// Awaiting resolution.
    Pending,
    /// Temporarily parked while the source agent is braked.
    Suspended,
    /// Needs human triage after the source agent was killed.
    Triage,
    /// Resolved by a human or the control plane.
    Resolved,
    /// Auto-resolved by deadline expiry.
    TimedOut,
}

impl DecisionStatus {
    /// Returns true for terminal statuses.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::TimedOut)
    }

    /// Returns a stable label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Suspended => "suspended",
            Self::Triage => "triage",
            Self::Resolved => "resolved",
            Self::TimedOut => "timed_out",
        }
    }
}

/// Queue record for one decision.
///
/// # Invariants
/// - `resolution` and `resolved_at` are set iff `status` is terminal.
/// - `priority` only grows (orphan elevation); it never decreases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingDecision {
    /// The decision event.
    pub event: DecisionEvent,
    /// Lifecycle status.
    pub status: DecisionStatus,
    /// Tick at which the decision was enqueued.
    pub enqueued_at_tick: Tick,
    /// Computed priority (higher first).
    pub priority: i64,
    /// Terminal resolution, when attached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<DecisionResolution>,
    /// Timestamp of terminal resolution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<Timestamp>,
    /// Display badge (e.g. "agent killed").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<String>,
}
