// crates/overseer-core/src/core/brief.rs
// ============================================================================
// Module: Overseer Agent Briefs
// Description: Spawn-time briefs, session policies, and injection policies.
// Purpose: Model everything handed to an agent at spawn or brief update.
// Dependencies: serde, crate::core::{identifiers, risk, snapshot, time}
// ============================================================================

//! ## Overview
//! A brief is the full instruction packet for a worker agent: role,
//! workstream assignment, escalation rules, allowed tools, session limits,
//! and the context-injection policy the scheduler evaluates for it. Briefs
//! are immutable snapshots; updates travel as [`BriefPatch`] partials through
//! the gateway.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::AgentId;
use crate::core::identifiers::WorkstreamId;
use crate::core::risk::Severity;
use crate::core::snapshot::KnowledgeSnapshot;

// ============================================================================
// SECTION: Escalation and Session Policy
// ============================================================================

/// Escalation behavior when the agent hits a blocking condition.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EscalationProtocol {
    /// Raise a decision and keep working on unblocked tasks.
    #[default]
    Notify,
    /// Raise a decision and block until it resolves.
    Block,
    /// Decide autonomously and record the choice.
    Autonomous,
}

/// Session limits applied by the adapter and the injection scheduler.
///
/// # Invariants
/// - Absent fields mean "no limit".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SessionPolicy {
    /// Maximum provider turns before the adapter stops the session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_turns: Option<u32>,
    /// Context budget in tokens; supplementary injections above it are
    /// skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_budget_tokens: Option<u64>,
}

// ============================================================================
// SECTION: Context Injection Policy
// ============================================================================

/// Workstream scope selector for reactive triggers.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkstreamScope {
    /// Only the agent's primary workstream.
    Own,
    /// The primary plus readable workstreams.
    #[default]
    Readable,
    /// Every workstream.
    All,
}

/// Reactive trigger evaluated against each bus event.
///
/// # Invariants
/// - Variants are stable for serialization and policy matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "on", rename_all = "snake_case")]
pub enum ReactiveTrigger {
    /// An artifact reached approved status.
    ArtifactApproved {
        /// Workstream scope the artifact must fall in.
        #[serde(default)]
        workstreams: WorkstreamScope,
    },
    /// A decision was resolved.
    DecisionResolved {
        /// Workstream scope the deciding agent must fall in.
        #[serde(default)]
        workstreams: WorkstreamScope,
    },
    /// A coherence issue at or above a severity was raised.
    CoherenceIssue {
        /// Minimum severity that fires the trigger.
        min_severity: Severity,
    },
    /// An agent in a readable workstream completed.
    AgentCompleted,
    /// The agent's own brief was updated.
    BriefUpdated,
}

/// Context injection policy evaluated per tracked agent.
///
/// # Invariants
/// - `periodic_interval_ticks` and `staleness_threshold` of `None` disable
///   those triggers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextInjectionPolicy {
    /// Ticks between periodic injections (`None` disables).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub periodic_interval_ticks: Option<u64>,
    /// Foreign-event count that marks the agent's view stale (`None`
    /// disables).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staleness_threshold: Option<u32>,
    /// Minimum ticks between non-required injections.
    pub cooldown_ticks: u64,
    /// Maximum non-required injections per rolling hour.
    pub max_injections_per_hour: u32,
    /// Reactive triggers evaluated on every bus event.
    #[serde(default)]
    pub reactive_events: Vec<ReactiveTrigger>,
}

// ============================================================================
// SECTION: Injection Payloads
// ============================================================================

/// Priority of a scheduled injection.
///
/// # Invariants
/// - `Required` bypasses cooldown and rate limits; `Supplementary` is the
///   only priority subject to the context budget check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectionPriority {
    /// Must be delivered; bypasses cooldown and rate limits.
    Required,
    /// Normal scheduler-initiated refresh.
    Recommended,
    /// Nice-to-have; dropped when over budget.
    Supplementary,
}

impl InjectionPriority {
    /// Returns a stable label for the priority.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Recommended => "recommended",
            Self::Supplementary => "supplementary",
        }
    }
}

/// Why an injection was scheduled.
///
/// # Invariants
/// - Variants are stable for serialization and delivery logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "trigger", rename_all = "snake_case")]
pub enum InjectionReason {
    /// Periodic interval elapsed.
    Periodic,
    /// Staleness counter crossed its threshold.
    Staleness,
    /// A reactive trigger matched a bus event.
    Reactive {
        /// Stable label of the matched trigger.
        matched: String,
    },
    /// The agent's brief was updated.
    BriefUpdated,
    /// Operator or control-plane initiated.
    Manual,
}

/// Serialized payload format for an injection.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InjectionFormat {
    /// JSON-encoded knowledge snapshot.
    #[default]
    Json,
}

/// Context payload delivered to an agent through its plugin.
///
/// # Invariants
/// - `snapshot_version` identifies the snapshot serialized in `content`;
///   the scheduler never delivers the same version twice to one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextInjection {
    /// Serialized snapshot content.
    pub content: String,
    /// Payload format.
    #[serde(default)]
    pub format: InjectionFormat,
    /// Version of the serialized snapshot.
    pub snapshot_version: u64,
    /// Estimated token count of `content`.
    pub estimated_tokens: u64,
    /// Delivery priority.
    pub priority: InjectionPriority,
    /// Why the injection was scheduled.
    pub reason: InjectionReason,
    /// True when the payload is a reactive refresh rather than a full
    /// periodic push. The content is still a full snapshot.
    #[serde(default)]
    pub is_delta: bool,
}

// ============================================================================
// SECTION: Agent Brief
// ============================================================================

/// Full instruction packet handed to an agent at spawn.
///
/// # Invariants
/// - `workstream` is implicitly readable; `readable_workstreams` lists the
///   additional ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentBrief {
    /// Agent identifier.
    pub agent_id: AgentId,
    /// Role description (e.g. "backend engineer").
    pub role: String,
    /// Primary workstream.
    pub workstream: WorkstreamId,
    /// Additional readable workstreams.
    #[serde(default)]
    pub readable_workstreams: Vec<WorkstreamId>,
    /// Escalation behavior.
    #[serde(default)]
    pub escalation_protocol: EscalationProtocol,
    /// Tools the agent may call without gating policy overrides.
    #[serde(default)]
    pub allowed_tools: Vec<String>,
    /// Session limits.
    #[serde(default)]
    pub session_policy: SessionPolicy,
    /// Context injection policy; control-mode default applies when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_injection_policy: Option<ContextInjectionPolicy>,
    /// Preferred model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_preference: Option<String>,
    /// Project brief text snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_brief: Option<String>,
    /// Knowledge snapshot taken at spawn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_snapshot: Option<KnowledgeSnapshot>,
}

/// Partial brief update applied through the gateway.
///
/// # Invariants
/// - Absent fields leave the current brief value untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BriefPatch {
    /// Replacement role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Replacement project brief text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_brief: Option<String>,
    /// Replacement allowed-tool list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_tools: Option<Vec<String>>,
    /// Replacement session policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_policy: Option<SessionPolicy>,
    /// Replacement injection policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_injection_policy: Option<ContextInjectionPolicy>,
    /// Replacement model preference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_preference: Option<String>,
    /// Control mode announced to the agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_mode: Option<String>,
}

impl AgentBrief {
    /// Applies a patch, returning the updated brief.
    #[must_use]
    pub fn apply_patch(mut self, patch: &BriefPatch) -> Self {
        if let Some(role) = &patch.role {
            self.role.clone_from(role);
        }
        if let Some(project_brief) = &patch.project_brief {
            self.project_brief = Some(project_brief.clone());
        }
        if let Some(allowed_tools) = &patch.allowed_tools {
            self.allowed_tools.clone_from(allowed_tools);
        }
        if let Some(session_policy) = &patch.session_policy {
            self.session_policy = session_policy.clone();
        }
        if let Some(policy) = &patch.context_injection_policy {
            self.context_injection_policy = Some(policy.clone());
        }
        if let Some(model) = &patch.model_preference {
            self.model_preference = Some(model.clone());
        }
        self
    }

    /// Returns true when the given workstream is readable by this agent.
    #[must_use]
    pub fn can_read(&self, workstream: &WorkstreamId) -> bool {
        self.workstream == *workstream || self.readable_workstreams.contains(workstream)
    }
}
