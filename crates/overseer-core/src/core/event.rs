// crates/overseer-core/src/core/event.rs
// ============================================================================
// Module: Overseer Event Envelopes
// Description: Typed event stream ingested from agent adapters.
// Purpose: Model every observable agent action with sequencing and idempotency keys.
// Dependencies: serde, serde_json, crate::core::{artifact, coherence, decision, identifiers, time}
// ============================================================================

//! ## Overview
//! Every observable agent action arrives as an [`EventEnvelope`]: an
//! adapter-assigned event id, a per-run monotonic sequence number, source and
//! ingestion timestamps, and a typed payload. Envelopes are idempotent on
//! `source_event_id`; `source_sequence` strictly increases per
//! `(agent_id, run_id)`, and regressions are quarantined rather than
//! published.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::artifact::ArtifactEvent;
use crate::core::coherence::CoherenceIssue;
use crate::core::decision::DecisionEvent;
use crate::core::identifiers::AgentId;
use crate::core::identifiers::RunId;
use crate::core::identifiers::SourceEventId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Event Payloads
// ============================================================================

/// Agent lifecycle phase announced through lifecycle events.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    /// Agent process started.
    Spawned,
    /// Agent paused; state was serialized.
    Paused,
    /// Agent resumed from serialized state.
    Resumed,
    /// Agent was killed.
    Killed,
    /// Agent finished its work.
    Completed,
}

/// Typed event payload for one observable agent action.
///
/// # Invariants
/// - Variants are stable for serialization and subscription filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Free-text progress/status message.
    Status {
        /// Status message text.
        message: String,
    },
    /// A decision the agent needs resolved.
    Decision {
        /// Decision payload.
        decision: DecisionEvent,
    },
    /// Artifact create/update.
    Artifact {
        /// Artifact upsert payload.
        artifact: ArtifactEvent,
        /// Version the producer last observed, for optimistic upserts.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expected_version: Option<u64>,
    },
    /// Coherence issue raised by review.
    Coherence {
        /// Issue payload.
        issue: CoherenceIssue,
    },
    /// Tool invocation observed after approval.
    ToolCall {
        /// Tool name.
        tool_name: String,
        /// Tool arguments.
        tool_args: Value,
        /// Adapter-side tool-use correlation id.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_use_id: Option<String>,
    },
    /// Agent finished its assignment.
    Completion {
        /// Optional completion summary.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        summary: Option<String>,
    },
    /// Agent-reported error.
    Error {
        /// Error message.
        message: String,
    },
    /// Agent delegated work to another role.
    Delegation {
        /// Target role for the delegated work.
        target_role: String,
        /// Description of the delegated task.
        task: String,
    },
    /// Guardrail rule fired inside the sandbox.
    Guardrail {
        /// Rule identifier.
        rule: String,
        /// Human-readable detail.
        message: String,
    },
    /// Lifecycle transition.
    Lifecycle {
        /// New lifecycle phase.
        phase: LifecyclePhase,
    },
    /// Structured progress report.
    Progress {
        /// Progress message.
        message: String,
        /// Optional completion fraction in `[0, 1]`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        percent: Option<f64>,
    },
    /// Raw provider payload passed through unmodified.
    RawProvider {
        /// Provider payload.
        payload: Value,
    },
}

// ============================================================================
// SECTION: Event Kinds
// ============================================================================

/// Event kind discriminant used by subscriptions and stored-event filters.
///
/// # Invariants
/// - Labels match the serialized `type` tag of [`AgentEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Status message.
    Status,
    /// Decision event.
    Decision,
    /// Artifact upsert.
    Artifact,
    /// Coherence issue.
    Coherence,
    /// Tool invocation.
    ToolCall,
    /// Completion.
    Completion,
    /// Error.
    Error,
    /// Delegation.
    Delegation,
    /// Guardrail.
    Guardrail,
    /// Lifecycle transition.
    Lifecycle,
    /// Progress report.
    Progress,
    /// Raw provider payload.
    RawProvider,
}

impl EventKind {
    /// Returns the stable wire label for the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Decision => "decision",
            Self::Artifact => "artifact",
            Self::Coherence => "coherence",
            Self::ToolCall => "tool_call",
            Self::Completion => "completion",
            Self::Error => "error",
            Self::Delegation => "delegation",
            Self::Guardrail => "guardrail",
            Self::Lifecycle => "lifecycle",
            Self::Progress => "progress",
            Self::RawProvider => "raw_provider",
        }
    }

    /// Parses a wire label into a kind.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "status" => Some(Self::Status),
            "decision" => Some(Self::Decision),
            "artifact" => Some(Self::Artifact),
            "coherence" => Some(Self::Coherence),
            "tool_call" => Some(Self::ToolCall),
            "completion" => Some(Self::Completion),
            "error" => Some(Self::Error),
            "delegation" => Some(Self::Delegation),
            "guardrail" => Some(Self::Guardrail),
            "lifecycle" => Some(Self::Lifecycle),
            "progress" => Some(Self::Progress),
            "raw_provider" => Some(Self::RawProvider),
            _ => None,
        }
    }
}

impl AgentEvent {
    /// Returns the kind discriminant for this payload.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Status {
                ..
            } => EventKind::Status,
            Self::Decision {
                ..
            } => EventKind::Decision,
            Self::Artifact {
                ..
            } => EventKind::Artifact,
            Self::Coherence {
                ..
            } => EventKind::Coherence,
            Self::ToolCall {
                ..
            } => EventKind::ToolCall,
            Self::Completion {
                ..
            } => EventKind::Completion,
            Self::Error {
                ..
            } => EventKind::Error,
            Self::Delegation {
                ..
            } => EventKind::Delegation,
            Self::Guardrail {
                ..
            } => EventKind::Guardrail,
            Self::Lifecycle {
                ..
            } => EventKind::Lifecycle,
            Self::Progress {
                ..
            } => EventKind::Progress,
            Self::RawProvider {
                ..
            } => EventKind::RawProvider,
        }
    }
}

// ============================================================================
// SECTION: Envelopes
// ============================================================================

/// Adapter event as pushed over the adapter transport, before ingestion.
///
/// # Invariants
/// - `source_sequence` strictly increases per `(agent, run)` at the adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterEvent {
    /// Adapter-assigned unique event identifier.
    pub source_event_id: SourceEventId,
    /// Monotonic sequence number within the run.
    pub source_sequence: u64,
    /// Timestamp at the adapter when the event occurred.
    pub source_occurred_at: Timestamp,
    /// Run identifier.
    pub run_id: RunId,
    /// Typed event payload.
    pub event: AgentEvent,
}

/// Ingested event envelope as stored and published on the bus.
///
/// # Invariants
/// - Idempotent on `source_event_id`; duplicates are dropped at ingestion.
/// - `source_sequence` strictly increases per `(agent_id, run_id)` in
///   insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    /// Adapter-assigned unique event identifier.
    pub source_event_id: SourceEventId,
    /// Monotonic sequence number within the run.
    pub source_sequence: u64,
    /// Timestamp at the adapter when the event occurred.
    pub source_occurred_at: Timestamp,
    /// Agent the event originates from.
    pub agent_id: AgentId,
    /// Run identifier.
    pub run_id: RunId,
    /// Timestamp when the control plane ingested the event.
    pub ingested_at: Timestamp,
    /// Typed event payload.
    pub event: AgentEvent,
}

impl EventEnvelope {
    /// Builds an envelope from an adapter event at ingestion time.
    #[must_use]
    pub fn from_adapter(agent_id: AgentId, event: AdapterEvent, ingested_at: Timestamp) -> Self {
        Self {
            source_event_id: event.source_event_id,
            source_sequence: event.source_sequence,
            source_occurred_at: event.source_occurred_at,
            agent_id,
            run_id: event.run_id,
            ingested_at,
            event: event.event,
        }
    }
}

// ============================================================================
// SECTION: Stored Event Filters
// ============================================================================

/// Filter for querying stored events.
///
/// # Invariants
/// - Empty fields match everything; `limit` is clamped by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFilter {
    /// Match a single agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<AgentId>,
    /// Match a single run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<RunId>,
    /// Match any of these kinds (empty = all).
    #[serde(default)]
    pub types: Vec<EventKind>,
    /// Only events ingested at or after this timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<Timestamp>,
    /// Maximum rows returned (store clamps to its ceiling).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}
