// crates/overseer-core/src/core/snapshot.rs
// ============================================================================
// Module: Overseer Knowledge Snapshots
// Description: Versioned read-model of project state.
// Purpose: Model the snapshot payload injected into agents and broadcast to clients.
// Dependencies: serde, serde_json, crate::core::{agent, artifact, coherence, decision, identifiers, risk, time}
// ============================================================================

//! ## Overview
//! A knowledge snapshot is the versioned read-model derived from the store:
//! workstream summaries, pending decisions, recent coherence issues, the
//! artifact index, and active agents. The snapshot at version `V` reflects
//! every mutation with version `<= V`; the estimated token count is
//! `ceil(json_length / 4)`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::agent::AgentStatus;
use crate::core::artifact::ArtifactKind;
use crate::core::artifact::ArtifactStatus;
use crate::core::coherence::CoherenceIssue;
use crate::core::identifiers::AgentId;
use crate::core::identifiers::ArtifactId;
use crate::core::identifiers::DecisionId;
use crate::core::identifiers::WorkstreamId;
use crate::core::risk::Severity;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Snapshot Sections
// ============================================================================

/// Workstream summary row.
///
/// # Invariants
/// - One row per workstream id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkstreamSummary {
    /// Workstream identifier.
    pub workstream_id: WorkstreamId,
    /// Display name.
    pub name: String,
    /// Status label (e.g. "active").
    pub status: String,
    /// Most recent activity note, when recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<String>,
}

/// Pending decision summary row.
///
/// # Invariants
/// - Mirrors the queue's pending view at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingDecisionSummary {
    /// Decision identifier.
    pub decision_id: DecisionId,
    /// Owning agent.
    pub agent_id: AgentId,
    /// Decision kind label (`option` or `tool_approval`).
    pub kind: String,
    /// Short title.
    pub title: String,
    /// Severity grade.
    pub severity: Severity,
    /// Computed queue priority.
    pub priority: i64,
}

/// Artifact index row.
///
/// # Invariants
/// - One row per artifact id at its latest version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactIndexEntry {
    /// Artifact identifier.
    pub artifact_id: ArtifactId,
    /// Display name.
    pub name: String,
    /// Artifact kind.
    pub kind: ArtifactKind,
    /// Owning workstream.
    pub workstream: WorkstreamId,
    /// Review status.
    pub status: ArtifactStatus,
    /// Latest version.
    pub version: u64,
    /// Quality score in `[0, 1]`.
    pub quality_score: f64,
}

/// Active agent summary row.
///
/// # Invariants
/// - Lists agents whose status is not terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveAgentSummary {
    /// Agent identifier.
    pub agent_id: AgentId,
    /// Role from the brief.
    pub role: String,
    /// Primary workstream.
    pub workstream: WorkstreamId,
    /// Lifecycle status.
    pub status: AgentStatus,
}

// ============================================================================
// SECTION: Snapshot
// ============================================================================

/// Versioned read-model of project state.
///
/// # Invariants
/// - `version` is monotonically non-decreasing across successive snapshots.
/// - `estimated_tokens` is `ceil(serialized_json_length / 4)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeSnapshot {
    /// Store version the snapshot reflects.
    pub version: u64,
    /// Generation timestamp.
    pub generated_at: Timestamp,
    /// Workstream summaries.
    pub workstreams: Vec<WorkstreamSummary>,
    /// Pending decisions at snapshot time.
    pub pending_decisions: Vec<PendingDecisionSummary>,
    /// Recently raised coherence issues.
    pub recent_coherence_issues: Vec<CoherenceIssue>,
    /// Artifact index.
    pub artifact_index: Vec<ArtifactIndexEntry>,
    /// Non-terminal agents.
    pub active_agents: Vec<ActiveAgentSummary>,
    /// Estimated token count of the serialized snapshot.
    pub estimated_tokens: u64,
}

impl KnowledgeSnapshot {
    /// Computes the token estimate for a serialized snapshot body.
    #[must_use]
    pub fn estimate_tokens(json_length: usize) -> u64 {
        u64::try_from(json_length).unwrap_or(u64::MAX).div_ceil(4)
    }
}
