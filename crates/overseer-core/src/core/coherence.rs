// crates/overseer-core/src/core/coherence.rs
// ============================================================================
// Module: Overseer Coherence Issues
// Description: Cross-workstream inconsistency records.
// Purpose: Model coherence issues raised by review and their open/resolved lifecycle.
// Dependencies: serde, crate::core::{identifiers, risk, time}
// ============================================================================

//! ## Overview
//! Coherence issues flag inconsistencies that span workstreams:
//! contradictions, duplications, gaps, and dependency violations. Issues move
//! from `open` to `resolved` exactly once; resolution text is recorded with
//! the resolver.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::AgentId;
use crate::core::identifiers::ArtifactId;
use crate::core::identifiers::IssueId;
use crate::core::identifiers::WorkstreamId;
use crate::core::risk::Severity;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Issue Kinds and Status
// ============================================================================

/// Coherence issue classification.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Two artifacts state contradictory facts.
    Contradiction,
    /// The same work exists in more than one place.
    Duplication,
    /// Required work is missing.
    Gap,
    /// A dependency constraint is violated.
    DependencyViolation,
}

impl IssueKind {
    /// Returns a stable label for the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Contradiction => "contradiction",
            Self::Duplication => "duplication",
            Self::Gap => "gap",
            Self::DependencyViolation => "dependency_violation",
        }
    }
}

/// Coherence issue lifecycle status.
///
/// # Invariants
/// - Transitions are `open -> resolved` only; a resolved issue never reopens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    /// Issue is open.
    #[default]
    Open,
    /// Issue has been resolved.
    Resolved,
}

impl IssueStatus {
    /// Returns a stable label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Resolved => "resolved",
        }
    }
}

// ============================================================================
// SECTION: Issue Record
// ============================================================================

/// Coherence issue record.
///
/// # Invariants
/// - `resolution` is present iff `status` is resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoherenceIssue {
    /// Issue identifier.
    pub issue_id: IssueId,
    /// Issue classification.
    pub kind: IssueKind,
    /// Human-readable description.
    pub description: String,
    /// Issue severity.
    #[serde(default)]
    pub severity: Severity,
    /// Workstreams affected by the issue.
    #[serde(default)]
    pub affected_workstreams: Vec<WorkstreamId>,
    /// Artifacts affected by the issue.
    #[serde(default)]
    pub affected_artifact_ids: Vec<ArtifactId>,
    /// Lifecycle status.
    #[serde(default)]
    pub status: IssueStatus,
    /// Agent that raised the issue, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raised_by: Option<AgentId>,
    /// Timestamp when the issue was raised.
    pub raised_at: Timestamp,
    /// Resolution text, present once resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
}
