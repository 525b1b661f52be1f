// crates/overseer-core/src/core/artifact.rs
// ============================================================================
// Module: Overseer Artifacts
// Description: Versioned agent outputs with provenance and quality scores.
// Purpose: Model artifacts, their upsert events, and stored content handles.
// Dependencies: serde, crate::core::{identifiers, time}
// ============================================================================

//! ## Overview
//! Artifacts are the persisted outputs of agents: code, docs, designs,
//! configs, tests. Every accepted upsert increments the integer version;
//! optimistic writers supply the version they read and fail with a conflict
//! when it no longer matches. Content bytes live in a separate table keyed by
//! `(agent_id, artifact_id)` and are addressed with `artifact://` URIs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::AgentId;
use crate::core::identifiers::ArtifactId;
use crate::core::identifiers::WorkstreamId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Artifact Kinds and Status
// ============================================================================

/// Artifact kind classification.
///
/// # Invariants
/// - Variants are stable for serialization and domain-trust keying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Source code.
    Code,
    /// Documentation.
    Doc,
    /// Design artifact.
    Design,
    /// Configuration.
    Config,
    /// Test artifact.
    Test,
    /// Anything else.
    Other,
}

impl ArtifactKind {
    /// Returns a stable label for the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Doc => "doc",
            Self::Design => "design",
            Self::Config => "config",
            Self::Test => "test",
            Self::Other => "other",
        }
    }
}

/// Artifact review status.
///
/// # Invariants
/// - Variants are stable for serialization and reactive-trigger matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    /// Initial draft.
    #[default]
    Draft,
    /// Under review.
    InReview,
    /// Approved for use.
    Approved,
    /// Rejected.
    Rejected,
}

impl ArtifactStatus {
    /// Returns a stable label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::InReview => "in_review",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

// ============================================================================
// SECTION: Provenance
// ============================================================================

/// Provenance metadata recorded with every artifact.
///
/// # Invariants
/// - `created_by` and `created_at` describe the original creation, not the
///   latest upsert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provenance {
    /// Agent that created the artifact.
    pub created_by: AgentId,
    /// Creation timestamp.
    pub created_at: Timestamp,
    /// Artifacts this one was derived from.
    #[serde(default)]
    pub source_artifact_ids: Vec<ArtifactId>,
}

// ============================================================================
// SECTION: Artifact Records
// ============================================================================

/// Persisted artifact record.
///
/// # Invariants
/// - `version` strictly increases on each accepted upsert, starting at 1.
/// - `quality_score` lies in `[0.0, 1.0]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// Artifact identifier.
    pub artifact_id: ArtifactId,
    /// Human-readable name.
    pub name: String,
    /// Artifact kind.
    pub kind: ArtifactKind,
    /// Owning workstream.
    pub workstream: WorkstreamId,
    /// Review status.
    pub status: ArtifactStatus,
    /// Quality score in `[0, 1]`.
    pub quality_score: f64,
    /// Provenance metadata.
    pub provenance: Provenance,
    /// Optional content URI (`artifact://…` or external).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    /// Optional MIME type of the content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Optional content size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    /// Optional opaque content hash supplied by the adapter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    /// Monotonic version, incremented on each accepted upsert.
    pub version: u64,
}

/// Artifact upsert payload carried in artifact events.
///
/// # Invariants
/// - Carries no version; the store assigns versions on acceptance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactEvent {
    /// Artifact identifier.
    pub artifact_id: ArtifactId,
    /// Human-readable name.
    pub name: String,
    /// Artifact kind.
    pub kind: ArtifactKind,
    /// Owning workstream.
    pub workstream: WorkstreamId,
    /// Review status.
    #[serde(default)]
    pub status: ArtifactStatus,
    /// Quality score in `[0, 1]`.
    #[serde(default)]
    pub quality_score: f64,
    /// Provenance metadata.
    pub provenance: Provenance,
    /// Optional content URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    /// Optional MIME type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Optional content size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    /// Optional opaque content hash.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

// ============================================================================
// SECTION: Stored Content
// ============================================================================

/// Receipt returned by the store after persisting artifact content.
///
/// # Invariants
/// - `backend_uri` follows the `artifact://<agent_id>/<artifact_id>` scheme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredContent {
    /// Backend URI resolving to the stored content.
    pub backend_uri: String,
    /// Whether the content row was written.
    pub stored: bool,
}

/// Stored artifact content payload.
///
/// # Invariants
/// - Keyed by `(agent_id, artifact_id)`; re-uploads overwrite in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactContent {
    /// Uploading agent.
    pub agent_id: AgentId,
    /// Artifact identifier.
    pub artifact_id: ArtifactId,
    /// Raw content bytes.
    pub content: Vec<u8>,
    /// Optional MIME type.
    pub mime_type: Option<String>,
    /// Upload timestamp.
    pub uploaded_at: Timestamp,
}

/// Builds the backend URI for stored artifact content.
#[must_use]
pub fn artifact_uri(agent_id: &AgentId, artifact_id: &ArtifactId) -> String {
    format!("artifact://{agent_id}/{artifact_id}")
}
