// crates/overseer-core/src/interfaces/mod.rs
// ============================================================================
// Module: Overseer Interfaces
// Description: Backend-agnostic interfaces for persistence and agent transport.
// Purpose: Define the contract surfaces used by the control-plane engines.
// Dependencies: async-trait, serde, thiserror, crate::core
// ============================================================================

//! ## Overview
//! Interfaces define how the control plane integrates with storage backends
//! and provider adapters without embedding backend-specific details.
//! Implementations must fail closed: a conflict or transport error surfaces
//! as a typed variant, never as silently dropped state.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::AgentBrief;
use crate::core::AgentHandle;
use crate::core::AgentId;
use crate::core::AgentRecord;
use crate::core::AgentStatus;
use crate::core::Artifact;
use crate::core::ArtifactContent;
use crate::core::ArtifactEvent;
use crate::core::ArtifactId;
use crate::core::AuditLogEntry;
use crate::core::BriefPatch;
use crate::core::Checkpoint;
use crate::core::CoherenceIssue;
use crate::core::ContextInjection;
use crate::core::DecisionId;
use crate::core::DecisionResolution;
use crate::core::EventEnvelope;
use crate::core::EventFilter;
use crate::core::IssueId;
use crate::core::IssueStatus;
use crate::core::KnowledgeSnapshot;
use crate::core::PendingDecisionSummary;
use crate::core::ProjectConfig;
use crate::core::SerializedAgentState;
use crate::core::StoredContent;
use crate::core::TrustProfile;
use crate::core::WorkstreamId;
use crate::core::WorkstreamSummary;

// ============================================================================
// SECTION: Store Errors
// ============================================================================

/// Knowledge store errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling; `Conflict` is the only
///   variant optimistic writers are expected to catch.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Optimistic concurrency conflict.
    #[error("version conflict: expected {expected}, actual {actual}")]
    Conflict {
        /// Version the caller supplied.
        expected: u64,
        /// Version actually stored.
        actual: u64,
    },
    /// Duplicate insert into an append-only or unique-keyed table.
    #[error("duplicate record: {0}")]
    Duplicate(String),
    /// Referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Underlying storage I/O failure.
    #[error("store io error: {0}")]
    Io(String),
    /// Stored data failed integrity checks.
    #[error("store corruption: {0}")]
    Corrupt(String),
    /// Caller-supplied data is invalid.
    #[error("store invalid data: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Project Store
// ============================================================================

/// Transactional knowledge store owning all persisted project state.
///
/// Every write method is a serializable transaction: it either commits
/// wholly (including its audit entry and version-counter bump) or not at
/// all. Reads observe a single atomic state.
pub trait ProjectStore: Send + Sync {
    // ------------------------------------------------------------------
    // Artifacts
    // ------------------------------------------------------------------

    /// Atomically upserts an artifact after checking `expected_version`.
    ///
    /// A missing row counts as version 0. On success the stored version
    /// becomes `expected_version + 1`, an audit entry is recorded, the
    /// owning workstream row is ensured, and the global version is bumped.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when the stored version differs from
    /// `expected_version`, and other variants for storage failures.
    fn upsert_artifact(
        &self,
        event: &ArtifactEvent,
        expected_version: u64,
        caller: Option<&AgentId>,
    ) -> Result<Artifact, StoreError>;

    /// Legacy unchecked upsert; still increments the version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn store_artifact(&self, event: &ArtifactEvent) -> Result<Artifact, StoreError>;

    /// Loads an artifact by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn get_artifact(&self, id: &ArtifactId) -> Result<Option<Artifact>, StoreError>;

    /// Lists artifacts, optionally filtered by workstream.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn list_artifacts(&self, workstream: Option<&WorkstreamId>)
    -> Result<Vec<Artifact>, StoreError>;

    /// Returns the stored version of an artifact (0 when absent).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn artifact_version(&self, id: &ArtifactId) -> Result<u64, StoreError>;

    /// Stores artifact content keyed by `(agent_id, artifact_id)`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn store_artifact_content(
        &self,
        agent_id: &AgentId,
        artifact_id: &ArtifactId,
        content: &[u8],
        mime_type: Option<&str>,
    ) -> Result<StoredContent, StoreError>;

    /// Loads stored artifact content.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn get_artifact_content(
        &self,
        agent_id: &AgentId,
        artifact_id: &ArtifactId,
    ) -> Result<Option<ArtifactContent>, StoreError>;

    // ------------------------------------------------------------------
    // Agents
    // ------------------------------------------------------------------

    /// Registers (or re-registers) an agent record from its handle and brief.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn register_agent(&self, handle: &AgentHandle, brief: &AgentBrief) -> Result<(), StoreError>;

    /// Updates an agent's lifecycle status.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the agent is unknown.
    fn update_agent_status(&self, id: &AgentId, status: AgentStatus) -> Result<(), StoreError>;

    /// Removes an agent record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn remove_agent(&self, id: &AgentId) -> Result<(), StoreError>;

    /// Loads an agent record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn get_agent(&self, id: &AgentId) -> Result<Option<AgentRecord>, StoreError>;

    /// Lists all agent records.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn list_agents(&self) -> Result<Vec<AgentRecord>, StoreError>;

    // ------------------------------------------------------------------
    // Coherence
    // ------------------------------------------------------------------

    /// Stores (or replaces) a coherence issue.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn store_coherence_issue(&self, issue: &CoherenceIssue) -> Result<(), StoreError>;

    /// Lists coherence issues, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn list_coherence_issues(
        &self,
        status: Option<IssueStatus>,
    ) -> Result<Vec<CoherenceIssue>, StoreError>;

    /// Resolves an open coherence issue. Transitions are open -> resolved
    /// only.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for unknown issues and
    /// [`StoreError::Invalid`] when the issue is already resolved.
    fn resolve_coherence_issue(
        &self,
        id: &IssueId,
        resolution: &str,
        caller: Option<&AgentId>,
    ) -> Result<(), StoreError>;

    // ------------------------------------------------------------------
    // Trust
    // ------------------------------------------------------------------

    /// Loads the trust profile for an agent (defaults when absent).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn trust_profile(&self, id: &AgentId) -> Result<TrustProfile, StoreError>;

    /// Applies a delta to the persisted global score, clamped to `[0, 100]`.
    /// Returns the updated score.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn update_trust(&self, id: &AgentId, delta: i64, reason: &str) -> Result<i64, StoreError>;

    /// Loads the persisted per-domain scores.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn domain_trust_scores(&self, id: &AgentId) -> Result<BTreeMap<String, i64>, StoreError>;

    /// Replaces the persisted per-domain scores.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn store_domain_trust_scores(
        &self,
        id: &AgentId,
        scores: &BTreeMap<String, i64>,
    ) -> Result<(), StoreError>;

    // ------------------------------------------------------------------
    // Workstreams
    // ------------------------------------------------------------------

    /// Idempotently ensures a workstream row exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn ensure_workstream(
        &self,
        id: &WorkstreamId,
        name: Option<&str>,
        status: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Records the latest activity note for a workstream.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn update_workstream_activity(&self, id: &WorkstreamId, activity: &str)
    -> Result<(), StoreError>;

    /// Lists workstream summaries.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn list_workstreams(&self) -> Result<Vec<WorkstreamSummary>, StoreError>;

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Appends an event envelope. Duplicate `source_event_id`s are rejected
    /// with [`StoreError::Duplicate`] so ingestion can treat them as no-ops.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn append_event(&self, envelope: &EventEnvelope) -> Result<(), StoreError>;

    /// Queries stored events in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn events(&self, filter: &EventFilter) -> Result<Vec<EventEnvelope>, StoreError>;

    // ------------------------------------------------------------------
    // Checkpoints
    // ------------------------------------------------------------------

    /// Stores a checkpoint, then prunes beyond `max_per_agent` newest-first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn store_checkpoint(
        &self,
        state: &SerializedAgentState,
        decision_id: Option<&DecisionId>,
        max_per_agent: usize,
    ) -> Result<Checkpoint, StoreError>;

    /// Loads the newest checkpoint for an agent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn latest_checkpoint(&self, agent_id: &AgentId) -> Result<Option<Checkpoint>, StoreError>;

    /// Lists checkpoints for an agent, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn checkpoints(&self, agent_id: &AgentId) -> Result<Vec<Checkpoint>, StoreError>;

    /// Counts stored checkpoints for an agent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn checkpoint_count(&self, agent_id: &AgentId) -> Result<u64, StoreError>;

    /// Deletes all checkpoints for an agent, returning the removed count.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn delete_checkpoints(&self, agent_id: &AgentId) -> Result<u64, StoreError>;

    // ------------------------------------------------------------------
    // Project, audit, versioning
    // ------------------------------------------------------------------

    /// Upserts the single project configuration row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn store_project_config(&self, config: &ProjectConfig) -> Result<(), StoreError>;

    /// Loads the project configuration, when seeded.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn project_config(&self) -> Result<Option<ProjectConfig>, StoreError>;

    /// Returns true when a project has been seeded.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn has_project(&self) -> Result<bool, StoreError>;

    /// Appends an audit log entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn append_audit(&self, entry: &AuditLogEntry) -> Result<(), StoreError>;

    /// Lists audit entries, optionally filtered by entity type and id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn audit_log(
        &self,
        entity_type: Option<&str>,
        entity_id: Option<&str>,
    ) -> Result<Vec<AuditLogEntry>, StoreError>;

    /// Returns the global version counter.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn version(&self) -> Result<u64, StoreError>;

    /// Builds a consistent snapshot at the current version. The caller
    /// supplies the pending-decision view since the queue owns that state.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn snapshot(
        &self,
        pending_decisions: &[PendingDecisionSummary],
    ) -> Result<KnowledgeSnapshot, StoreError>;

    /// Reports store readiness for liveness/readiness probes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store is unavailable.
    fn readiness(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

// ============================================================================
// SECTION: Plugin Errors
// ============================================================================

/// Agent plugin (adapter transport) errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum PluginError {
    /// The referenced agent is unknown to the plugin.
    #[error("plugin has no agent: {0}")]
    NotFound(String),
    /// The transport to the adapter failed.
    #[error("adapter transport error: {0}")]
    Transport(String),
    /// The adapter replied with a malformed payload.
    #[error("adapter protocol error: {0}")]
    Protocol(String),
    /// The operation is not supported by this plugin.
    #[error("operation not supported: {0}")]
    Unsupported(String),
    /// The operation exceeded its deadline.
    #[error("adapter operation timed out: {0}")]
    Timeout(String),
}

// ============================================================================
// SECTION: Plugin Contract
// ============================================================================

/// Lifecycle operations a plugin supports.
///
/// # Invariants
/// - The gateway rejects unsupported operations before calling the plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginCapabilities {
    /// Supports pause with state serialization.
    pub can_pause: bool,
    /// Supports resume from serialized state.
    pub can_resume: bool,
    /// Supports on-demand checkpoints.
    pub can_checkpoint: bool,
    /// Supports partial brief updates.
    pub can_update_brief: bool,
}

/// Options controlling a kill request.
///
/// # Invariants
/// - `grace_timeout_ms` only applies when `grace` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KillOptions {
    /// Allow the adapter a grace window to serialize state.
    pub grace: bool,
    /// Grace window length in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grace_timeout_ms: Option<u64>,
}

/// Outcome of a kill request.
///
/// # Invariants
/// - `state` is present when the grace window produced a serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KillOutcome {
    /// Serialized state captured during the grace window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<SerializedAgentState>,
    /// Whether artifacts were extracted before teardown.
    pub artifacts_extracted: bool,
    /// Whether the adapter shut down cleanly.
    pub clean_shutdown: bool,
}

/// Provider-adapter transport contract.
///
/// Implementations own the process/container lifecycle for their agents and
/// push observed events into the control plane through the event sink they
/// were constructed with.
#[async_trait]
pub trait AgentPlugin: Send + Sync {
    /// Returns the plugin's registry name.
    fn name(&self) -> &str;

    /// Returns the lifecycle operations this plugin supports.
    fn capabilities(&self) -> PluginCapabilities;

    /// Spawns an agent from a brief.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError`] when the adapter cannot be started.
    async fn spawn(&self, brief: &AgentBrief) -> Result<AgentHandle, PluginError>;

    /// Pauses an agent, returning its serialized state.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError`] when pausing or serialization fails.
    async fn pause(&self, handle: &AgentHandle) -> Result<SerializedAgentState, PluginError>;

    /// Resumes an agent from serialized state.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError`] when the adapter cannot be restarted.
    async fn resume(&self, state: &SerializedAgentState) -> Result<AgentHandle, PluginError>;

    /// Kills an agent, optionally with a grace window.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError`] when teardown fails outright; an unclean
    /// shutdown is reported through [`KillOutcome`], not an error.
    async fn kill(
        &self,
        handle: &AgentHandle,
        options: &KillOptions,
    ) -> Result<KillOutcome, PluginError>;

    /// Forwards a decision resolution to the agent.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError`] when delivery fails.
    async fn resolve_decision(
        &self,
        handle: &AgentHandle,
        decision_id: &DecisionId,
        resolution: &DecisionResolution,
    ) -> Result<(), PluginError>;

    /// Delivers a context injection to the agent.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError`] when delivery fails.
    async fn inject_context(
        &self,
        handle: &AgentHandle,
        injection: &ContextInjection,
    ) -> Result<(), PluginError>;

    /// Applies a partial brief update.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError`] when delivery fails.
    async fn update_brief(
        &self,
        handle: &AgentHandle,
        patch: &BriefPatch,
    ) -> Result<(), PluginError>;

    /// Requests an on-demand checkpoint.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError`] when serialization fails.
    async fn request_checkpoint(
        &self,
        handle: &AgentHandle,
        decision_id: Option<&DecisionId>,
    ) -> Result<SerializedAgentState, PluginError>;
}

// ============================================================================
// SECTION: Injection Target
// ============================================================================

/// Seam the injection scheduler delivers through.
///
/// The gateway implements this by resolving the agent's handle and routing
/// to the owning plugin; tests substitute an in-memory fake.
#[async_trait]
pub trait InjectionTarget: Send + Sync {
    /// Returns the current handle for an agent, when registered.
    fn handle(&self, agent_id: &AgentId) -> Option<AgentHandle>;

    /// Delivers a context injection.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError`] when delivery fails.
    async fn inject(
        &self,
        handle: &AgentHandle,
        injection: &ContextInjection,
    ) -> Result<(), PluginError>;
}
