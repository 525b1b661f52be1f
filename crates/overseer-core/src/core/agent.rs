// crates/overseer-core/src/core/agent.rs
// ============================================================================
// Module: Overseer Agent Handles
// Description: Runtime handles and persisted agent records.
// Purpose: Model agent lifecycle states and the registry's runtime descriptor.
// Dependencies: serde, crate::core::{identifiers, time}
// ============================================================================

//! ## Overview
//! An agent is a spawned LLM worker identified by a stable [`AgentId`]. The
//! registry owns one [`AgentHandle`] per live agent; the store keeps a
//! durable [`AgentRecord`]. Lifecycle states move
//! `running -> {paused, waiting_on_human, completed, error}`; paused and
//! running are reversible, completed and error are terminal.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::AgentId;
use crate::core::identifiers::WorkstreamId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Agent Status
// ============================================================================

/// Agent lifecycle status.
///
/// # Invariants
/// - `Completed` and `Error` are terminal; gateway operations reject
///   transitions out of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Agent is executing.
    Running,
    /// Agent is paused with serialized state.
    Paused,
    /// Agent is blocked on a human decision.
    WaitingOnHuman,
    /// Agent finished successfully.
    Completed,
    /// Agent terminated with an error.
    Error,
}

impl AgentStatus {
    /// Returns true for terminal statuses.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// Returns a stable label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Paused => "paused",
            Self::WaitingOnHuman => "waiting_on_human",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

// ============================================================================
// SECTION: Runtime Handle
// ============================================================================

/// Runtime descriptor for a live agent, owned by the registry.
///
/// # Invariants
/// - `status` is mutated only through gateway operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentHandle {
    /// Agent identifier.
    pub agent_id: AgentId,
    /// Plugin that owns the agent's transport.
    pub plugin_name: String,
    /// Current lifecycle status.
    pub status: AgentStatus,
    /// Provider session identifier, when the plugin exposes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

// ============================================================================
// SECTION: Persisted Record
// ============================================================================

/// Durable agent record kept by the knowledge store.
///
/// # Invariants
/// - One row per agent id; re-registration overwrites in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRecord {
    /// Agent identifier.
    pub agent_id: AgentId,
    /// Role assigned in the brief.
    pub role: String,
    /// Primary workstream.
    pub workstream: WorkstreamId,
    /// Owning plugin name.
    pub plugin_name: String,
    /// Preferred model, when the brief pins one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_preference: Option<String>,
    /// Current lifecycle status.
    pub status: AgentStatus,
    /// Registration timestamp.
    pub registered_at: Timestamp,
}
