// crates/overseer-core/src/core/checkpoint.rs
// ============================================================================
// Module: Overseer Checkpoints
// Description: Serialized agent state and durable checkpoint records.
// Purpose: Model pause/kill/crash state capture with bounded retention.
// Dependencies: serde, serde_json, crate::core::{brief, identifiers, time}
// ============================================================================

//! ## Overview
//! A checkpoint captures everything needed to resume an agent: the
//! provider-specific serialized state, a brief snapshot, the last processed
//! event sequence, and the pending decisions attributed to the agent. The
//! store retains the newest N checkpoints per agent (default 3) and prunes
//! the rest.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::brief::AgentBrief;
use crate::core::identifiers::AgentId;
use crate::core::identifiers::CheckpointId;
use crate::core::identifiers::DecisionId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Serialization Cause
// ============================================================================

/// Why an agent's state was serialized.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SerializedBy {
    /// Operator-initiated pause.
    Pause,
    /// Grace window of a kill.
    KillGrace,
    /// Recovery after an adapter crash.
    CrashRecovery,
    /// Snapshot taken while a decision blocks the agent.
    DecisionCheckpoint,
}

impl SerializedBy {
    /// Returns a stable label for the cause.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pause => "pause",
            Self::KillGrace => "kill_grace",
            Self::CrashRecovery => "crash_recovery",
            Self::DecisionCheckpoint => "decision_checkpoint",
        }
    }
}

// ============================================================================
// SECTION: Serialized State
// ============================================================================

/// Serialized agent state returned by adapters.
///
/// # Invariants
/// - `checkpoint` is opaque to the control plane; only the owning plugin
///   interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedAgentState {
    /// Agent identifier.
    pub agent_id: AgentId,
    /// Provider-specific checkpoint payload.
    pub checkpoint: Value,
    /// Brief snapshot at serialization time.
    pub brief: AgentBrief,
    /// Last event sequence the adapter emitted.
    pub last_sequence: u64,
    /// Decisions pending for the agent at serialization time.
    #[serde(default)]
    pub pending_decision_ids: Vec<DecisionId>,
    /// Why the state was serialized.
    pub serialized_by: SerializedBy,
    /// Serialization timestamp.
    pub serialized_at: Timestamp,
}

// ============================================================================
// SECTION: Checkpoint Record
// ============================================================================

/// Durable checkpoint row.
///
/// # Invariants
/// - At most `max_per_agent` rows per agent survive pruning, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    /// Checkpoint identifier.
    pub checkpoint_id: CheckpointId,
    /// Agent the checkpoint belongs to.
    pub agent_id: AgentId,
    /// Serialized state payload.
    pub state: SerializedAgentState,
    /// Decision associated with the capture, when any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_id: Option<DecisionId>,
    /// Creation timestamp.
    pub created_at: Timestamp,
}

/// Default checkpoint retention per agent.
pub const DEFAULT_CHECKPOINTS_PER_AGENT: usize = 3;
