// crates/overseer-core/src/core/audit.rs
// ============================================================================
// Module: Overseer Audit Log
// Description: Append-only audit entries for store mutations and trust outcomes.
// Purpose: Model the audit trail recorded alongside every governed mutation.
// Dependencies: serde, serde_json, crate::core::{identifiers, time}
// ============================================================================

//! ## Overview
//! Every governed mutation appends an audit entry: the entity touched, the
//! action taken, the calling agent when one is attributable, and optional
//! structured details. The log is append-only; nothing edits or deletes
//! entries.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::AgentId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Audit Entry
// ============================================================================

/// Append-only audit log entry.
///
/// # Invariants
/// - Entries are immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    /// Entity type label (e.g. `artifact`, `trust`, `coherence`).
    pub entity_type: String,
    /// Entity identifier.
    pub entity_id: String,
    /// Action label (e.g. `create`, `update`, `trust_outcome`).
    pub action: String,
    /// Calling agent, when attributable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caller_agent_id: Option<AgentId>,
    /// Entry timestamp.
    pub timestamp: Timestamp,
    /// Optional structured details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl AuditLogEntry {
    /// Builds an entry with the current wall clock.
    #[must_use]
    pub fn now(
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        action: impl Into<String>,
        caller_agent_id: Option<AgentId>,
        details: Option<Value>,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            action: action.into(),
            caller_agent_id,
            timestamp: Timestamp::now(),
            details,
        }
    }
}
