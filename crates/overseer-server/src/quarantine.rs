// crates/overseer-server/src/quarantine.rs
// ============================================================================
// Module: Server Event Quarantine
// Description: Holding pen for malformed or out-of-order adapter events.
// Purpose: Keep bad events off the bus while preserving them for triage.
// Dependencies: overseer-core, serde, serde_json
// ============================================================================

//! ## Overview
//! Malformed ingested events never reach the bus; they land here with the
//! reason they were rejected (schema failure, sequence regression, storage
//! rejection). Operators inspect the pen through `GET /api/quarantine` and
//! purge it with `DELETE /api/quarantine`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Mutex;

use overseer_core::AgentId;
use overseer_core::Timestamp;
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: Entries
// ============================================================================

/// One quarantined event.
///
/// # Invariants
/// - `payload` is the raw event as received, untouched.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuarantinedEvent {
    /// Entry identifier (monotonic within the pen).
    pub quarantine_id: u64,
    /// Agent the event claimed to come from, when attributable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<AgentId>,
    /// Why the event was quarantined.
    pub reason: String,
    /// Raw payload as received.
    pub payload: Value,
    /// Receipt timestamp.
    pub received_at: Timestamp,
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// In-memory quarantine pen.
///
/// # Invariants
/// - Entry ids are unique for the process lifetime.
#[derive(Debug, Default)]
pub struct QuarantineStore {
    /// Entries and the next id, guarded together.
    inner: Mutex<(Vec<QuarantinedEvent>, u64)>,
}

impl QuarantineStore {
    /// Creates an empty pen.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the pen, recovering from poisoning.
    fn lock(&self) -> std::sync::MutexGuard<'_, (Vec<QuarantinedEvent>, u64)> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Quarantines a payload with a reason.
    pub fn quarantine(&self, agent_id: Option<AgentId>, reason: impl Into<String>, payload: Value) {
        let mut inner = self.lock();
        inner.1 += 1;
        let entry = QuarantinedEvent {
            quarantine_id: inner.1,
            agent_id,
            reason: reason.into(),
            payload,
            received_at: Timestamp::now(),
        };
        inner.0.push(entry);
    }

    /// Lists every quarantined entry.
    #[must_use]
    pub fn list(&self) -> Vec<QuarantinedEvent> {
        self.lock().0.clone()
    }

    /// Purges the pen, returning the number of removed entries.
    pub fn purge(&self) -> usize {
        let mut inner = self.lock();
        let removed = inner.0.len();
        inner.0.clear();
        removed
    }
}
