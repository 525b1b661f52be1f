// crates/overseer-gateway/src/registry.rs
// ============================================================================
// Module: Gateway Agent Registry
// Description: Runtime handle registry for live agents.
// Purpose: Own every AgentHandle; mutate status only via gateway operations.
// Dependencies: overseer-core
// ============================================================================

//! ## Overview
//! The registry owns one handle per live agent. Handles enter on spawn or
//! resume and stay until removal; status changes flow exclusively through
//! the gateway's lifecycle operations so observers always see a consistent
//! view.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Mutex;

use overseer_core::AgentHandle;
use overseer_core::AgentId;
use overseer_core::AgentStatus;

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Runtime handle registry.
///
/// # Invariants
/// - At most one handle per agent id.
#[derive(Debug, Default)]
pub struct AgentRegistry {
    /// Handles keyed by agent id.
    handles: Mutex<HashMap<AgentId, AgentHandle>>,
}

impl AgentRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the handle map, recovering from poisoning.
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<AgentId, AgentHandle>> {
        match self.handles.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Inserts (or replaces) a handle.
    pub fn insert(&self, handle: AgentHandle) {
        self.lock().insert(handle.agent_id.clone(), handle);
    }

    /// Returns the handle for an agent.
    #[must_use]
    pub fn get(&self, agent_id: &AgentId) -> Option<AgentHandle> {
        self.lock().get(agent_id).cloned()
    }

    /// Lists every handle.
    #[must_use]
    pub fn list(&self) -> Vec<AgentHandle> {
        let mut handles: Vec<AgentHandle> = self.lock().values().cloned().collect();
        handles.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        handles
    }

    /// Updates a handle's status. Returns false when the agent is unknown.
    pub fn set_status(&self, agent_id: &AgentId, status: AgentStatus) -> bool {
        self.lock().get_mut(agent_id).map(|handle| handle.status = status).is_some()
    }

    /// Removes a handle, returning it.
    pub fn remove(&self, agent_id: &AgentId) -> Option<AgentHandle> {
        self.lock().remove(agent_id)
    }
}
