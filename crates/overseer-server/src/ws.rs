// crates/overseer-server/src/ws.rs
// ============================================================================
// Module: Server WebSocket Hub
// Description: Outbound dashboard messages and the broadcast hub.
// Purpose: Push events, state syncs, and resolution notices to clients.
// Dependencies: overseer-core, serde, serde_json, tokio, tracing
// ============================================================================

//! ## Overview
//! The hub fans serialized [`WsMessage`] frames out to every connected
//! dashboard over a broadcast channel. The channel sends no error frames;
//! clients detect failure through HTTP responses and reconnection. Event
//! frames carry a workspace classification (primary + secondary
//! workstreams) so dashboards can route them without re-deriving ownership.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use overseer_core::AgentEvent;
use overseer_core::AgentHandle;
use overseer_core::AgentId;
use overseer_core::ControlMode;
use overseer_core::DecisionId;
use overseer_core::DecisionResolution;
use overseer_core::EventEnvelope;
use overseer_core::KnowledgeSnapshot;
use overseer_core::ProjectConfig;
use overseer_core::ProjectStore;
use overseer_core::TrustConfig;
use overseer_core::WorkstreamId;
use serde::Serialize;
use tokio::sync::broadcast;

// ============================================================================
// SECTION: Messages
// ============================================================================

/// Workspace routing computed for an event frame.
///
/// # Invariants
/// - `secondary` never repeats `primary`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceClassification {
    /// Primary workstream, when attributable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary: Option<WorkstreamId>,
    /// Additional affected workstreams.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub secondary: Vec<WorkstreamId>,
}

/// Outbound WebSocket message union.
///
/// # Invariants
/// - Variants are stable for dashboard consumption.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    /// Ingested event with workspace classification.
    Event {
        /// The ingested envelope.
        envelope: EventEnvelope,
        /// Workspace routing.
        workspace: WorkspaceClassification,
    },
    /// Full state synchronization.
    #[serde(rename_all = "camelCase")]
    StateSync {
        /// Knowledge snapshot.
        snapshot: KnowledgeSnapshot,
        /// Live agent handles.
        active_agents: Vec<AgentHandle>,
        /// Global trust scores.
        trust_scores: BTreeMap<AgentId, i64>,
        /// Current control mode.
        control_mode: ControlMode,
        /// Project configuration, when seeded.
        #[serde(skip_serializing_if = "Option::is_none")]
        project_config: Option<ProjectConfig>,
    },
    /// Emergency brake engaged or released.
    #[serde(rename_all = "camelCase")]
    Brake {
        /// Whether the brake is now engaged.
        engaged: bool,
        /// Scope label.
        scope: String,
        /// Behavior label (`pause` or `kill`).
        behavior: String,
        /// Agents the brake touched.
        affected_agents: Vec<AgentId>,
    },
    /// Trust score changed.
    #[serde(rename_all = "camelCase")]
    TrustUpdate {
        /// Agent whose score changed.
        agent_id: AgentId,
        /// Effective delta applied.
        delta: i64,
        /// New global score.
        score: i64,
        /// Outcome label that caused the change.
        #[serde(skip_serializing_if = "Option::is_none")]
        outcome: Option<String>,
    },
    /// A decision reached a terminal state.
    #[serde(rename_all = "camelCase")]
    DecisionResolved {
        /// Decision identifier.
        decision_id: DecisionId,
        /// Owning agent.
        agent_id: AgentId,
        /// Attached resolution.
        resolution: DecisionResolution,
    },
    /// Trust configuration changed.
    #[serde(rename_all = "camelCase")]
    TrustConfigUpdate {
        /// Active configuration.
        config: TrustConfig,
    },
}

// ============================================================================
// SECTION: Hub
// ============================================================================

/// Broadcast hub for dashboard connections.
///
/// # Invariants
/// - Frames are serialized once and shared across receivers.
#[derive(Debug)]
pub struct WsHub {
    /// Broadcast sender; receivers are per-connection.
    sender: broadcast::Sender<String>,
}

impl WsHub {
    /// Creates a hub with the given backlog capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
        }
    }

    /// Subscribes a new connection.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.sender.subscribe()
    }

    /// Broadcasts a message to every connection. Messages with no
    /// listeners are dropped silently.
    pub fn broadcast(&self, message: &WsMessage) {
        match serde_json::to_string(message) {
            Ok(frame) => {
                let _ = self.sender.send(frame);
            }
            Err(error) => {
                tracing::error!(%error, "failed to serialize ws message");
            }
        }
    }
}

// ============================================================================
// SECTION: Event Classification
// ============================================================================

/// Computes workspace routing for an envelope: artifacts route to their
/// workstream, coherence issues to every affected workstream, everything
/// else to the source agent's workstream.
#[must_use]
pub fn classify_event(
    envelope: &EventEnvelope,
    store: &dyn ProjectStore,
) -> WorkspaceClassification {
    match &envelope.event {
        AgentEvent::Artifact {
            artifact, ..
        } => WorkspaceClassification {
            primary: Some(artifact.workstream.clone()),
            secondary: Vec::new(),
        },
        AgentEvent::Coherence {
            issue,
        } => {
            let mut affected = issue.affected_workstreams.clone();
            let primary = if affected.is_empty() { None } else { Some(affected.remove(0)) };
            WorkspaceClassification {
                primary,
                secondary: affected,
            }
        }
        _ => WorkspaceClassification {
            primary: store
                .get_agent(&envelope.agent_id)
                .ok()
                .flatten()
                .map(|record| record.workstream),
            secondary: Vec::new(),
        },
    }
}
