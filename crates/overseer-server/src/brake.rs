// crates/overseer-server/src/brake.rs
// ============================================================================
// Module: Server Emergency Brake
// Description: Scoped pause/kill with manual, timer, or decision release.
// Purpose: Stop agents fast without losing their state or decisions.
// Dependencies: overseer-core, serde, uuid, crate::{state, ws}
// ============================================================================

//! ## Overview
//! A brake order names a scope (everything, one agent, or one workstream)
//! and a behavior. **Pause** serializes each affected agent through its
//! plugin, stores a checkpoint, and suspends its pending decisions
//! (reversible). **Kill** tears the agents down and routes their pending
//! decisions to triage (not reversible). Releases happen manually, after a
//! tick timer, or when a named decision resolves; released pause-brakes
//! resume agents from their latest checkpoints.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;

use overseer_core::AgentId;
use overseer_core::AgentStatus;
use overseer_core::DEFAULT_CHECKPOINTS_PER_AGENT;
use overseer_core::DecisionId;
use overseer_core::KillOptions;
use overseer_core::Tick;
use overseer_core::WorkstreamId;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::state::AppState;
use crate::ws::WsMessage;

// ============================================================================
// SECTION: Orders
// ============================================================================

/// Brake scope selector.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BrakeScope {
    /// Every running agent.
    All,
    /// One agent.
    Agent {
        /// Target agent.
        agent_id: AgentId,
    },
    /// Every running agent in one workstream.
    Workstream {
        /// Target workstream.
        workstream_id: WorkstreamId,
    },
}

impl BrakeScope {
    /// Returns a stable label for broadcasts.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Agent {
                ..
            } => "agent",
            Self::Workstream {
                ..
            } => "workstream",
        }
    }
}

/// Brake behavior.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrakeBehavior {
    /// Serialize and suspend (reversible).
    Pause,
    /// Tear down and triage (not reversible).
    Kill,
}

impl BrakeBehavior {
    /// Returns a stable label for broadcasts.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pause => "pause",
            Self::Kill => "kill",
        }
    }
}

/// Release condition for an engaged brake.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReleaseCondition {
    /// Release only via the release endpoint.
    #[default]
    Manual,
    /// Release after a number of ticks.
    Timer {
        /// Ticks until automatic release.
        ticks: u64,
    },
    /// Release when a decision resolves.
    Decision {
        /// Gating decision.
        decision_id: DecisionId,
    },
}

/// An engaged brake order.
///
/// # Invariants
/// - `affected` lists the agents the brake actually touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrakeOrder {
    /// Order identifier.
    pub brake_id: String,
    /// Scope.
    pub scope: BrakeScope,
    /// Behavior.
    pub behavior: BrakeBehavior,
    /// Release condition.
    pub release_condition: ReleaseCondition,
    /// Tick at engagement.
    pub engaged_at_tick: Tick,
    /// Agents the brake touched.
    pub affected: Vec<AgentId>,
}

// ============================================================================
// SECTION: Manager
// ============================================================================

/// Emergency brake manager.
///
/// # Invariants
/// - An agent affected by any active order reads as braked.
#[derive(Debug, Default)]
pub struct BrakeManager {
    /// Active orders.
    orders: Mutex<Vec<BrakeOrder>>,
}

impl BrakeManager {
    /// Creates a manager with no active orders.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the order list, recovering from poisoning.
    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<BrakeOrder>> {
        match self.orders.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Lists active orders.
    #[must_use]
    pub fn active(&self) -> Vec<BrakeOrder> {
        self.lock().clone()
    }

    /// Returns true when any active order affects the agent.
    #[must_use]
    pub fn is_braked(&self, agent_id: &AgentId) -> bool {
        self.lock().iter().any(|order| order.affected.contains(agent_id))
    }

    /// Engages a brake: stops the agents in scope and records the order.
    pub async fn engage(
        &self,
        state: &Arc<AppState>,
        scope: BrakeScope,
        behavior: BrakeBehavior,
        release_condition: ReleaseCondition,
    ) -> BrakeOrder {
        let targets: Vec<AgentId> = state
            .gateway
            .registry()
            .list()
            .into_iter()
            .filter(|handle| handle.status == AgentStatus::Running)
            .filter(|handle| match &scope {
                BrakeScope::All => true,
                BrakeScope::Agent {
                    agent_id,
                } => handle.agent_id == *agent_id,
                BrakeScope::Workstream {
                    workstream_id,
                } => state
                    .store
                    .get_agent(&handle.agent_id)
                    .ok()
                    .flatten()
                    .is_some_and(|record| record.workstream == *workstream_id),
            })
            .map(|handle| handle.agent_id)
            .collect();

        let mut affected = Vec::new();
        for agent_id in targets {
            let stopped = match behavior {
                BrakeBehavior::Pause => Self::pause_agent(state, &agent_id).await,
                BrakeBehavior::Kill => Self::kill_agent(state, &agent_id).await,
            };
            if stopped {
                affected.push(agent_id);
            }
        }

        let order = BrakeOrder {
            brake_id: format!("brake-{}", Uuid::new_v4()),
            scope,
            behavior,
            release_condition,
            engaged_at_tick: state.tick.current(),
            affected,
        };
        self.lock().push(order.clone());
        state.hub.broadcast(&WsMessage::Brake {
            engaged: true,
            scope: order.scope.label().to_string(),
            behavior: order.behavior.label().to_string(),
            affected_agents: order.affected.clone(),
        });
        order
    }

    /// Pauses one agent: suspend decisions, serialize, checkpoint.
    async fn pause_agent(state: &Arc<AppState>, agent_id: &AgentId) -> bool {
        state.queue.suspend_agent_decisions(agent_id);
        match state.gateway.pause(agent_id).await {
            Ok(serialized) => {
                if let Err(error) = state.store.store_checkpoint(
                    &serialized,
                    None,
                    DEFAULT_CHECKPOINTS_PER_AGENT,
                ) {
                    tracing::warn!(agent = %agent_id, %error, "brake checkpoint failed");
                }
                if let Err(error) =
                    state.store.update_agent_status(agent_id, AgentStatus::Paused)
                {
                    tracing::warn!(agent = %agent_id, %error, "brake status persistence failed");
                }
                true
            }
            Err(error) => {
                tracing::error!(agent = %agent_id, %error, "brake pause failed");
                // Leave decisions pending; a half-engaged pause must not
                // strand them in suspended.
                state.queue.resume_agent_decisions(agent_id);
                false
            }
        }
    }

    /// Kills one agent: tear down, triage decisions, persist state capture.
    async fn kill_agent(state: &Arc<AppState>, agent_id: &AgentId) -> bool {
        let options = KillOptions {
            grace: true,
            grace_timeout_ms: Some(state.config.gateway.kill_grace_ms),
        };
        match state.gateway.kill(agent_id, &options).await {
            Ok(outcome) => {
                if let Some(serialized) = outcome.state
                    && let Err(error) = state.store.store_checkpoint(
                        &serialized,
                        None,
                        DEFAULT_CHECKPOINTS_PER_AGENT,
                    )
                {
                    tracing::warn!(agent = %agent_id, %error, "kill checkpoint failed");
                }
                state.queue.handle_agent_killed(agent_id);
                if let Err(error) =
                    state.store.update_agent_status(agent_id, AgentStatus::Completed)
                {
                    tracing::warn!(agent = %agent_id, %error, "kill status persistence failed");
                }
                true
            }
            Err(error) => {
                tracing::error!(agent = %agent_id, %error, "brake kill failed");
                false
            }
        }
    }

    /// Releases matching orders (all of them when `brake_id` is `None`).
    /// Pause-brakes resume their agents from the latest checkpoint.
    pub async fn release(&self, state: &Arc<AppState>, brake_id: Option<&str>) -> Vec<BrakeOrder> {
        let released: Vec<BrakeOrder> = {
            let mut orders = self.lock();
            let (matching, remaining): (Vec<_>, Vec<_>) = orders
                .drain(..)
                .partition(|order| brake_id.is_none_or(|wanted| order.brake_id == wanted));
            *orders = remaining;
            matching
        };
        for order in &released {
            if order.behavior == BrakeBehavior::Pause {
                for agent_id in &order.affected {
                    Self::resume_agent(state, agent_id).await;
                }
            }
            state.hub.broadcast(&WsMessage::Brake {
                engaged: false,
                scope: order.scope.label().to_string(),
                behavior: order.behavior.label().to_string(),
                affected_agents: order.affected.clone(),
            });
        }
        released
    }

    /// Resumes one paused agent from its latest checkpoint.
    async fn resume_agent(state: &Arc<AppState>, agent_id: &AgentId) {
        let checkpoint = match state.store.latest_checkpoint(agent_id) {
            Ok(Some(checkpoint)) => checkpoint,
            Ok(None) => {
                tracing::warn!(agent = %agent_id, "no checkpoint to resume from after brake");
                return;
            }
            Err(error) => {
                tracing::error!(agent = %agent_id, %error, "checkpoint lookup failed");
                return;
            }
        };
        let plugin_name = state
            .store
            .get_agent(agent_id)
            .ok()
            .flatten()
            .map_or_else(String::new, |record| record.plugin_name);
        match state.gateway.resume(&plugin_name, &checkpoint.state).await {
            Ok(_) => {
                state.queue.resume_agent_decisions(agent_id);
                if let Err(error) =
                    state.store.update_agent_status(agent_id, AgentStatus::Running)
                {
                    tracing::warn!(agent = %agent_id, %error, "resume status persistence failed");
                }
            }
            Err(error) => {
                tracing::error!(agent = %agent_id, %error, "brake release resume failed");
            }
        }
    }

    /// Tick hook: releases timer-gated orders whose window elapsed.
    pub async fn on_tick(&self, state: &Arc<AppState>, tick: Tick) {
        let due: Vec<String> = self
            .lock()
            .iter()
            .filter(|order| match &order.release_condition {
                ReleaseCondition::Timer {
                    ticks,
                } => tick.since(order.engaged_at_tick) >= *ticks,
                _ => false,
            })
            .map(|order| order.brake_id.clone())
            .collect();
        for brake_id in due {
            self.release(state, Some(&brake_id)).await;
        }
    }

    /// Resolution hook: releases decision-gated orders.
    pub async fn on_decision_resolved(&self, state: &Arc<AppState>, decision_id: &DecisionId) {
        let due: Vec<String> = self
            .lock()
            .iter()
            .filter(|order| {
                matches!(
                    &order.release_condition,
                    ReleaseCondition::Decision { decision_id: gated } if gated == decision_id
                )
            })
            .map(|order| order.brake_id.clone())
            .collect();
        for brake_id in due {
            self.release(state, Some(&brake_id)).await;
        }
    }
}
