// crates/overseer-gateway/src/gateway.rs
// ============================================================================
// Module: Agent Gateway
// Description: Lifecycle facade over plugins, handles, and lifecycle events.
// Purpose: Route spawn/pause/resume/kill/inject through the owning plugin.
// Dependencies: async-trait, overseer-core, uuid, crate::registry
// ============================================================================

//! ## Overview
//! The gateway is the single entry point for agent lifecycle operations. It
//! resolves the owning plugin, keeps the handle registry consistent, emits
//! synthetic lifecycle events (`paused`, `resumed`, `killed`) into the event
//! sink, and notifies exit listeners when adapters terminate. It also
//! implements [`InjectionTarget`] so the scheduler can deliver context
//! without knowing about plugins.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use overseer_core::AdapterEvent;
use overseer_core::AgentBrief;
use overseer_core::AgentEvent;
use overseer_core::AgentHandle;
use overseer_core::AgentId;
use overseer_core::AgentStatus;
use overseer_core::BriefPatch;
use overseer_core::ContextInjection;
use overseer_core::DecisionId;
use overseer_core::DecisionResolution;
use overseer_core::InjectionTarget;
use overseer_core::KillOptions;
use overseer_core::KillOutcome;
use overseer_core::LifecyclePhase;
use overseer_core::PluginError;
use overseer_core::RunId;
use overseer_core::SerializedAgentState;
use overseer_core::SourceEventId;
use overseer_core::Timestamp;
use overseer_core::interfaces::AgentPlugin;
use thiserror::Error;
use uuid::Uuid;

use crate::registry::AgentRegistry;
use crate::sink::AdapterEventSink;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Gateway errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling; the HTTP layer maps
///   them onto status codes.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Unknown agent.
    #[error("unknown agent: {0}")]
    UnknownAgent(String),
    /// Unknown plugin.
    #[error("unknown plugin: {0}")]
    UnknownPlugin(String),
    /// Operation conflicts with the agent's lifecycle state.
    #[error("lifecycle conflict: {0}")]
    Lifecycle(String),
    /// Plugin does not support the requested operation.
    #[error("plugin does not support {0}")]
    Unsupported(&'static str),
    /// Plugin operation failed.
    #[error("plugin failure: {0}")]
    Plugin(#[from] PluginError),
}

// ============================================================================
// SECTION: Exit Listeners
// ============================================================================

/// Callback invoked when an adapter process or container exits.
pub type ExitListener = Arc<dyn Fn(&AgentId) + Send + Sync>;

// ============================================================================
// SECTION: Gateway
// ============================================================================

/// Lifecycle facade over registered plugins.
///
/// # Invariants
/// - The registry is updated in the same call as the plugin operation that
///   justified the change.
pub struct AgentGateway {
    /// Registered plugins keyed by name.
    plugins: HashMap<String, Arc<dyn AgentPlugin>>,
    /// Handle registry.
    registry: Arc<AgentRegistry>,
    /// Event sink receiving synthetic lifecycle events.
    sink: Arc<dyn AdapterEventSink>,
    /// Exit listeners.
    exit_listeners: Mutex<Vec<ExitListener>>,
    /// Sequence counter for synthetic control-plane events.
    control_sequence: AtomicU64,
}

impl AgentGateway {
    /// Creates a gateway over the given plugins.
    #[must_use]
    pub fn new(
        plugins: Vec<Arc<dyn AgentPlugin>>,
        registry: Arc<AgentRegistry>,
        sink: Arc<dyn AdapterEventSink>,
    ) -> Self {
        let plugins =
            plugins.into_iter().map(|plugin| (plugin.name().to_string(), plugin)).collect();
        Self {
            plugins,
            registry,
            sink,
            exit_listeners: Mutex::new(Vec::new()),
            control_sequence: AtomicU64::new(1),
        }
    }

    /// Returns the handle registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    /// Registers an exit listener.
    pub fn on_exit(&self, listener: ExitListener) {
        let mut listeners = match self.exit_listeners.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        listeners.push(listener);
    }

    /// Notifies exit listeners that an adapter terminated. Transport
    /// implementations call this from their exit watchers.
    pub fn notify_exit(&self, agent_id: &AgentId) {
        let listeners: Vec<ExitListener> = {
            let guard = match self.exit_listeners.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard.clone()
        };
        for listener in listeners {
            listener(agent_id);
        }
    }

    /// Resolves a plugin by name.
    fn plugin(&self, name: &str) -> Result<&Arc<dyn AgentPlugin>, GatewayError> {
        self.plugins.get(name).ok_or_else(|| GatewayError::UnknownPlugin(name.to_string()))
    }

    /// Resolves an agent's handle and owning plugin.
    fn handle_and_plugin(
        &self,
        agent_id: &AgentId,
    ) -> Result<(AgentHandle, &Arc<dyn AgentPlugin>), GatewayError> {
        let handle = self
            .registry
            .get(agent_id)
            .ok_or_else(|| GatewayError::UnknownAgent(agent_id.to_string()))?;
        let plugin = self.plugin(&handle.plugin_name)?;
        Ok((handle, plugin))
    }

    /// Emits a synthetic control-plane lifecycle event for an agent.
    fn emit_lifecycle(&self, agent_id: &AgentId, phase: LifecyclePhase) {
        let sequence = self.control_sequence.fetch_add(1, Ordering::Relaxed);
        let event = AdapterEvent {
            source_event_id: SourceEventId::new(format!("gw-{}", Uuid::new_v4())),
            source_sequence: sequence,
            source_occurred_at: Timestamp::now(),
            run_id: RunId::new("control-plane"),
            event: AgentEvent::Lifecycle {
                phase,
            },
        };
        self.sink.ingest(agent_id, event);
    }

    // ------------------------------------------------------------------
    // Lifecycle operations
    // ------------------------------------------------------------------

    /// Spawns an agent via the named plugin and registers its handle.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when the plugin is unknown or spawn fails.
    pub async fn spawn(
        &self,
        plugin_name: &str,
        brief: &AgentBrief,
    ) -> Result<AgentHandle, GatewayError> {
        let plugin = self.plugin(plugin_name)?;
        let handle = plugin.spawn(brief).await?;
        self.registry.insert(handle.clone());
        self.emit_lifecycle(&handle.agent_id, LifecyclePhase::Spawned);
        Ok(handle)
    }

    /// Pauses a running agent, returning its serialized state.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Lifecycle`] when the agent is not running,
    /// [`GatewayError::Unsupported`] when the plugin cannot pause, or the
    /// plugin failure otherwise.
    pub async fn pause(&self, agent_id: &AgentId) -> Result<SerializedAgentState, GatewayError> {
        let (handle, plugin) = self.handle_and_plugin(agent_id)?;
        if handle.status != AgentStatus::Running {
            return Err(GatewayError::Lifecycle(format!(
                "agent {agent_id} is {}, not running",
                handle.status.as_str()
            )));
        }
        if !plugin.capabilities().can_pause {
            return Err(GatewayError::Unsupported("pause"));
        }
        let state = plugin.pause(&handle).await?;
        self.registry.set_status(agent_id, AgentStatus::Paused);
        self.emit_lifecycle(agent_id, LifecyclePhase::Paused);
        Ok(state)
    }

    /// Resumes an agent from serialized state.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when the owning plugin is unknown, cannot
    /// resume, or the resume fails.
    pub async fn resume(
        &self,
        plugin_name: &str,
        state: &SerializedAgentState,
    ) -> Result<AgentHandle, GatewayError> {
        let plugin = self.plugin(plugin_name)?;
        if !plugin.capabilities().can_resume {
            return Err(GatewayError::Unsupported("resume"));
        }
        let handle = plugin.resume(state).await?;
        self.registry.insert(handle.clone());
        self.emit_lifecycle(&handle.agent_id, LifecyclePhase::Resumed);
        Ok(handle)
    }

    /// Kills an agent and marks its handle completed.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when the agent is unknown or teardown fails
    /// outright.
    pub async fn kill(
        &self,
        agent_id: &AgentId,
        options: &KillOptions,
    ) -> Result<KillOutcome, GatewayError> {
        let (handle, plugin) = self.handle_and_plugin(agent_id)?;
        let outcome = plugin.kill(&handle, options).await?;
        self.registry.set_status(agent_id, AgentStatus::Completed);
        self.emit_lifecycle(agent_id, LifecyclePhase::Killed);
        Ok(outcome)
    }

    /// Forwards a decision resolution to the originating agent.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when the agent is unknown or delivery fails;
    /// callers on the resolution path treat failures as best-effort.
    pub async fn resolve_decision(
        &self,
        agent_id: &AgentId,
        decision_id: &DecisionId,
        resolution: &DecisionResolution,
    ) -> Result<(), GatewayError> {
        let (handle, plugin) = self.handle_and_plugin(agent_id)?;
        plugin.resolve_decision(&handle, decision_id, resolution).await?;
        Ok(())
    }

    /// Applies a partial brief update.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when the agent is unknown, the plugin cannot
    /// update briefs, or delivery fails.
    pub async fn update_brief(
        &self,
        agent_id: &AgentId,
        patch: &BriefPatch,
    ) -> Result<(), GatewayError> {
        let (handle, plugin) = self.handle_and_plugin(agent_id)?;
        if !plugin.capabilities().can_update_brief {
            return Err(GatewayError::Unsupported("update_brief"));
        }
        plugin.update_brief(&handle, patch).await?;
        Ok(())
    }

    /// Requests an on-demand checkpoint.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] when the agent is unknown, the plugin cannot
    /// checkpoint, or serialization fails.
    pub async fn request_checkpoint(
        &self,
        agent_id: &AgentId,
        decision_id: Option<&DecisionId>,
    ) -> Result<SerializedAgentState, GatewayError> {
        let (handle, plugin) = self.handle_and_plugin(agent_id)?;
        if !plugin.capabilities().can_checkpoint {
            return Err(GatewayError::Unsupported("checkpoint"));
        }
        let state = plugin.request_checkpoint(&handle, decision_id).await?;
        Ok(state)
    }
}

impl std::fmt::Debug for AgentGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentGateway")
            .field("plugins", &self.plugins.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// SECTION: Injection Target
// ============================================================================

#[async_trait]
impl InjectionTarget for AgentGateway {
    fn handle(&self, agent_id: &AgentId) -> Option<AgentHandle> {
        self.registry.get(agent_id)
    }

    async fn inject(
        &self,
        handle: &AgentHandle,
        injection: &ContextInjection,
    ) -> Result<(), PluginError> {
        let plugin = self
            .plugins
            .get(&handle.plugin_name)
            .ok_or_else(|| PluginError::NotFound(handle.plugin_name.clone()))?;
        plugin.inject_context(handle, injection).await
    }
}
