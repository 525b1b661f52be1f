// crates/overseer-server/src/state.rs
// ============================================================================
// Module: Server Application State
// Description: Component construction and cross-component wiring.
// Purpose: Assemble the control plane and register its subscriptions.
// Dependencies: overseer-config, overseer-core, overseer-gateway,
// overseer-store-sqlite, crate modules
// ============================================================================

//! ## Overview
//! [`AppState`] holds every control-plane component behind an `Arc`.
//! Construction follows the dependency order (store, clock, queue, trust,
//! bus, ingestor, gateway, scheduler) and finishes by registering the tick
//! and bus subscriptions: trust decay, queue timeouts, periodic injection,
//! brake timers, the tool-gate status tracker, and scheduler event
//! evaluation. Slow work never runs inside a subscriber; handlers spawn.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use overseer_config::OverseerConfig;
use overseer_config::TickDriveMode;
use overseer_core::AgentBrief;
use overseer_core::AgentEvent;
use overseer_core::AgentId;
use overseer_core::AgentStatus;
use overseer_core::CalibrationProfile;
use overseer_core::ControlMode;
use overseer_core::EventKind;
use overseer_core::ProjectStore;
use overseer_core::TrustConfig;
use overseer_core::interfaces::AgentPlugin;
use overseer_core::runtime::BusFilter;
use overseer_core::runtime::ContextInjectionScheduler;
use overseer_core::runtime::DecisionQueue;
use overseer_core::runtime::EventBus;
use overseer_core::runtime::QueuePolicy;
use overseer_core::runtime::TickMode;
use overseer_core::runtime::TickService;
use overseer_core::runtime::TrustEngine;
use overseer_gateway::AdapterEventSink;
use overseer_gateway::AgentGateway;
use overseer_gateway::AgentRegistry;
use overseer_gateway::SandboxTokenIssuer;
use overseer_store_sqlite::SqliteProjectStore;
use overseer_store_sqlite::SqliteStoreConfig;
use thiserror::Error;

use crate::auth::AuthService;
use crate::brake::BrakeManager;
use crate::ingest::EventIngestor;
use crate::quarantine::QuarantineStore;
use crate::toolgate::ToolGate;
use crate::ws::WsHub;
use crate::ws::WsMessage;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Application construction errors.
///
/// # Invariants
/// - Variants are stable for startup diagnostics.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The store could not be opened.
    #[error("store initialization failed: {0}")]
    Store(String),
}

// ============================================================================
// SECTION: Control Mode Manager
// ============================================================================

/// Single owner of the global control mode.
///
/// # Invariants
/// - Reads and writes serialize through one mutex.
#[derive(Debug)]
pub struct ControlModeManager {
    /// Current mode.
    mode: Mutex<ControlMode>,
}

impl ControlModeManager {
    /// Creates a manager starting in the given mode.
    #[must_use]
    pub fn new(mode: ControlMode) -> Self {
        Self {
            mode: Mutex::new(mode),
        }
    }

    /// Returns the current mode.
    #[must_use]
    pub fn get(&self) -> ControlMode {
        match self.mode.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Replaces the current mode, returning the previous one.
    pub fn set(&self, mode: ControlMode) -> ControlMode {
        let mut guard = match self.mode.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::replace(&mut guard, mode)
    }
}

// ============================================================================
// SECTION: Token Issuer Bridge
// ============================================================================

/// Bridges the auth service into the gateway's token seam.
struct AuthTokenIssuer {
    /// Auth service issuing sandbox tokens.
    auth: Arc<AuthService>,
}

impl SandboxTokenIssuer for AuthTokenIssuer {
    fn issue(&self, agent_id: &AgentId) -> (String, i64) {
        match self.auth.issue_sandbox(agent_id) {
            Ok(issued) => issued,
            Err(error) => {
                tracing::error!(agent = %agent_id, %error, "sandbox token issuance failed");
                (String::new(), 0)
            }
        }
    }
}

// ============================================================================
// SECTION: App State
// ============================================================================

/// Fully wired control plane.
pub struct AppState {
    /// Loaded configuration.
    pub config: OverseerConfig,
    /// Knowledge store.
    pub store: Arc<dyn ProjectStore>,
    /// Event bus.
    pub bus: Arc<EventBus>,
    /// Tick service.
    pub tick: Arc<TickService>,
    /// Decision queue.
    pub queue: Arc<DecisionQueue>,
    /// Trust engine.
    pub trust: Arc<TrustEngine>,
    /// Context injection scheduler.
    pub scheduler: Arc<ContextInjectionScheduler>,
    /// Agent gateway.
    pub gateway: Arc<AgentGateway>,
    /// Event ingestion pipeline.
    pub ingestor: Arc<EventIngestor>,
    /// Dashboard hub.
    pub hub: Arc<WsHub>,
    /// Control mode owner.
    pub control: Arc<ControlModeManager>,
    /// Emergency brake manager.
    pub brake: Arc<BrakeManager>,
    /// Malformed-event pen.
    pub quarantine: Arc<QuarantineStore>,
    /// Tool gate state.
    pub toolgate: Arc<ToolGate>,
    /// Auth service.
    pub auth: Arc<AuthService>,
    /// Briefs of known agents, for patches and resumes.
    briefs: Mutex<HashMap<AgentId, AgentBrief>>,
}

/// Builds the plugin set once the ingestion sink and token issuer exist.
pub type PluginFactory = Box<
    dyn FnOnce(Arc<dyn AdapterEventSink>, Arc<dyn SandboxTokenIssuer>) -> Vec<Arc<dyn AgentPlugin>>,
>;

impl AppState {
    /// Builds and wires the control plane. Must run inside a tokio runtime;
    /// subscriptions spawn their slow work onto it.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError`] when the store cannot be opened.
    pub fn build(config: OverseerConfig, plugin_factory: PluginFactory) -> Result<Arc<Self>, BuildError> {
        let store_config = SqliteStoreConfig {
            path: config.database.path.clone(),
            read_pool_size: config.database.read_pool_size,
            ..SqliteStoreConfig::in_memory()
        };
        let store: Arc<dyn ProjectStore> = Arc::new(
            SqliteProjectStore::new(&store_config)
                .map_err(|error| BuildError::Store(error.to_string()))?,
        );

        let tick_mode = match config.tick.mode {
            TickDriveMode::Manual => TickMode::Manual,
            TickDriveMode::Timer => TickMode::Timer {
                interval_ms: config.tick.interval_ms,
            },
        };
        let tick = Arc::new(TickService::new(tick_mode));
        let queue = Arc::new(DecisionQueue::new(QueuePolicy {
            timeout_ticks: config.decisions.timeout_ticks,
        }));
        let trust = Arc::new(TrustEngine::new(TrustConfig::default()));
        if let Some(profile) = config.trust.profile.as_deref().and_then(CalibrationProfile::parse)
        {
            trust.apply_profile(profile);
        }

        let bus = Arc::new(EventBus::new());
        let hub = Arc::new(WsHub::new(256));
        let quarantine = Arc::new(QuarantineStore::new());
        let toolgate = Arc::new(ToolGate::new());
        let registry = Arc::new(AgentRegistry::new());
        let auth = Arc::new(AuthService::new(config.auth.clone()));

        let ingestor = Arc::new(EventIngestor::new(
            Arc::clone(&store),
            Arc::clone(&bus),
            Arc::clone(&queue),
            Arc::clone(&trust),
            Arc::clone(&tick),
            Arc::clone(&hub),
            Arc::clone(&quarantine),
            Arc::clone(&registry),
        ));
        let issuer: Arc<dyn SandboxTokenIssuer> = Arc::new(AuthTokenIssuer {
            auth: Arc::clone(&auth),
        });
        let sink: Arc<dyn AdapterEventSink> = Arc::clone(&ingestor) as Arc<dyn AdapterEventSink>;
        let plugins = plugin_factory(Arc::clone(&sink), issuer);
        let gateway = Arc::new(AgentGateway::new(plugins, registry, sink));
        let scheduler = Arc::new(ContextInjectionScheduler::new(
            Arc::clone(&store),
            Arc::clone(&queue),
            Arc::clone(&tick),
            Arc::clone(&gateway) as Arc<dyn overseer_core::InjectionTarget>,
        ));

        let control = Arc::new(ControlModeManager::new(config.startup_control_mode()));
        let brake = Arc::new(BrakeManager::new());

        let state = Arc::new(Self {
            config,
            store,
            bus,
            tick,
            queue,
            trust,
            scheduler,
            gateway,
            ingestor,
            hub,
            control,
            brake,
            quarantine,
            toolgate,
            auth,
            briefs: Mutex::new(HashMap::new()),
        });
        Self::wire_subscriptions(&state);
        Ok(state)
    }

    /// Registers tick and bus subscriptions. Subscriber order matters:
    /// decay, then timeouts, then periodic triggers, then brake timers, so
    /// every engine observes the same tick in a consistent sequence.
    fn wire_subscriptions(state: &Arc<Self>) {
        let runtime = tokio::runtime::Handle::current();

        let trust = Arc::clone(&state.trust);
        state.tick.subscribe(Arc::new(move |tick| trust.on_tick(tick)));

        let timeout_state = Arc::clone(state);
        let timeout_runtime = runtime.clone();
        state.tick.subscribe(Arc::new(move |tick| {
            let resolved = timeout_state.queue.on_tick(tick);
            for (event, resolution) in resolved {
                let decision_id = event.decision_id().clone();
                let agent_id = event.agent_id().clone();
                timeout_state.hub.broadcast(&WsMessage::DecisionResolved {
                    decision_id: decision_id.clone(),
                    agent_id: agent_id.clone(),
                    resolution: resolution.clone(),
                });
                let state = Arc::clone(&timeout_state);
                timeout_runtime.spawn(async move {
                    if state.gateway.registry().get(&agent_id).is_some()
                        && let Err(error) = state
                            .gateway
                            .resolve_decision(&agent_id, &decision_id, &resolution)
                            .await
                    {
                        tracing::warn!(agent = %agent_id, %error, "timeout resolution forward failed");
                    }
                    state.brake.on_decision_resolved(&state, &decision_id).await;
                });
            }
        }));

        let periodic_state = Arc::clone(state);
        let periodic_runtime = runtime.clone();
        state.tick.subscribe(Arc::new(move |tick| {
            for scheduled in periodic_state.scheduler.due_periodic(tick) {
                let state = Arc::clone(&periodic_state);
                periodic_runtime.spawn(async move {
                    state
                        .scheduler
                        .schedule_injection(&scheduled.agent_id, scheduled.reason, scheduled.priority)
                        .await;
                });
            }
        }));

        let brake_state = Arc::clone(state);
        let brake_runtime = runtime.clone();
        state.tick.subscribe(Arc::new(move |tick| {
            let state = Arc::clone(&brake_state);
            brake_runtime.spawn(async move {
                state.brake.on_tick(&state, tick).await;
            });
        }));

        let tracker_gate = Arc::clone(&state.toolgate);
        state.bus.subscribe(
            BusFilter::kinds([EventKind::Status]),
            Arc::new(move |envelope| {
                if let AgentEvent::Status {
                    message,
                } = &envelope.event
                {
                    tracker_gate.record_status(&envelope.agent_id, message);
                }
            }),
        );

        let eval_state = Arc::clone(state);
        state.bus.subscribe(
            BusFilter::all(),
            Arc::new(move |envelope| {
                // Evaluation reads the store; defer it off the publisher.
                let state = Arc::clone(&eval_state);
                let envelope = envelope.clone();
                runtime.spawn(async move {
                    for scheduled in state.scheduler.evaluate_event(&envelope) {
                        state
                            .scheduler
                            .schedule_injection(
                                &scheduled.agent_id,
                                scheduled.reason,
                                scheduled.priority,
                            )
                            .await;
                    }
                });
            }),
        );

        let exit_state = Arc::clone(state);
        state.gateway.on_exit(Arc::new(move |agent_id| {
            let Some(handle) = exit_state.gateway.registry().get(agent_id) else {
                return;
            };
            if handle.status != AgentStatus::Running {
                return;
            }
            tracing::warn!(agent = %agent_id, "adapter exited while running; orphaning decisions");
            exit_state.gateway.registry().set_status(agent_id, AgentStatus::Error);
            if let Err(error) = exit_state.store.update_agent_status(agent_id, AgentStatus::Error)
            {
                tracing::warn!(agent = %agent_id, %error, "exit status persistence failed");
            }
            exit_state.queue.handle_agent_killed(agent_id);
        }));
    }

    // ------------------------------------------------------------------
    // Brief registry
    // ------------------------------------------------------------------

    /// Records the brief for an agent.
    pub fn remember_brief(&self, brief: AgentBrief) {
        let mut briefs = match self.briefs.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        briefs.insert(brief.agent_id.clone(), brief);
    }

    /// Returns the recorded brief for an agent.
    #[must_use]
    pub fn brief(&self, agent_id: &AgentId) -> Option<AgentBrief> {
        let briefs = match self.briefs.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        briefs.get(agent_id).cloned()
    }

    /// Builds the `state_sync` broadcast payload.
    pub fn broadcast_state_sync(&self) {
        let pending = overseer_core::runtime::pending_summaries(&self.queue);
        let snapshot = match self.store.snapshot(&pending) {
            Ok(snapshot) => snapshot,
            Err(error) => {
                tracing::warn!(%error, "state_sync snapshot failed");
                return;
            }
        };
        let project_config = self.store.project_config().ok().flatten();
        self.hub.broadcast(&WsMessage::StateSync {
            snapshot,
            active_agents: self.gateway.registry().list(),
            trust_scores: self.trust.all_scores(),
            control_mode: self.control.get(),
            project_config,
        });
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}
