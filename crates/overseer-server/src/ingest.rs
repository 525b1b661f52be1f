// crates/overseer-server/src/ingest.rs
// ============================================================================
// Module: Server Event Ingestion
// Description: Validation, sequencing, persistence, and fan-out of events.
// Purpose: One pipeline from adapter push to bus publication.
// Dependencies: overseer-core, overseer-gateway, crate::{quarantine, ws}
// ============================================================================

//! ## Overview
//! Every adapter event funnels through one pipeline: stamp ingestion time,
//! enforce per-run sequence monotonicity (regressions are quarantined),
//! persist append-only (duplicates are silent no-ops), apply domain
//! reactions (decision enqueue, artifact upsert, coherence storage, agent
//! status and trust updates), publish on the bus, and broadcast a classified
//! frame to dashboards. Decision events are enqueued *before* publication so
//! bus observers never see a decision that is not yet queryable.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;

use overseer_core::AdapterEvent;
use overseer_core::AgentEvent;
use overseer_core::AgentId;
use overseer_core::AgentStatus;
use overseer_core::ArtifactKind;
use overseer_core::CoherenceIssue;
use overseer_core::EventEnvelope;
use overseer_core::OutcomeContext;
use overseer_core::ProjectStore;
use overseer_core::RunId;
use overseer_core::StoreError;
use overseer_core::Timestamp;
use overseer_core::TrustOutcome;
use overseer_core::runtime::DecisionQueue;
use overseer_core::runtime::EventBus;
use overseer_core::runtime::TickService;
use overseer_core::runtime::TrustEngine;
use overseer_gateway::AdapterEventSink;
use overseer_gateway::AgentRegistry;

use crate::quarantine::QuarantineStore;
use crate::ws::WsHub;
use crate::ws::WsMessage;
use crate::ws::classify_event;

// ============================================================================
// SECTION: Ingestor
// ============================================================================

/// Ingestion pipeline shared by every transport and the bridge endpoint.
///
/// # Invariants
/// - An envelope reaches the bus at most once, after it is persisted.
/// - Decision events are queued before publication.
pub struct EventIngestor {
    /// Knowledge store.
    store: Arc<dyn ProjectStore>,
    /// Event bus.
    bus: Arc<EventBus>,
    /// Decision queue.
    queue: Arc<DecisionQueue>,
    /// Trust engine.
    trust: Arc<TrustEngine>,
    /// Tick service.
    tick: Arc<TickService>,
    /// Dashboard hub.
    hub: Arc<WsHub>,
    /// Quarantine pen.
    quarantine: Arc<QuarantineStore>,
    /// Handle registry, for status reactions.
    registry: Arc<AgentRegistry>,
    /// Highest sequence seen per `(agent, run)`.
    last_sequences: Mutex<HashMap<(AgentId, RunId), u64>>,
}

impl EventIngestor {
    /// Creates the pipeline over its collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn ProjectStore>,
        bus: Arc<EventBus>,
        queue: Arc<DecisionQueue>,
        trust: Arc<TrustEngine>,
        tick: Arc<TickService>,
        hub: Arc<WsHub>,
        quarantine: Arc<QuarantineStore>,
        registry: Arc<AgentRegistry>,
    ) -> Self {
        Self {
            store,
            bus,
            queue,
            trust,
            tick,
            hub,
            quarantine,
            registry,
            last_sequences: Mutex::new(HashMap::new()),
        }
    }

    /// Ingests a fully formed envelope: sequence check, persistence,
    /// reactions, publication, broadcast.
    pub fn ingest_envelope(&self, envelope: EventEnvelope) {
        let key = (envelope.agent_id.clone(), envelope.run_id.clone());
        {
            let mut sequences = match self.last_sequences.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if let Some(last) = sequences.get(&key)
                && envelope.source_sequence <= *last
            {
                self.quarantine.quarantine(
                    Some(envelope.agent_id.clone()),
                    format!(
                        "sequence regression: {} after {last} in run {}",
                        envelope.source_sequence, envelope.run_id
                    ),
                    serde_json::to_value(&envelope).unwrap_or_default(),
                );
                return;
            }
            sequences.insert(key, envelope.source_sequence);
        }
        match self.store.append_event(&envelope) {
            Ok(()) => {}
            // Replayed event id: at-least-once delivery, drop silently.
            Err(StoreError::Duplicate(_)) => return,
            Err(error) => {
                tracing::error!(%error, event_id = %envelope.source_event_id, "event persistence failed");
                return;
            }
        }
        self.react(&envelope);
        self.bus.publish(&envelope);
        let workspace = classify_event(&envelope, self.store.as_ref());
        self.hub.broadcast(&WsMessage::Event {
            envelope,
            workspace,
        });
    }

    /// Applies domain reactions for an envelope before publication.
    fn react(&self, envelope: &EventEnvelope) {
        match &envelope.event {
            AgentEvent::Decision {
                decision,
            } => {
                self.queue.enqueue(decision.clone(), self.tick.current());
            }
            AgentEvent::Artifact {
                artifact,
                expected_version,
            } => {
                let caller = Some(&envelope.agent_id);
                let outcome = match expected_version {
                    Some(expected) => {
                        self.store.upsert_artifact(artifact, *expected, caller).map(|_| ())
                    }
                    None => self.store.store_artifact(artifact).map(|_| ()),
                };
                if let Err(error) = outcome {
                    tracing::warn!(
                        artifact = %artifact.artifact_id,
                        %error,
                        "artifact event rejected by store"
                    );
                }
            }
            AgentEvent::Coherence {
                issue,
            } => {
                if let Err(error) = self.store.store_coherence_issue(issue) {
                    tracing::warn!(issue = %issue.issue_id, %error, "coherence storage failed");
                }
                self.penalize_issue_sources(issue);
            }
            AgentEvent::Completion {
                ..
            } => {
                self.set_agent_status(&envelope.agent_id, AgentStatus::Completed);
                self.apply_trust(
                    &envelope.agent_id,
                    TrustOutcome::TaskCompletedClean,
                    &OutcomeContext::default(),
                );
            }
            AgentEvent::Error {
                ..
            } => {
                self.set_agent_status(&envelope.agent_id, AgentStatus::Error);
                self.apply_trust(
                    &envelope.agent_id,
                    TrustOutcome::AgentError,
                    &OutcomeContext::default(),
                );
            }
            AgentEvent::Guardrail {
                ..
            } => {
                self.apply_trust(
                    &envelope.agent_id,
                    TrustOutcome::GuardrailTriggered,
                    &OutcomeContext::default(),
                );
            }
            _ => {}
        }
    }

    /// Docks trust for the agents whose artifacts a coherence issue names.
    fn penalize_issue_sources(&self, issue: &CoherenceIssue) {
        let mut sources: HashSet<AgentId> = HashSet::new();
        let mut kinds_by_agent: HashMap<AgentId, Vec<ArtifactKind>> = HashMap::new();
        for artifact_id in &issue.affected_artifact_ids {
            if let Ok(Some(artifact)) = self.store.get_artifact(artifact_id) {
                let creator = artifact.provenance.created_by.clone();
                kinds_by_agent.entry(creator.clone()).or_default().push(artifact.kind);
                sources.insert(creator);
            }
        }
        for agent_id in sources {
            let context = OutcomeContext {
                blast_radius: None,
                artifact_kinds: kinds_by_agent.remove(&agent_id).unwrap_or_default(),
                workstreams: issue.affected_workstreams.clone(),
                tool_category: None,
            };
            self.apply_trust(&agent_id, TrustOutcome::CoherenceIssueFromThisAgent, &context);
        }
    }

    /// Updates registry and store status together.
    fn set_agent_status(&self, agent_id: &AgentId, status: AgentStatus) {
        self.registry.set_status(agent_id, status);
        if let Err(error) = self.store.update_agent_status(agent_id, status) {
            tracing::warn!(agent = %agent_id, %error, "agent status persistence failed");
        }
    }

    /// Applies a trust outcome, persists the result, and broadcasts changes.
    fn apply_trust(&self, agent_id: &AgentId, outcome: TrustOutcome, context: &OutcomeContext) {
        let delta = self.trust.apply_outcome(agent_id, outcome, self.tick.current(), context);
        if delta == 0 {
            return;
        }
        match self.store.update_trust(agent_id, delta, outcome.as_str()) {
            Ok(score) => {
                self.hub.broadcast(&WsMessage::TrustUpdate {
                    agent_id: agent_id.clone(),
                    delta,
                    score,
                    outcome: Some(outcome.as_str().to_string()),
                });
            }
            Err(error) => {
                tracing::warn!(agent = %agent_id, %error, "trust persistence failed");
            }
        }
        let domains = self.trust.domain_scores(agent_id);
        if !domains.is_empty()
            && let Err(error) = self.store.store_domain_trust_scores(agent_id, &domains)
        {
            tracing::warn!(agent = %agent_id, %error, "domain trust persistence failed");
        }
    }
}

impl std::fmt::Debug for EventIngestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventIngestor").finish_non_exhaustive()
    }
}

// ============================================================================
// SECTION: Sink Implementation
// ============================================================================

impl AdapterEventSink for EventIngestor {
    fn ingest(&self, agent_id: &AgentId, event: AdapterEvent) {
        let envelope = EventEnvelope::from_adapter(agent_id.clone(), event, Timestamp::now());
        self.ingest_envelope(envelope);
    }
}
