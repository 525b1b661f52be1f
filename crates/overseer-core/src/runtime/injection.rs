// crates/overseer-core/src/runtime/injection.rs
// ============================================================================
// Module: Overseer Context Injection Scheduler
// Description: Policy-driven context refresh for running agents.
// Purpose: Evaluate periodic/staleness/reactive triggers and deliver snapshots.
// Dependencies: tracing, crate::core, crate::interfaces, crate::runtime::queue
// ============================================================================

//! ## Overview
//! The scheduler tracks one state record per registered agent: last
//! injection tick, last delivered snapshot version, a staleness counter, and
//! a rolling-hour delivery log. Three triggers schedule injections:
//! **periodic** (interval of ticks), **staleness** (foreign events in
//! readable workstreams), and **reactive** (policy-matched bus events).
//! Delivery runs through a gate chain: registration and running status,
//! cooldown, rate limit, snapshot-version dedup, and token budget. The
//! tracked-state mutex is released around the plugin call; version dedup is
//! the idempotency guard for racing deliveries.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use crate::core::AgentBrief;
use crate::core::AgentEvent;
use crate::core::AgentId;
use crate::core::AgentStatus;
use crate::core::ArtifactStatus;
use crate::core::ContextInjection;
use crate::core::ContextInjectionPolicy;
use crate::core::ControlMode;
use crate::core::EventEnvelope;
use crate::core::InjectionFormat;
use crate::core::InjectionPriority;
use crate::core::InjectionReason;
use crate::core::MILLIS_PER_HOUR;
use crate::core::PendingDecisionSummary;
use crate::core::ReactiveTrigger;
use crate::core::Tick;
use crate::core::Timestamp;
use crate::core::WorkstreamId;
use crate::core::WorkstreamScope;
use crate::interfaces::InjectionTarget;
use crate::interfaces::ProjectStore;
use crate::runtime::queue::DecisionQueue;
use crate::runtime::tick::TickService;

// ============================================================================
// SECTION: Tracked State
// ============================================================================

/// Per-agent state tracked by the scheduler.
#[derive(Debug, Clone)]
struct TrackedAgent {
    /// Brief at registration (or last brief update).
    brief: AgentBrief,
    /// Resolved injection policy (brief's, or the control-mode default).
    policy: ContextInjectionPolicy,
    /// Tick of the last successful injection.
    last_injection_tick: Tick,
    /// Snapshot version last delivered (`None` before the first delivery).
    last_snapshot_version: Option<u64>,
    /// Foreign-event counter driving the staleness trigger.
    staleness_counter: u32,
    /// Timestamps of deliveries within the rolling hour.
    injection_timestamps: Vec<Timestamp>,
    /// Whether any injection has ever succeeded.
    has_ever_injected: bool,
}

/// Scheduled delivery produced by trigger evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledInjection {
    /// Agent to deliver to.
    pub agent_id: AgentId,
    /// Why the delivery was scheduled.
    pub reason: InjectionReason,
    /// Delivery priority.
    pub priority: InjectionPriority,
}

// ============================================================================
// SECTION: Scheduler
// ============================================================================

/// Context injection scheduler.
///
/// # Invariants
/// - The tracked-state mutex is never held across the plugin call.
/// - No agent receives the same snapshot version twice.
pub struct ContextInjectionScheduler {
    /// Tracked agents keyed by id.
    tracked: Mutex<HashMap<AgentId, TrackedAgent>>,
    /// Knowledge store used for snapshots and workstream lookups.
    store: Arc<dyn ProjectStore>,
    /// Decision queue supplying the pending view for snapshots.
    queue: Arc<DecisionQueue>,
    /// Tick service supplying the current tick.
    tick: Arc<TickService>,
    /// Delivery seam (gateway in production, fake in tests).
    target: Arc<dyn InjectionTarget>,
}

impl ContextInjectionScheduler {
    /// Creates a scheduler over the given collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn ProjectStore>,
        queue: Arc<DecisionQueue>,
        tick: Arc<TickService>,
        target: Arc<dyn InjectionTarget>,
    ) -> Self {
        Self {
            tracked: Mutex::new(HashMap::new()),
            store,
            queue,
            tick,
            target,
        }
    }

    /// Locks the tracked-state map, recovering from poisoning.
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<AgentId, TrackedAgent>> {
        match self.tracked.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// Starts tracking an agent. The brief's policy wins; the control-mode
    /// default fills in when the brief omits one.
    pub fn register_agent(&self, brief: AgentBrief, mode: ControlMode) {
        let policy = brief
            .context_injection_policy
            .clone()
            .unwrap_or_else(|| mode.default_injection_policy());
        self.lock().insert(brief.agent_id.clone(), TrackedAgent {
            brief,
            policy,
            last_injection_tick: Tick::ZERO,
            last_snapshot_version: None,
            staleness_counter: 0,
            injection_timestamps: Vec::new(),
            has_ever_injected: false,
        });
    }

    /// Stops tracking an agent.
    pub fn unregister_agent(&self, agent_id: &AgentId) {
        self.lock().remove(agent_id);
    }

    /// Replaces the tracked brief (and re-resolves the policy) after a
    /// brief update.
    pub fn update_brief(&self, brief: AgentBrief, mode: ControlMode) {
        let mut tracked = self.lock();
        if let Some(state) = tracked.get_mut(&brief.agent_id) {
            state.policy = brief
                .context_injection_policy
                .clone()
                .unwrap_or_else(|| mode.default_injection_policy());
            state.brief = brief;
        }
    }

    /// Returns true when the agent is tracked.
    #[must_use]
    pub fn is_tracked(&self, agent_id: &AgentId) -> bool {
        self.lock().contains_key(agent_id)
    }

    /// Returns the current staleness counter for an agent (tests and
    /// diagnostics).
    #[must_use]
    pub fn staleness_counter(&self, agent_id: &AgentId) -> Option<u32> {
        self.lock().get(agent_id).map(|state| state.staleness_counter)
    }

    // ------------------------------------------------------------------
    // Trigger evaluation
    // ------------------------------------------------------------------

    /// Tick subscriber evaluation: returns the agents whose periodic
    /// interval has elapsed. Delivery is the caller's responsibility (the
    /// server spawns [`Self::schedule_injection`] per entry).
    #[must_use]
    pub fn due_periodic(&self, tick: Tick) -> Vec<ScheduledInjection> {
        let tracked = self.lock();
        tracked
            .iter()
            .filter_map(|(agent_id, state)| {
                let interval = state.policy.periodic_interval_ticks?;
                (tick.since(state.last_injection_tick) >= interval).then(|| ScheduledInjection {
                    agent_id: agent_id.clone(),
                    reason: InjectionReason::Periodic,
                    priority: InjectionPriority::Recommended,
                })
            })
            .collect()
    }

    /// Bus-event evaluation: bumps staleness counters and matches reactive
    /// triggers. Returns the deliveries to schedule.
    #[must_use]
    pub fn evaluate_event(&self, envelope: &EventEnvelope) -> Vec<ScheduledInjection> {
        let event_workstreams = self.event_workstreams(envelope);
        let mut scheduled = Vec::new();
        let mut tracked = self.lock();
        for (agent_id, state) in tracked.iter_mut() {
            if *agent_id == envelope.agent_id {
                continue;
            }
            // Staleness: foreign events in readable workstreams widen the
            // gap between the agent's view and reality.
            if let Some(threshold) = state.policy.staleness_threshold
                && event_workstreams.iter().any(|workstream| state.brief.can_read(workstream))
            {
                state.staleness_counter += 1;
                if state.staleness_counter >= threshold {
                    scheduled.push(ScheduledInjection {
                        agent_id: agent_id.clone(),
                        reason: InjectionReason::Staleness,
                        priority: InjectionPriority::Recommended,
                    });
                }
            }
            if let Some(matched) =
                match_reactive(&state.policy, &state.brief, envelope, &event_workstreams)
            {
                scheduled.push(ScheduledInjection {
                    agent_id: agent_id.clone(),
                    reason: InjectionReason::Reactive {
                        matched,
                    },
                    priority: InjectionPriority::Recommended,
                });
            }
        }
        scheduled
    }

    /// Resolver hook: a decision owned by `resolving_agent` was resolved.
    /// Returns the deliveries to schedule for `decision_resolved` triggers.
    #[must_use]
    pub fn on_decision_resolved(&self, resolving_agent: &AgentId) -> Vec<ScheduledInjection> {
        let resolving_workstream = self
            .store
            .get_agent(resolving_agent)
            .ok()
            .flatten()
            .map(|record| record.workstream);
        let tracked = self.lock();
        tracked
            .iter()
            .filter(|entry| entry.0 != resolving_agent)
            .filter_map(|(agent_id, state)| {
                let scope = state.policy.reactive_events.iter().find_map(|trigger| {
                    if let ReactiveTrigger::DecisionResolved {
                        workstreams,
                    } = trigger
                    {
                        Some(*workstreams)
                    } else {
                        None
                    }
                })?;
                let in_scope = resolving_workstream
                    .as_ref()
                    .is_some_and(|workstream| scope_matches(scope, &state.brief, workstream));
                in_scope.then(|| ScheduledInjection {
                    agent_id: agent_id.clone(),
                    reason: InjectionReason::Reactive {
                        matched: "decision_resolved".to_string(),
                    },
                    priority: InjectionPriority::Recommended,
                })
            })
            .collect()
    }

    /// Brief-update hook: returns the reactive delivery for agents whose
    /// policy subscribes to `brief_updated`.
    #[must_use]
    pub fn on_brief_updated(&self, agent_id: &AgentId) -> Option<ScheduledInjection> {
        let tracked = self.lock();
        let state = tracked.get(agent_id)?;
        state
            .policy
            .reactive_events
            .iter()
            .any(|trigger| matches!(trigger, ReactiveTrigger::BriefUpdated))
            .then(|| ScheduledInjection {
                agent_id: agent_id.clone(),
                reason: InjectionReason::BriefUpdated,
                priority: InjectionPriority::Recommended,
            })
    }

    /// Resolves the workstreams an envelope is attributable to.
    fn event_workstreams(&self, envelope: &EventEnvelope) -> Vec<WorkstreamId> {
        match &envelope.event {
            AgentEvent::Artifact {
                artifact, ..
            } => vec![artifact.workstream.clone()],
            AgentEvent::Coherence {
                issue,
            } => issue.affected_workstreams.clone(),
            _ => self
                .store
                .get_agent(&envelope.agent_id)
                .ok()
                .flatten()
                .map(|record| vec![record.workstream])
                .unwrap_or_default(),
        }
    }

    // ------------------------------------------------------------------
    // Delivery
    // ------------------------------------------------------------------

    /// Runs the delivery gate chain and, when every gate passes, delivers a
    /// snapshot through the injection target. Returns true only when the
    /// payload actually reached the plugin.
    pub async fn schedule_injection(
        &self,
        agent_id: &AgentId,
        reason: InjectionReason,
        priority: InjectionPriority,
    ) -> bool {
        let now = Timestamp::now();
        let current_tick = self.tick.current();

        // Gate phase under the lock; copy what delivery needs, then release.
        let (last_snapshot_version, budget) = {
            let mut tracked = self.lock();
            let Some(state) = tracked.get_mut(agent_id) else {
                return false;
            };
            let Some(handle) = self.target.handle(agent_id) else {
                return false;
            };
            if handle.status != AgentStatus::Running {
                return false;
            }
            if priority != InjectionPriority::Required
                && state.has_ever_injected
                && current_tick.since(state.last_injection_tick) < state.policy.cooldown_ticks
            {
                return false;
            }
            let horizon = now.minus_millis(MILLIS_PER_HOUR);
            state.injection_timestamps.retain(|stamp| *stamp > horizon);
            if priority != InjectionPriority::Required
                && state.injection_timestamps.len()
                    >= usize::try_from(state.policy.max_injections_per_hour).unwrap_or(usize::MAX)
            {
                return false;
            }
            (state.last_snapshot_version, state.brief.session_policy.context_budget_tokens)
        };

        let pending = pending_summaries(&self.queue);
        let snapshot = match self.store.snapshot(&pending) {
            Ok(snapshot) => snapshot,
            Err(error) => {
                tracing::warn!(agent = %agent_id, %error, "snapshot acquisition failed");
                return false;
            }
        };
        if last_snapshot_version == Some(snapshot.version) {
            return false;
        }
        if let Some(budget) = budget
            && snapshot.estimated_tokens > budget
            && priority == InjectionPriority::Supplementary
        {
            return false;
        }

        let Ok(content) = serde_json::to_string(&snapshot) else {
            return false;
        };
        let injection = ContextInjection {
            content,
            format: InjectionFormat::Json,
            snapshot_version: snapshot.version,
            estimated_tokens: snapshot.estimated_tokens,
            priority,
            is_delta: matches!(reason, InjectionReason::Reactive { .. }),
            reason,
        };
        let Some(handle) = self.target.handle(agent_id) else {
            return false;
        };
        if let Err(error) = self.target.inject(&handle, &injection).await {
            tracing::warn!(agent = %agent_id, %error, "context injection delivery failed");
            return false;
        }

        // Delivery succeeded; re-acquire and update tracking.
        let mut tracked = self.lock();
        if let Some(state) = tracked.get_mut(agent_id) {
            state.last_injection_tick = current_tick;
            state.last_snapshot_version = Some(snapshot.version);
            state.staleness_counter = 0;
            state.injection_timestamps.push(now);
            state.has_ever_injected = true;
        }
        true
    }
}

impl std::fmt::Debug for ContextInjectionScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextInjectionScheduler").finish_non_exhaustive()
    }
}

// ============================================================================
// SECTION: Matching Helpers
// ============================================================================

/// Builds the pending-decision view the snapshot embeds.
#[must_use]
pub fn pending_summaries(queue: &DecisionQueue) -> Vec<PendingDecisionSummary> {
    queue
        .list_pending(None)
        .into_iter()
        .map(|record| PendingDecisionSummary {
            decision_id: record.event.decision_id().clone(),
            agent_id: record.event.agent_id().clone(),
            kind: record.event.kind_label().to_string(),
            title: record.event.title(),
            severity: record.event.severity(),
            priority: record.priority,
        })
        .collect()
}

/// Returns true when a workstream falls inside the scope for a brief.
fn scope_matches(scope: WorkstreamScope, brief: &AgentBrief, workstream: &WorkstreamId) -> bool {
    match scope {
        WorkstreamScope::Own => brief.workstream == *workstream,
        WorkstreamScope::Readable => brief.can_read(workstream),
        WorkstreamScope::All => true,
    }
}

/// Matches a bus event against the policy's reactive triggers, returning
/// the matched trigger label.
fn match_reactive(
    policy: &ContextInjectionPolicy,
    brief: &AgentBrief,
    envelope: &EventEnvelope,
    event_workstreams: &[WorkstreamId],
) -> Option<String> {
    for trigger in &policy.reactive_events {
        match (trigger, &envelope.event) {
            (
                ReactiveTrigger::ArtifactApproved {
                    workstreams,
                },
                AgentEvent::Artifact {
                    artifact, ..
                },
            ) if artifact.status == ArtifactStatus::Approved
                && event_workstreams
                    .iter()
                    .any(|workstream| scope_matches(*workstreams, brief, workstream)) =>
            {
                return Some("artifact_approved".to_string());
            }
            (
                ReactiveTrigger::CoherenceIssue {
                    min_severity,
                },
                AgentEvent::Coherence {
                    issue,
                },
            ) if issue.severity >= *min_severity => {
                return Some("coherence_issue".to_string());
            }
            (
                ReactiveTrigger::AgentCompleted,
                AgentEvent::Completion {
                    ..
                },
            ) if event_workstreams.iter().any(|workstream| brief.can_read(workstream)) => {
                return Some("agent_completed".to_string());
            }
            _ => {}
        }
    }
    None
}
