// crates/overseer-core/src/runtime/queue.rs
// ============================================================================
// Module: Overseer Decision Queue
// Description: Pending decisions with priorities, waiters, and tick timeouts.
// Purpose: Own all decision state; accept, list, resolve, and auto-resolve.
// Dependencies: tokio, crate::core::{decision, identifiers, risk, time}
// ============================================================================

//! ## Overview
//! The queue is the sole owner of decision state. Enqueues are idempotent on
//! decision id; resolution succeeds at most once; registered waiters are
//! completed the moment a resolution (human or timeout) attaches. Priority
//! orders the pending view: severity base plus a +100 elevation for orphaned
//! decisions, tie-broken by enqueue tick ascending. On each tick, pending
//! decisions past their effective deadline auto-resolve; suspended decisions
//! never time out.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::oneshot;

use crate::core::ActionKind;
use crate::core::AgentId;
use crate::core::ApprovalAction;
use crate::core::DecisionEvent;
use crate::core::DecisionId;
use crate::core::DecisionResolution;
use crate::core::DecisionStatus;
use crate::core::PendingDecision;
use crate::core::Tick;
use crate::core::Timestamp;

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Queue timeout policy.
///
/// # Invariants
/// - `timeout_ticks` of `None` disables enqueue-relative deadlines;
///   explicit `due_by_tick` deadlines still apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueuePolicy {
    /// Ticks after enqueue before auto-resolution (`None` disables).
    pub timeout_ticks: Option<u64>,
}

/// Priority elevation applied to orphaned decisions.
pub const ORPHAN_PRIORITY_BOOST: i64 = 100;

/// Badge attached to decisions orphaned by an agent kill.
pub const BADGE_AGENT_KILLED: &str = "agent killed";

/// Badge attached to decisions suspended by a brake.
pub const BADGE_AGENT_BRAKED: &str = "source agent braked";

// ============================================================================
// SECTION: Queue State
// ============================================================================

/// State guarded by the queue mutex.
struct QueueInner {
    /// Decision records keyed by id.
    decisions: BTreeMap<DecisionId, PendingDecision>,
    /// Outstanding resolution waiters keyed by decision id.
    waiters: HashMap<DecisionId, Vec<oneshot::Sender<DecisionResolution>>>,
}

/// Decision queue with timeouts, waiters, and orphan handling.
///
/// # Invariants
/// - A terminal decision (resolved/timed-out) never changes status again.
/// - Waiters are completed while the mutex is held; waiter callbacks must
///   not reacquire queue APIs synchronously.
pub struct DecisionQueue {
    /// Guarded decision and waiter state.
    inner: Mutex<QueueInner>,
    /// Timeout policy.
    policy: QueuePolicy,
}

impl DecisionQueue {
    /// Creates an empty queue with the given policy.
    #[must_use]
    pub fn new(policy: QueuePolicy) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                decisions: BTreeMap::new(),
                waiters: HashMap::new(),
            }),
            policy,
        }
    }

    /// Returns the timeout policy.
    #[must_use]
    pub const fn policy(&self) -> QueuePolicy {
        self.policy
    }

    /// Locks the inner state, recovering from poisoning.
    fn lock(&self) -> std::sync::MutexGuard<'_, QueueInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    // ------------------------------------------------------------------
    // Enqueue and lookup
    // ------------------------------------------------------------------

    /// Enqueues a decision. Duplicate ids are silently ignored; returns
    /// true when the decision was actually queued.
    pub fn enqueue(&self, event: DecisionEvent, current_tick: Tick) -> bool {
        let mut inner = self.lock();
        let id = event.decision_id().clone();
        if inner.decisions.contains_key(&id) {
            return false;
        }
        let priority = event.severity().priority_base();
        inner.decisions.insert(id, PendingDecision {
            event,
            status: DecisionStatus::Pending,
            enqueued_at_tick: current_tick,
            priority,
            resolution: None,
            resolved_at: None,
            badge: None,
        });
        true
    }

    /// Returns a decision record by id.
    #[must_use]
    pub fn get(&self, id: &DecisionId) -> Option<PendingDecision> {
        self.lock().decisions.get(id).cloned()
    }

    /// Lists pending decisions, optionally for one agent, priority
    /// descending (ties: enqueue tick ascending, then id).
    #[must_use]
    pub fn list_pending(&self, agent_id: Option<&AgentId>) -> Vec<PendingDecision> {
        let inner = self.lock();
        let mut pending: Vec<PendingDecision> = inner
            .decisions
            .values()
            .filter(|record| record.status == DecisionStatus::Pending)
            .filter(|record| agent_id.is_none_or(|agent| record.event.agent_id() == agent))
            .cloned()
            .collect();
        pending.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.enqueued_at_tick.cmp(&b.enqueued_at_tick))
                .then_with(|| a.event.decision_id().cmp(b.event.decision_id()))
        });
        pending
    }

    /// Lists every decision regardless of status.
    #[must_use]
    pub fn list_all(&self) -> Vec<PendingDecision> {
        self.lock().decisions.values().cloned().collect()
    }

    // ------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------

    /// Attaches a resolution. Returns `None` when the decision is missing
    /// or already terminal; callers surface that as a conflict. On success
    /// every registered waiter is completed with the resolution.
    pub fn resolve(
        &self,
        id: &DecisionId,
        resolution: DecisionResolution,
    ) -> Option<DecisionResolution> {
        let mut inner = self.lock();
        let record = inner.decisions.get_mut(id)?;
        if record.status.is_terminal() {
            return None;
        }
        record.status = DecisionStatus::Resolved;
        record.resolution = Some(resolution.clone());
        record.resolved_at = Some(Timestamp::now());
        Self::fire_waiters(&mut inner, id, &resolution);
        Some(resolution)
    }

    /// Waits for a resolution. Completes immediately when the decision is
    /// already terminal; returns `None` when the decision is unknown or the
    /// queue drops the waiter.
    pub async fn wait_for_resolution(&self, id: &DecisionId) -> Option<DecisionResolution> {
        let receiver = {
            let mut inner = self.lock();
            let record = inner.decisions.get(id)?;
            if let Some(resolution) = &record.resolution {
                return Some(resolution.clone());
            }
            let (sender, receiver) = oneshot::channel();
            inner.waiters.entry(id.clone()).or_default().push(sender);
            receiver
        };
        receiver.await.ok()
    }

    /// Completes and removes every waiter for a decision. Called with the
    /// mutex held so waiters observe a consistent queue state.
    fn fire_waiters(inner: &mut QueueInner, id: &DecisionId, resolution: &DecisionResolution) {
        if let Some(waiters) = inner.waiters.remove(id) {
            for waiter in waiters {
                // A dropped receiver just means the caller stopped waiting.
                let _ = waiter.send(resolution.clone());
            }
        }
    }

    // ------------------------------------------------------------------
    // Agent lifecycle hooks
    // ------------------------------------------------------------------

    /// Marks every pending decision of a killed agent for triage with an
    /// elevated priority. Terminal decisions are untouched. Returns the
    /// affected records.
    pub fn handle_agent_killed(&self, agent_id: &AgentId) -> Vec<PendingDecision> {
        let mut inner = self.lock();
        let mut affected = Vec::new();
        for record in inner.decisions.values_mut() {
            if record.event.agent_id() == agent_id && record.status == DecisionStatus::Pending {
                record.status = DecisionStatus::Triage;
                record.badge = Some(BADGE_AGENT_KILLED.to_string());
                record.priority += ORPHAN_PRIORITY_BOOST;
                affected.push(record.clone());
            }
        }
        affected
    }

    /// Suspends every pending decision of a braked agent. Returns the
    /// affected records.
    pub fn suspend_agent_decisions(&self, agent_id: &AgentId) -> Vec<PendingDecision> {
        let mut inner = self.lock();
        let mut affected = Vec::new();
        for record in inner.decisions.values_mut() {
            if record.event.agent_id() == agent_id && record.status == DecisionStatus::Pending {
                record.status = DecisionStatus::Suspended;
                record.badge = Some(BADGE_AGENT_BRAKED.to_string());
                affected.push(record.clone());
            }
        }
        affected
    }

    /// Restores suspended decisions of a released agent to pending. Returns
    /// the affected records.
    pub fn resume_agent_decisions(&self, agent_id: &AgentId) -> Vec<PendingDecision> {
        let mut inner = self.lock();
        let mut affected = Vec::new();
        for record in inner.decisions.values_mut() {
            if record.event.agent_id() == agent_id && record.status == DecisionStatus::Suspended {
                record.status = DecisionStatus::Pending;
                record.badge = None;
                affected.push(record.clone());
            }
        }
        affected
    }

    // ------------------------------------------------------------------
    // Timeouts
    // ------------------------------------------------------------------

    /// Tick subscriber: auto-resolves pending decisions whose effective
    /// deadline is at or before `tick`. Suspended (and triaged) decisions
    /// never time out. Returns the auto-resolutions applied so observers
    /// can broadcast them.
    pub fn on_tick(&self, tick: Tick) -> Vec<(DecisionEvent, DecisionResolution)> {
        let mut inner = self.lock();
        let due: Vec<DecisionId> = inner
            .decisions
            .iter()
            .filter(|(_, record)| record.status == DecisionStatus::Pending)
            .filter(|(_, record)| {
                effective_deadline(record, self.policy).is_some_and(|deadline| deadline <= tick)
            })
            .map(|(id, _)| id.clone())
            .collect();
        let mut resolved = Vec::new();
        for id in due {
            let Some(record) = inner.decisions.get_mut(&id) else {
                continue;
            };
            let Some(resolution) = timeout_resolution(&record.event) else {
                continue;
            };
            record.status = DecisionStatus::TimedOut;
            record.resolution = Some(resolution.clone());
            record.resolved_at = Some(Timestamp::now());
            let event = record.event.clone();
            Self::fire_waiters(&mut inner, &id, &resolution);
            resolved.push((event, resolution));
        }
        resolved
    }
}

impl std::fmt::Debug for DecisionQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionQueue").field("policy", &self.policy).finish_non_exhaustive()
    }
}

// ============================================================================
// SECTION: Deadline Helpers
// ============================================================================

/// Computes the effective deadline: the event's `due_by_tick` when present,
/// otherwise enqueue tick plus the policy window.
fn effective_deadline(record: &PendingDecision, policy: QueuePolicy) -> Option<Tick> {
    record
        .event
        .due_by_tick()
        .or_else(|| policy.timeout_ticks.map(|window| record.enqueued_at_tick.plus(window)))
}

/// Builds the timeout auto-resolution for a decision, or `None` when the
/// event has nothing to auto-select.
fn timeout_resolution(event: &DecisionEvent) -> Option<DecisionResolution> {
    match event {
        DecisionEvent::Option(option_event) => {
            let chosen = option_event
                .recommended_option_id
                .clone()
                .or_else(|| option_event.options.first().map(|option| option.option_id.clone()))?;
            Some(DecisionResolution::Option {
                chosen_option_id: chosen,
                rationale: Some("timeout: auto-selected recommended option".to_string()),
                action_kind: ActionKind::Review,
                auto_resolved: true,
            })
        }
        DecisionEvent::ToolApproval(_) => Some(DecisionResolution::ToolApproval {
            action: ApprovalAction::Approve,
            rationale: Some("timeout: default approve".to_string()),
            action_kind: ActionKind::Review,
            auto_resolved: true,
            modified_args: None,
        }),
    }
}
