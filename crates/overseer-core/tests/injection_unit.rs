// crates/overseer-core/tests/injection_unit.rs
// ============================================================================
// Module: Context Injection Scheduler Unit Tests
// Description: Trigger evaluation and the delivery gate chain.
// Purpose: Validate staleness/periodic/reactive triggers, cooldown, rate
//          limits, snapshot-version dedup, and budget enforcement.
// ============================================================================

//! ## Overview
//! Unit-level tests for the scheduler invariants:
//! - Staleness counts foreign events in readable workstreams only
//! - Cooldown blocks non-required injections inside the window
//! - The rolling-hour rate limit blocks non-required injections
//! - No snapshot version is ever delivered twice to one agent
//! - Supplementary injections respect the context token budget

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    missing_docs,
    clippy::missing_docs_in_private_items,
    reason = "Test-only assertions, fakes, and helpers are permitted."
)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use overseer_core::AgentBrief;
use overseer_core::AgentEvent;
use overseer_core::AgentHandle;
use overseer_core::AgentId;
use overseer_core::AgentRecord;
use overseer_core::AgentStatus;
use overseer_core::ContextInjection;
use overseer_core::ContextInjectionPolicy;
use overseer_core::ControlMode;
use overseer_core::EventEnvelope;
use overseer_core::InjectionPriority;
use overseer_core::InjectionReason;
use overseer_core::KnowledgeSnapshot;
use overseer_core::PluginError;
use overseer_core::ProjectStore;
use overseer_core::RunId;
use overseer_core::SessionPolicy;
use overseer_core::SourceEventId;
use overseer_core::StoreError;
use overseer_core::Timestamp;
use overseer_core::WorkstreamId;
use overseer_core::interfaces::InjectionTarget;
use overseer_core::runtime::ContextInjectionScheduler;
use overseer_core::runtime::DecisionQueue;
use overseer_core::runtime::QueuePolicy;
use overseer_core::runtime::TickMode;
use overseer_core::runtime::TickService;

// ============================================================================
// SECTION: Fake Store
// ============================================================================

#[derive(Default)]
struct FakeStore {
    agents: Mutex<BTreeMap<AgentId, AgentRecord>>,
    version: AtomicU64,
    estimated_tokens: AtomicU64,
}

impl FakeStore {
    fn add_agent(&self, agent: &str, workstream: &str) {
        let record = AgentRecord {
            agent_id: AgentId::new(agent),
            role: "worker".to_string(),
            workstream: WorkstreamId::new(workstream),
            plugin_name: "fake".to_string(),
            model_preference: None,
            status: AgentStatus::Running,
            registered_at: Timestamp::from_unix_millis(0),
        };
        self.agents.lock().unwrap().insert(record.agent_id.clone(), record);
    }

    fn bump_version(&self) {
        self.version.fetch_add(1, Ordering::SeqCst);
    }

    fn set_estimated_tokens(&self, tokens: u64) {
        self.estimated_tokens.store(tokens, Ordering::SeqCst);
    }
}

impl ProjectStore for FakeStore {
    fn upsert_artifact(
        &self,
        _: &overseer_core::ArtifactEvent,
        _: u64,
        _: Option<&AgentId>,
    ) -> Result<overseer_core::Artifact, StoreError> {
        Err(StoreError::Invalid("unused in fake".to_string()))
    }

    fn store_artifact(
        &self,
        _: &overseer_core::ArtifactEvent,
    ) -> Result<overseer_core::Artifact, StoreError> {
        Err(StoreError::Invalid("unused in fake".to_string()))
    }

    fn get_artifact(
        &self,
        _: &overseer_core::ArtifactId,
    ) -> Result<Option<overseer_core::Artifact>, StoreError> {
        Ok(None)
    }

    fn list_artifacts(
        &self,
        _: Option<&WorkstreamId>,
    ) -> Result<Vec<overseer_core::Artifact>, StoreError> {
        Ok(Vec::new())
    }

    fn artifact_version(&self, _: &overseer_core::ArtifactId) -> Result<u64, StoreError> {
        Ok(0)
    }

    fn store_artifact_content(
        &self,
        _: &AgentId,
        _: &overseer_core::ArtifactId,
        _: &[u8],
        _: Option<&str>,
    ) -> Result<overseer_core::StoredContent, StoreError> {
        Err(StoreError::Invalid("unused in fake".to_string()))
    }

    fn get_artifact_content(
        &self,
        _: &AgentId,
        _: &overseer_core::ArtifactId,
    ) -> Result<Option<overseer_core::ArtifactContent>, StoreError> {
        Ok(None)
    }

    fn register_agent(&self, _: &AgentHandle, _: &AgentBrief) -> Result<(), StoreError> {
        Ok(())
    }

    fn update_agent_status(&self, _: &AgentId, _: AgentStatus) -> Result<(), StoreError> {
        Ok(())
    }

    fn remove_agent(&self, _: &AgentId) -> Result<(), StoreError> {
        Ok(())
    }

    fn get_agent(&self, id: &AgentId) -> Result<Option<AgentRecord>, StoreError> {
        Ok(self.agents.lock().unwrap().get(id).cloned())
    }

    fn list_agents(&self) -> Result<Vec<AgentRecord>, StoreError> {
        Ok(self.agents.lock().unwrap().values().cloned().collect())
    }

    fn store_coherence_issue(&self, _: &overseer_core::CoherenceIssue) -> Result<(), StoreError> {
        Ok(())
    }

    fn list_coherence_issues(
        &self,
        _: Option<overseer_core::IssueStatus>,
    ) -> Result<Vec<overseer_core::CoherenceIssue>, StoreError> {
        Ok(Vec::new())
    }

    fn resolve_coherence_issue(
        &self,
        _: &overseer_core::IssueId,
        _: &str,
        _: Option<&AgentId>,
    ) -> Result<(), StoreError> {
        Ok(())
    }

    fn trust_profile(&self, id: &AgentId) -> Result<overseer_core::TrustProfile, StoreError> {
        Ok(overseer_core::TrustProfile {
            agent_id: id.clone(),
            score: 50,
            domain_scores: BTreeMap::new(),
        })
    }

    fn update_trust(&self, _: &AgentId, _: i64, _: &str) -> Result<i64, StoreError> {
        Ok(50)
    }

    fn domain_trust_scores(&self, _: &AgentId) -> Result<BTreeMap<String, i64>, StoreError> {
        Ok(BTreeMap::new())
    }

    fn store_domain_trust_scores(
        &self,
        _: &AgentId,
        _: &BTreeMap<String, i64>,
    ) -> Result<(), StoreError> {
        Ok(())
    }

    fn ensure_workstream(
        &self,
        _: &WorkstreamId,
        _: Option<&str>,
        _: Option<&str>,
    ) -> Result<(), StoreError> {
        Ok(())
    }

    fn update_workstream_activity(&self, _: &WorkstreamId, _: &str) -> Result<(), StoreError> {
        Ok(())
    }

    fn list_workstreams(&self) -> Result<Vec<overseer_core::WorkstreamSummary>, StoreError> {
        Ok(Vec::new())
    }

    fn append_event(&self, _: &EventEnvelope) -> Result<(), StoreError> {
        Ok(())
    }

    fn events(&self, _: &overseer_core::EventFilter) -> Result<Vec<EventEnvelope>, StoreError> {
        Ok(Vec::new())
    }

    fn store_checkpoint(
        &self,
        _: &overseer_core::SerializedAgentState,
        _: Option<&overseer_core::DecisionId>,
        _: usize,
    ) -> Result<overseer_core::Checkpoint, StoreError> {
        Err(StoreError::Invalid("unused in fake".to_string()))
    }

    fn latest_checkpoint(
        &self,
        _: &AgentId,
    ) -> Result<Option<overseer_core::Checkpoint>, StoreError> {
        Ok(None)
    }

    fn checkpoints(&self, _: &AgentId) -> Result<Vec<overseer_core::Checkpoint>, StoreError> {
        Ok(Vec::new())
    }

    fn checkpoint_count(&self, _: &AgentId) -> Result<u64, StoreError> {
        Ok(0)
    }

    fn delete_checkpoints(&self, _: &AgentId) -> Result<u64, StoreError> {
        Ok(0)
    }

    fn store_project_config(&self, _: &overseer_core::ProjectConfig) -> Result<(), StoreError> {
        Ok(())
    }

    fn project_config(&self) -> Result<Option<overseer_core::ProjectConfig>, StoreError> {
        Ok(None)
    }

    fn has_project(&self) -> Result<bool, StoreError> {
        Ok(false)
    }

    fn append_audit(&self, _: &overseer_core::AuditLogEntry) -> Result<(), StoreError> {
        Ok(())
    }

    fn audit_log(
        &self,
        _: Option<&str>,
        _: Option<&str>,
    ) -> Result<Vec<overseer_core::AuditLogEntry>, StoreError> {
        Ok(Vec::new())
    }

    fn version(&self) -> Result<u64, StoreError> {
        Ok(self.version.load(Ordering::SeqCst))
    }

    fn snapshot(
        &self,
        pending: &[overseer_core::PendingDecisionSummary],
    ) -> Result<KnowledgeSnapshot, StoreError> {
        Ok(KnowledgeSnapshot {
            version: self.version.load(Ordering::SeqCst),
            generated_at: Timestamp::from_unix_millis(0),
            workstreams: Vec::new(),
            pending_decisions: pending.to_vec(),
            recent_coherence_issues: Vec::new(),
            artifact_index: Vec::new(),
            active_agents: Vec::new(),
            estimated_tokens: self.estimated_tokens.load(Ordering::SeqCst),
        })
    }
}

// ============================================================================
// SECTION: Fake Target
// ============================================================================

#[derive(Default)]
struct FakeTarget {
    handles: Mutex<BTreeMap<AgentId, AgentHandle>>,
    delivered: Mutex<Vec<ContextInjection>>,
    fail: AtomicBool,
}

impl FakeTarget {
    fn add_running(&self, agent: &str) {
        let handle = AgentHandle {
            agent_id: AgentId::new(agent),
            plugin_name: "fake".to_string(),
            status: AgentStatus::Running,
            session_id: None,
        };
        self.handles.lock().unwrap().insert(handle.agent_id.clone(), handle);
    }

    fn set_status(&self, agent: &str, status: AgentStatus) {
        if let Some(handle) = self.handles.lock().unwrap().get_mut(&AgentId::new(agent)) {
            handle.status = status;
        }
    }

    fn delivered(&self) -> Vec<ContextInjection> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl InjectionTarget for FakeTarget {
    fn handle(&self, agent_id: &AgentId) -> Option<AgentHandle> {
        self.handles.lock().unwrap().get(agent_id).cloned()
    }

    async fn inject(
        &self,
        _handle: &AgentHandle,
        injection: &ContextInjection,
    ) -> Result<(), PluginError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PluginError::Transport("injected failure".to_string()));
        }
        self.delivered.lock().unwrap().push(injection.clone());
        Ok(())
    }
}

// ============================================================================
// SECTION: Harness
// ============================================================================

struct Harness {
    store: Arc<FakeStore>,
    target: Arc<FakeTarget>,
    tick: Arc<TickService>,
    scheduler: ContextInjectionScheduler,
}

fn harness() -> Harness {
    let store = Arc::new(FakeStore::default());
    let target = Arc::new(FakeTarget::default());
    let tick = Arc::new(TickService::new(TickMode::Manual));
    let queue = Arc::new(DecisionQueue::new(QueuePolicy::default()));
    let scheduler = ContextInjectionScheduler::new(
        Arc::clone(&store) as Arc<dyn ProjectStore>,
        queue,
        Arc::clone(&tick),
        Arc::clone(&target) as Arc<dyn InjectionTarget>,
    );
    Harness {
        store,
        target,
        tick,
        scheduler,
    }
}

fn brief(agent: &str, workstream: &str, readable: &[&str]) -> AgentBrief {
    AgentBrief {
        agent_id: AgentId::new(agent),
        role: "worker".to_string(),
        workstream: WorkstreamId::new(workstream),
        readable_workstreams: readable.iter().map(|id| WorkstreamId::new(*id)).collect(),
        escalation_protocol: overseer_core::EscalationProtocol::default(),
        allowed_tools: Vec::new(),
        session_policy: SessionPolicy::default(),
        context_injection_policy: None,
        model_preference: None,
        project_brief: None,
        knowledge_snapshot: None,
    }
}

fn policy(
    periodic: Option<u64>,
    staleness: Option<u32>,
    cooldown: u64,
    max_per_hour: u32,
) -> ContextInjectionPolicy {
    ContextInjectionPolicy {
        periodic_interval_ticks: periodic,
        staleness_threshold: staleness,
        cooldown_ticks: cooldown,
        max_injections_per_hour: max_per_hour,
        reactive_events: Vec::new(),
    }
}

fn status_from(agent: &str, sequence: u64) -> EventEnvelope {
    EventEnvelope {
        source_event_id: SourceEventId::new(format!("evt-{agent}-{sequence}")),
        source_sequence: sequence,
        source_occurred_at: Timestamp::from_unix_millis(0),
        agent_id: AgentId::new(agent),
        run_id: RunId::new("run-1"),
        ingested_at: Timestamp::from_unix_millis(0),
        event: AgentEvent::Status {
            message: "working".to_string(),
        },
    }
}

// ============================================================================
// SECTION: Staleness Trigger
// ============================================================================

#[tokio::test]
async fn staleness_threshold_schedules_one_recommended_injection() {
    let harness = harness();
    harness.store.add_agent("a-2", "ws-b");
    harness.store.bump_version();
    harness.target.add_running("a-1");
    let mut brief = brief("a-1", "ws-a", &["ws-b"]);
    brief.context_injection_policy = Some(policy(Some(999), Some(3), 0, 12));
    harness.scheduler.register_agent(brief, ControlMode::Orchestrator);

    let first = harness.scheduler.evaluate_event(&status_from("a-2", 1));
    let second = harness.scheduler.evaluate_event(&status_from("a-2", 2));
    assert!(first.is_empty());
    assert!(second.is_empty());
    let third = harness.scheduler.evaluate_event(&status_from("a-2", 3));
    assert_eq!(third.len(), 1);
    assert_eq!(third[0].reason, InjectionReason::Staleness);
    assert_eq!(third[0].priority, InjectionPriority::Recommended);

    let delivered = harness
        .scheduler
        .schedule_injection(&AgentId::new("a-1"), InjectionReason::Staleness, third[0].priority)
        .await;
    assert!(delivered);
    assert_eq!(harness.scheduler.staleness_counter(&AgentId::new("a-1")), Some(0));
    let injections = harness.target.delivered();
    assert_eq!(injections.len(), 1);
    assert_eq!(injections[0].priority, InjectionPriority::Recommended);
}

#[test]
fn staleness_ignores_unreadable_workstreams_and_self_events() {
    let harness = harness();
    harness.store.add_agent("a-2", "ws-hidden");
    harness.target.add_running("a-1");
    let mut tracked = brief("a-1", "ws-a", &["ws-b"]);
    tracked.context_injection_policy = Some(policy(None, Some(1), 0, 12));
    harness.scheduler.register_agent(tracked, ControlMode::Orchestrator);

    // Foreign event in an unreadable workstream: no bump.
    assert!(harness.scheduler.evaluate_event(&status_from("a-2", 1)).is_empty());
    assert_eq!(harness.scheduler.staleness_counter(&AgentId::new("a-1")), Some(0));
    // The agent's own events never count.
    assert!(harness.scheduler.evaluate_event(&status_from("a-1", 1)).is_empty());
    assert_eq!(harness.scheduler.staleness_counter(&AgentId::new("a-1")), Some(0));
}

// ============================================================================
// SECTION: Delivery Gates
// ============================================================================

#[tokio::test]
async fn cooldown_blocks_non_required_injections() {
    let harness = harness();
    harness.store.bump_version();
    harness.target.add_running("a-1");
    let mut tracked = brief("a-1", "ws-a", &[]);
    tracked.context_injection_policy = Some(policy(None, None, 5, 100));
    harness.scheduler.register_agent(tracked, ControlMode::Orchestrator);
    let agent = AgentId::new("a-1");

    assert!(
        harness
            .scheduler
            .schedule_injection(&agent, InjectionReason::Manual, InjectionPriority::Recommended)
            .await
    );
    harness.store.bump_version();
    // Inside the cooldown window at the same tick.
    assert!(
        !harness
            .scheduler
            .schedule_injection(&agent, InjectionReason::Manual, InjectionPriority::Recommended)
            .await
    );
    // Required priority bypasses cooldown.
    assert!(
        harness
            .scheduler
            .schedule_injection(&agent, InjectionReason::Manual, InjectionPriority::Required)
            .await
    );
    // After the window elapses the gate opens again.
    harness.store.bump_version();
    harness.tick.advance(5);
    assert!(
        harness
            .scheduler
            .schedule_injection(&agent, InjectionReason::Manual, InjectionPriority::Recommended)
            .await
    );
}

#[tokio::test]
async fn rate_limit_blocks_past_the_hourly_budget() {
    let harness = harness();
    harness.store.bump_version();
    harness.target.add_running("a-1");
    let mut tracked = brief("a-1", "ws-a", &[]);
    tracked.context_injection_policy = Some(policy(None, None, 0, 2));
    harness.scheduler.register_agent(tracked, ControlMode::Orchestrator);
    let agent = AgentId::new("a-1");

    for _ in 0..2 {
        assert!(
            harness
                .scheduler
                .schedule_injection(&agent, InjectionReason::Manual, InjectionPriority::Recommended)
                .await
        );
        harness.store.bump_version();
    }
    assert!(
        !harness
            .scheduler
            .schedule_injection(&agent, InjectionReason::Manual, InjectionPriority::Recommended)
            .await
    );
    // Required priority bypasses the rate limit.
    assert!(
        harness
            .scheduler
            .schedule_injection(&agent, InjectionReason::Manual, InjectionPriority::Required)
            .await
    );
}

#[tokio::test]
async fn snapshot_version_is_never_delivered_twice() {
    let harness = harness();
    harness.store.bump_version();
    harness.target.add_running("a-1");
    let mut tracked = brief("a-1", "ws-a", &[]);
    tracked.context_injection_policy = Some(policy(None, None, 0, 100));
    harness.scheduler.register_agent(tracked, ControlMode::Orchestrator);
    let agent = AgentId::new("a-1");

    assert!(
        harness
            .scheduler
            .schedule_injection(&agent, InjectionReason::Manual, InjectionPriority::Recommended)
            .await
    );
    // Same version: dedup rejects, even at required priority.
    assert!(
        !harness
            .scheduler
            .schedule_injection(&agent, InjectionReason::Manual, InjectionPriority::Required)
            .await
    );
    harness.store.bump_version();
    assert!(
        harness
            .scheduler
            .schedule_injection(&agent, InjectionReason::Manual, InjectionPriority::Recommended)
            .await
    );
    assert_eq!(harness.target.delivered().len(), 2);
}

#[tokio::test]
async fn supplementary_injections_respect_the_token_budget() {
    let harness = harness();
    harness.store.bump_version();
    harness.store.set_estimated_tokens(10_000);
    harness.target.add_running("a-1");
    let mut tracked = brief("a-1", "ws-a", &[]);
    tracked.session_policy = SessionPolicy {
        max_turns: None,
        context_budget_tokens: Some(1_000),
    };
    tracked.context_injection_policy = Some(policy(None, None, 0, 100));
    harness.scheduler.register_agent(tracked, ControlMode::Orchestrator);
    let agent = AgentId::new("a-1");

    assert!(
        !harness
            .scheduler
            .schedule_injection(&agent, InjectionReason::Manual, InjectionPriority::Supplementary)
            .await
    );
    // Recommended priority ignores the budget.
    assert!(
        harness
            .scheduler
            .schedule_injection(&agent, InjectionReason::Manual, InjectionPriority::Recommended)
            .await
    );
}

#[tokio::test]
async fn non_running_agents_are_skipped() {
    let harness = harness();
    harness.store.bump_version();
    harness.target.add_running("a-1");
    harness.target.set_status("a-1", AgentStatus::Paused);
    let mut tracked = brief("a-1", "ws-a", &[]);
    tracked.context_injection_policy = Some(policy(None, None, 0, 100));
    harness.scheduler.register_agent(tracked, ControlMode::Orchestrator);

    assert!(
        !harness
            .scheduler
            .schedule_injection(
                &AgentId::new("a-1"),
                InjectionReason::Manual,
                InjectionPriority::Required
            )
            .await
    );
    assert!(
        !harness
            .scheduler
            .schedule_injection(
                &AgentId::new("unregistered"),
                InjectionReason::Manual,
                InjectionPriority::Required
            )
            .await
    );
}

#[tokio::test]
async fn failed_delivery_leaves_tracking_untouched() {
    let harness = harness();
    harness.store.bump_version();
    harness.target.add_running("a-1");
    harness.target.fail.store(true, Ordering::SeqCst);
    let mut tracked = brief("a-1", "ws-a", &[]);
    tracked.context_injection_policy = Some(policy(None, None, 0, 100));
    harness.scheduler.register_agent(tracked, ControlMode::Orchestrator);
    let agent = AgentId::new("a-1");

    assert!(
        !harness
            .scheduler
            .schedule_injection(&agent, InjectionReason::Manual, InjectionPriority::Recommended)
            .await
    );
    // The failed attempt did not mark the version delivered.
    harness.target.fail.store(false, Ordering::SeqCst);
    assert!(
        harness
            .scheduler
            .schedule_injection(&agent, InjectionReason::Manual, InjectionPriority::Recommended)
            .await
    );
}

// ============================================================================
// SECTION: Periodic and Reactive Triggers
// ============================================================================

#[test]
fn periodic_trigger_fires_when_the_interval_elapses() {
    let harness = harness();
    harness.target.add_running("a-1");
    let mut tracked = brief("a-1", "ws-a", &[]);
    tracked.context_injection_policy = Some(policy(Some(10), None, 0, 100));
    harness.scheduler.register_agent(tracked, ControlMode::Orchestrator);

    assert!(harness.scheduler.due_periodic(overseer_core::Tick::new(9)).is_empty());
    let due = harness.scheduler.due_periodic(overseer_core::Tick::new(10));
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].reason, InjectionReason::Periodic);
}

#[test]
fn reactive_delivery_is_flagged_as_delta() {
    let harness = harness();
    harness.store.bump_version();
    harness.target.add_running("a-1");
    let mut tracked = brief("a-1", "ws-a", &[]);
    tracked.context_injection_policy = Some(policy(None, None, 0, 100));
    harness.scheduler.register_agent(tracked, ControlMode::Orchestrator);

    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
    let delivered = runtime.block_on(async {
        harness
            .scheduler
            .schedule_injection(
                &AgentId::new("a-1"),
                InjectionReason::Reactive {
                    matched: "artifact_approved".to_string(),
                },
                InjectionPriority::Recommended,
            )
            .await
    });
    assert!(delivered);
    let injections = harness.target.delivered();
    assert!(injections[0].is_delta);
}
