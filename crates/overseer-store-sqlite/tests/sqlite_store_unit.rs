// crates/overseer-store-sqlite/tests/sqlite_store_unit.rs
// ============================================================================
// Module: SQLite Project Store Unit Tests
// Description: Optimistic concurrency, versioning, retention, and queries.
// Purpose: Validate artifact version checks, the global version counter,
//          event idempotency, checkpoint retention, and snapshot assembly.
// ============================================================================

//! ## Overview
//! Unit-level tests for the store invariants:
//! - Optimistic artifact upserts fail with Conflict on stale versions
//! - The global version counter never decreases
//! - Event appends are idempotent on source event id
//! - Checkpoint retention keeps the newest N per agent
//! - Trust reads default to 50 and writes clamp to `[0, 100]`
//! - Coherence issues resolve exactly once

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
    reason = "Test-only assertions and helpers are permitted."
)]

use overseer_core::AgentBrief;
use overseer_core::AgentEvent;
use overseer_core::AgentHandle;
use overseer_core::AgentId;
use overseer_core::AgentStatus;
use overseer_core::ArtifactEvent;
use overseer_core::ArtifactId;
use overseer_core::ArtifactKind;
use overseer_core::ArtifactStatus;
use overseer_core::CoherenceIssue;
use overseer_core::EventEnvelope;
use overseer_core::EventFilter;
use overseer_core::EventKind;
use overseer_core::IssueId;
use overseer_core::IssueKind;
use overseer_core::IssueStatus;
use overseer_core::ProjectConfig;
use overseer_core::ProjectStore;
use overseer_core::Provenance;
use overseer_core::RunId;
use overseer_core::SerializedAgentState;
use overseer_core::SerializedBy;
use overseer_core::SourceEventId;
use overseer_core::StoreError;
use overseer_core::Timestamp;
use overseer_core::WorkstreamId;
use overseer_store_sqlite::SqliteProjectStore;
use overseer_store_sqlite::SqliteStoreConfig;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn store() -> SqliteProjectStore {
    SqliteProjectStore::new(&SqliteStoreConfig::in_memory()).expect("store init")
}

fn artifact_event(id: &str, name: &str) -> ArtifactEvent {
    ArtifactEvent {
        artifact_id: ArtifactId::new(id),
        name: name.to_string(),
        kind: ArtifactKind::Code,
        workstream: WorkstreamId::new("ws-a"),
        status: ArtifactStatus::Draft,
        quality_score: 0.5,
        provenance: Provenance {
            created_by: AgentId::new("a-1"),
            created_at: Timestamp::from_unix_millis(1),
            source_artifact_ids: Vec::new(),
        },
        uri: None,
        mime_type: None,
        size_bytes: None,
        content_hash: None,
    }
}

fn envelope(agent: &str, run: &str, sequence: u64) -> EventEnvelope {
    EventEnvelope {
        source_event_id: SourceEventId::new(format!("evt-{agent}-{run}-{sequence}")),
        source_sequence: sequence,
        source_occurred_at: Timestamp::from_unix_millis(10),
        agent_id: AgentId::new(agent),
        run_id: RunId::new(run),
        ingested_at: Timestamp::from_unix_millis(20 + i64::try_from(sequence).unwrap()),
        event: AgentEvent::Status {
            message: format!("step {sequence}"),
        },
    }
}

fn handle(agent: &str) -> AgentHandle {
    AgentHandle {
        agent_id: AgentId::new(agent),
        plugin_name: "local_http".to_string(),
        status: AgentStatus::Running,
        session_id: None,
    }
}

fn brief(agent: &str, workstream: &str) -> AgentBrief {
    AgentBrief {
        agent_id: AgentId::new(agent),
        role: "builder".to_string(),
        workstream: WorkstreamId::new(workstream),
        readable_workstreams: Vec::new(),
        escalation_protocol: overseer_core::EscalationProtocol::default(),
        allowed_tools: Vec::new(),
        session_policy: overseer_core::SessionPolicy::default(),
        context_injection_policy: None,
        model_preference: None,
        project_brief: None,
        knowledge_snapshot: None,
    }
}

fn serialized_state(agent: &str, last_sequence: u64) -> SerializedAgentState {
    SerializedAgentState {
        agent_id: AgentId::new(agent),
        checkpoint: serde_json::json!({ "turn": last_sequence }),
        brief: brief(agent, "ws-a"),
        last_sequence,
        pending_decision_ids: Vec::new(),
        serialized_by: SerializedBy::Pause,
        serialized_at: Timestamp::from_unix_millis(100),
    }
}

fn issue(id: &str) -> CoherenceIssue {
    CoherenceIssue {
        issue_id: IssueId::new(id),
        kind: IssueKind::Contradiction,
        description: "spec and code disagree".to_string(),
        severity: overseer_core::Severity::High,
        affected_workstreams: vec![WorkstreamId::new("ws-a")],
        affected_artifact_ids: Vec::new(),
        status: IssueStatus::Open,
        raised_by: None,
        raised_at: Timestamp::from_unix_millis(5),
        resolution: None,
    }
}

// ============================================================================
// SECTION: Artifact Versioning
// ============================================================================

#[test]
fn upsert_assigns_version_one_on_create() {
    let store = store();
    let artifact = store.upsert_artifact(&artifact_event("art-1", "api"), 0, None).unwrap();
    assert_eq!(artifact.version, 1);
    assert_eq!(store.artifact_version(&ArtifactId::new("art-1")).unwrap(), 1);
    assert_eq!(store.artifact_version(&ArtifactId::new("missing")).unwrap(), 0);
}

#[test]
fn stale_expected_version_conflicts_and_leaves_state_untouched() {
    let store = store();
    store.upsert_artifact(&artifact_event("art-1", "v1"), 0, None).unwrap();
    // Writer B advances to v2.
    store.upsert_artifact(&artifact_event("art-1", "v2-by-b"), 1, None).unwrap();
    // Writer A still believes v1.
    let error = store.upsert_artifact(&artifact_event("art-1", "v2-by-a"), 1, None).unwrap_err();
    match error {
        StoreError::Conflict {
            expected,
            actual,
        } => {
            assert_eq!(expected, 1);
            assert_eq!(actual, 2);
        }
        other => panic!("expected conflict, got {other}"),
    }
    let stored = store.get_artifact(&ArtifactId::new("art-1")).unwrap().unwrap();
    assert_eq!(stored.name, "v2-by-b");
    assert_eq!(stored.version, 2);
}

#[test]
fn create_against_an_existing_row_conflicts() {
    let store = store();
    store.upsert_artifact(&artifact_event("art-1", "v1"), 0, None).unwrap();
    let error = store.upsert_artifact(&artifact_event("art-1", "again"), 0, None).unwrap_err();
    assert!(matches!(error, StoreError::Conflict { expected: 0, actual: 1 }));
}

#[test]
fn legacy_store_artifact_still_increments_versions() {
    let store = store();
    store.store_artifact(&artifact_event("art-1", "first")).unwrap();
    let second = store.store_artifact(&artifact_event("art-1", "second")).unwrap();
    assert_eq!(second.version, 2);
}

#[test]
fn upserts_record_audit_entries_and_ensure_workstreams() {
    let store = store();
    let caller = AgentId::new("a-1");
    store.upsert_artifact(&artifact_event("art-1", "api"), 0, Some(&caller)).unwrap();
    store.upsert_artifact(&artifact_event("art-1", "api v2"), 1, Some(&caller)).unwrap();
    let log = store.audit_log(Some("artifact"), Some("art-1")).unwrap();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].action, "create");
    assert_eq!(log[1].action, "update");
    assert_eq!(log[0].caller_agent_id.as_ref().unwrap().as_str(), "a-1");
    let workstreams = store.list_workstreams().unwrap();
    assert_eq!(workstreams.len(), 1);
    assert_eq!(workstreams[0].workstream_id.as_str(), "ws-a");
}

// ============================================================================
// SECTION: Global Version Counter
// ============================================================================

#[test]
fn snapshot_versions_are_monotonic_across_mutations() {
    let store = store();
    let mut previous = store.version().unwrap();
    store.upsert_artifact(&artifact_event("art-1", "api"), 0, None).unwrap();
    for step in 0..3 {
        let version = store.version().unwrap();
        assert!(version >= previous);
        previous = version;
        store
            .upsert_artifact(&artifact_event("art-1", "api"), step + 1, None)
            .unwrap();
    }
    store.register_agent(&handle("a-1"), &brief("a-1", "ws-b")).unwrap();
    assert!(store.version().unwrap() > previous);
}

#[test]
fn reads_do_not_bump_the_version() {
    let store = store();
    store.upsert_artifact(&artifact_event("art-1", "api"), 0, None).unwrap();
    let before = store.version().unwrap();
    let _ = store.list_artifacts(None).unwrap();
    let _ = store.snapshot(&[]).unwrap();
    assert_eq!(store.version().unwrap(), before);
}

// ============================================================================
// SECTION: Events
// ============================================================================

#[test]
fn duplicate_event_ids_are_rejected_as_duplicates() {
    let store = store();
    let event = envelope("a-1", "run-1", 1);
    store.append_event(&event).unwrap();
    let error = store.append_event(&event).unwrap_err();
    assert!(matches!(error, StoreError::Duplicate(_)));
}

#[test]
fn event_queries_filter_and_clamp() {
    let store = store();
    for sequence in 1..=5 {
        store.append_event(&envelope("a-1", "run-1", sequence)).unwrap();
    }
    store.append_event(&envelope("a-2", "run-9", 1)).unwrap();

    let all = store.events(&EventFilter::default()).unwrap();
    assert_eq!(all.len(), 6);

    let agent_only = store
        .events(&EventFilter {
            agent_id: Some(AgentId::new("a-1")),
            ..EventFilter::default()
        })
        .unwrap();
    assert_eq!(agent_only.len(), 5);
    // Insertion order is preserved and sequences are strictly increasing.
    let sequences: Vec<u64> = agent_only.iter().map(|event| event.source_sequence).collect();
    assert_eq!(sequences, vec![1, 2, 3, 4, 5]);

    let limited = store
        .events(&EventFilter {
            limit: Some(2),
            ..EventFilter::default()
        })
        .unwrap();
    assert_eq!(limited.len(), 2);

    let typed = store
        .events(&EventFilter {
            types: vec![EventKind::Completion],
            ..EventFilter::default()
        })
        .unwrap();
    assert!(typed.is_empty());
}

// ============================================================================
// SECTION: Checkpoints
// ============================================================================

#[test]
fn checkpoint_retention_keeps_the_newest_n() {
    let store = store();
    let agent = AgentId::new("a-1");
    for step in 1..=5 {
        store.store_checkpoint(&serialized_state("a-1", step), None, 3).unwrap();
    }
    assert_eq!(store.checkpoint_count(&agent).unwrap(), 3);
    let checkpoints = store.checkpoints(&agent).unwrap();
    let sequences: Vec<u64> =
        checkpoints.iter().map(|checkpoint| checkpoint.state.last_sequence).collect();
    // Newest first, oldest pruned.
    assert_eq!(sequences, vec![5, 4, 3]);
    let latest = store.latest_checkpoint(&agent).unwrap().unwrap();
    assert_eq!(latest.state.last_sequence, 5);
}

#[test]
fn checkpoint_retention_is_per_agent() {
    let store = store();
    for step in 1..=4 {
        store.store_checkpoint(&serialized_state("a-1", step), None, 2).unwrap();
    }
    store.store_checkpoint(&serialized_state("a-2", 1), None, 2).unwrap();
    assert_eq!(store.checkpoint_count(&AgentId::new("a-1")).unwrap(), 2);
    assert_eq!(store.checkpoint_count(&AgentId::new("a-2")).unwrap(), 1);
    assert_eq!(store.delete_checkpoints(&AgentId::new("a-1")).unwrap(), 2);
    assert_eq!(store.checkpoint_count(&AgentId::new("a-1")).unwrap(), 0);
}

// ============================================================================
// SECTION: Trust Persistence
// ============================================================================

#[test]
fn trust_defaults_to_fifty_and_clamps() {
    let store = store();
    let agent = AgentId::new("a-1");
    assert_eq!(store.trust_profile(&agent).unwrap().score, 50);
    assert_eq!(store.update_trust(&agent, 60, "big win").unwrap(), 100);
    assert_eq!(store.update_trust(&agent, -250, "catastrophe").unwrap(), 0);
    let mut domains = std::collections::BTreeMap::new();
    domains.insert("code".to_string(), 70);
    store.store_domain_trust_scores(&agent, &domains).unwrap();
    let profile = store.trust_profile(&agent).unwrap();
    assert_eq!(profile.domain_scores.get("code"), Some(&70));
}

// ============================================================================
// SECTION: Coherence
// ============================================================================

#[test]
fn coherence_issues_resolve_exactly_once() {
    let store = store();
    store.store_coherence_issue(&issue("iss-1")).unwrap();
    assert_eq!(store.list_coherence_issues(Some(IssueStatus::Open)).unwrap().len(), 1);

    store.resolve_coherence_issue(&IssueId::new("iss-1"), "deduplicated", None).unwrap();
    let resolved = store.list_coherence_issues(Some(IssueStatus::Resolved)).unwrap();
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].resolution.as_deref(), Some("deduplicated"));

    let error =
        store.resolve_coherence_issue(&IssueId::new("iss-1"), "again", None).unwrap_err();
    assert!(matches!(error, StoreError::Invalid(_)));
    let missing =
        store.resolve_coherence_issue(&IssueId::new("iss-404"), "nope", None).unwrap_err();
    assert!(matches!(missing, StoreError::NotFound(_)));
}

// ============================================================================
// SECTION: Content, Project, Snapshot
// ============================================================================

#[test]
fn artifact_content_round_trips_with_backend_uri() {
    let store = store();
    let agent = AgentId::new("a-1");
    let artifact = ArtifactId::new("art-1");
    let stored =
        store.store_artifact_content(&agent, &artifact, b"fn main() {}", Some("text/x-rust"))
            .unwrap();
    assert_eq!(stored.backend_uri, "artifact://a-1/art-1");
    assert!(stored.stored);
    let content = store.get_artifact_content(&agent, &artifact).unwrap().unwrap();
    assert_eq!(content.content, b"fn main() {}");
    assert_eq!(content.mime_type.as_deref(), Some("text/x-rust"));
    // Re-upload overwrites in place.
    store.store_artifact_content(&agent, &artifact, b"fn main() { run(); }", None).unwrap();
    let replaced = store.get_artifact_content(&agent, &artifact).unwrap().unwrap();
    assert_eq!(replaced.content, b"fn main() { run(); }");
}

#[test]
fn project_config_is_a_single_upserted_row() {
    let store = store();
    assert!(!store.has_project().unwrap());
    let config = ProjectConfig {
        name: "atlas".to_string(),
        description: Some("multi-agent build".to_string()),
        workstreams: vec![overseer_core::WorkstreamPlan {
            workstream_id: WorkstreamId::new("ws-a"),
            name: "backend".to_string(),
            description: None,
        }],
        default_control_mode: Some("adaptive".to_string()),
        settings: None,
        updated_at: Timestamp::from_unix_millis(1),
    };
    store.store_project_config(&config).unwrap();
    assert!(store.has_project().unwrap());
    let loaded = store.project_config().unwrap().unwrap();
    assert_eq!(loaded.name, "atlas");
    // Workstream plans materialize workstream rows.
    assert_eq!(store.list_workstreams().unwrap().len(), 1);
}

#[test]
fn snapshot_reflects_store_contents_and_estimates_tokens() {
    let store = store();
    store.upsert_artifact(&artifact_event("art-1", "api"), 0, None).unwrap();
    store.register_agent(&handle("a-1"), &brief("a-1", "ws-a")).unwrap();
    store.store_coherence_issue(&issue("iss-1")).unwrap();

    let snapshot = store.snapshot(&[]).unwrap();
    assert_eq!(snapshot.version, store.version().unwrap());
    assert_eq!(snapshot.artifact_index.len(), 1);
    assert_eq!(snapshot.active_agents.len(), 1);
    assert_eq!(snapshot.recent_coherence_issues.len(), 1);
    assert!(snapshot.estimated_tokens > 0);

    // Terminal agents drop out of the active list.
    store.update_agent_status(&AgentId::new("a-1"), AgentStatus::Completed).unwrap();
    let snapshot = store.snapshot(&[]).unwrap();
    assert!(snapshot.active_agents.is_empty());
}

#[test]
fn file_backed_store_supports_concurrent_reads() {
    let dir = tempfile::TempDir::new().expect("tempdir");
    let config = SqliteStoreConfig {
        path: dir.path().join("overseer.db"),
        ..SqliteStoreConfig::in_memory()
    };
    let store = std::sync::Arc::new(SqliteProjectStore::new(&config).expect("store init"));
    store.upsert_artifact(&artifact_event("art-1", "api"), 0, None).unwrap();

    let mut readers = Vec::new();
    for _ in 0..4 {
        let store = std::sync::Arc::clone(&store);
        readers.push(std::thread::spawn(move || {
            for _ in 0..25 {
                let artifact = store.get_artifact(&ArtifactId::new("art-1")).unwrap().unwrap();
                assert_eq!(artifact.version, 1);
            }
        }));
    }
    for reader in readers {
        reader.join().expect("reader thread");
    }
}
