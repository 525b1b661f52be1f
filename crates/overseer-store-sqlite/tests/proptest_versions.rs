// crates/overseer-store-sqlite/tests/proptest_versions.rs
// ============================================================================
// Module: Store Versioning Property Tests
// Description: Randomized upsert sequences against version invariants.
// Purpose: Validate that artifact versions climb by exactly one per accepted
//          write and that rejected writes change nothing.
// ============================================================================

//! ## Overview
//! Property tests over the optimistic-concurrency contract:
//! - A successful upsert moves the stored version from `expected` to
//!   `expected + 1`; anything else conflicts with the actual version
//! - The global version counter is monotonically non-decreasing across any
//!   mix of accepted and rejected writes

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

use overseer_core::AgentId;
use overseer_core::ArtifactEvent;
use overseer_core::ArtifactId;
use overseer_core::ArtifactKind;
use overseer_core::ArtifactStatus;
use overseer_core::ProjectStore;
use overseer_core::Provenance;
use overseer_core::StoreError;
use overseer_core::Timestamp;
use overseer_core::WorkstreamId;
use overseer_store_sqlite::SqliteProjectStore;
use overseer_store_sqlite::SqliteStoreConfig;
use proptest::prelude::*;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn event(id: &str) -> ArtifactEvent {
    ArtifactEvent {
        artifact_id: ArtifactId::new(id),
        name: "artifact".to_string(),
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

// ============================================================================
// SECTION: Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn upserts_track_the_optimistic_contract(
        attempts in proptest::collection::vec(0_u64..8, 1..40),
    ) {
        let store = SqliteProjectStore::new(&SqliteStoreConfig::in_memory()).unwrap();
        let id = ArtifactId::new("art-1");
        let mut stored_version = 0_u64;
        let mut global = store.version().unwrap();

        for expected in attempts {
            let outcome = store.upsert_artifact(&event("art-1"), expected, None);
            if expected == stored_version {
                let artifact = outcome.unwrap();
                prop_assert_eq!(artifact.version, expected + 1);
                stored_version = expected + 1;
            } else {
                match outcome.unwrap_err() {
                    StoreError::Conflict { expected: reported, actual } => {
                        prop_assert_eq!(reported, expected);
                        prop_assert_eq!(actual, stored_version);
                    }
                    other => prop_assert!(false, "unexpected error: {other}"),
                }
            }
            prop_assert_eq!(store.artifact_version(&id).unwrap(), stored_version);
            let now = store.version().unwrap();
            prop_assert!(now >= global, "global version regressed");
            global = now;
        }
    }
}
