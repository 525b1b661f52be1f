// crates/overseer-core/tests/proptest_trust.rs
// ============================================================================
// Module: Trust Engine Property Tests
// Description: Randomized outcome/decay interleavings against score bounds.
// Purpose: Validate that no sequence of outcomes and idle ticks ever pushes
//          a score outside [floor, ceiling] or past the decay target.
// ============================================================================

//! ## Overview
//! Property tests over the trust engine:
//! - Scores stay within `[floor, ceiling]` under arbitrary interleavings of
//!   outcomes, decay ticks, and risk-weighted contexts
//! - Pure decay is monotone toward the effective target and never
//!   overshoots it

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
use overseer_core::ArtifactKind;
use overseer_core::BlastRadius;
use overseer_core::OutcomeContext;
use overseer_core::Tick;
use overseer_core::TrustConfig;
use overseer_core::TrustOutcome;
use overseer_core::runtime::TrustEngine;
use proptest::prelude::*;

// ============================================================================
// SECTION: Strategies
// ============================================================================

fn outcome_strategy() -> impl Strategy<Value = TrustOutcome> {
    prop_oneof![
        Just(TrustOutcome::TaskCompletedClean),
        Just(TrustOutcome::TaskCompletedWithIssues),
        Just(TrustOutcome::HumanApprovesRecommendedOption),
        Just(TrustOutcome::HumanApprovesToolCall),
        Just(TrustOutcome::HumanApprovesAlways),
        Just(TrustOutcome::HumanRejectsToolCall),
        Just(TrustOutcome::HumanOverridesAgentDecision),
        Just(TrustOutcome::CoherenceIssueFromThisAgent),
        Just(TrustOutcome::AgentError),
        Just(TrustOutcome::GuardrailTriggered),
        Just(TrustOutcome::CheckpointClean),
    ]
}

fn blast_strategy() -> impl Strategy<Value = Option<BlastRadius>> {
    prop_oneof![
        Just(None),
        Just(Some(BlastRadius::Trivial)),
        Just(Some(BlastRadius::Small)),
        Just(Some(BlastRadius::Medium)),
        Just(Some(BlastRadius::Large)),
        Just(Some(BlastRadius::Unknown)),
    ]
}

/// One randomized step: an outcome application or an idle decay tick.
#[derive(Debug, Clone)]
enum Step {
    Outcome(TrustOutcome, Option<BlastRadius>, bool),
    Decay,
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        (outcome_strategy(), blast_strategy(), any::<bool>())
            .prop_map(|(outcome, blast, with_domain)| Step::Outcome(outcome, blast, with_domain)),
        Just(Step::Decay),
    ]
}

// ============================================================================
// SECTION: Properties
// ============================================================================

proptest! {
    #[test]
    fn scores_never_leave_the_configured_bounds(
        steps in proptest::collection::vec(step_strategy(), 1..120),
        risk_weighting in any::<bool>(),
    ) {
        let engine = TrustEngine::new(TrustConfig {
            risk_weighting_enabled: risk_weighting,
            ..TrustConfig::default()
        });
        let agent = AgentId::new("a-1");
        engine.register_agent(&agent, Tick::ZERO);

        let mut tick = 0_u64;
        for step in steps {
            tick += 1;
            match step {
                Step::Outcome(outcome, blast_radius, with_domain) => {
                    let context = OutcomeContext {
                        blast_radius,
                        artifact_kinds: if with_domain {
                            vec![ArtifactKind::Code]
                        } else {
                            Vec::new()
                        },
                        workstreams: Vec::new(),
                        tool_category: None,
                    };
                    engine.apply_outcome(&agent, outcome, Tick::new(tick), &context);
                }
                Step::Decay => engine.on_tick(Tick::new(tick)),
            }
            let score = engine.score(&agent);
            prop_assert!((0..=100).contains(&score), "global score {score} out of bounds");
            if let Some(domain) = engine.domain_score(&agent, ArtifactKind::Code) {
                prop_assert!((0..=100).contains(&domain), "domain score {domain} out of bounds");
            }
        }
    }

    #[test]
    fn pure_decay_is_monotone_and_stops_at_the_target(
        initial in 0_i64..=100,
        target in 0_i64..=100,
        ceiling in 0_i64..=100,
        ticks in 1_u64..200,
    ) {
        let engine = TrustEngine::new(TrustConfig {
            initial_score: initial,
            decay_target_score: target,
            decay_ceiling: ceiling,
            inactivity_threshold_ticks: 0,
            decay_rate_per_tick: 1,
            ..TrustConfig::default()
        });
        let agent = AgentId::new("a-1");
        engine.register_agent(&agent, Tick::ZERO);
        let effective_target = target.min(ceiling).max(0);

        let mut previous = engine.score(&agent);
        for tick in 1..=ticks {
            engine.on_tick(Tick::new(tick));
            let current = engine.score(&agent);
            if previous > effective_target {
                prop_assert!(current <= previous && current >= effective_target);
            } else if previous < effective_target {
                prop_assert!(current >= previous && current <= effective_target);
            } else {
                prop_assert_eq!(current, effective_target);
            }
            previous = current;
        }
        if ticks >= 100 {
            prop_assert_eq!(engine.score(&agent), effective_target);
        }
    }
}
