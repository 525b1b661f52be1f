// crates/overseer-core/tests/trust_unit.rs
// ============================================================================
// Module: Trust Engine Unit Tests
// Description: Scoring rules, diminishing returns, risk weighting, decay.
// Purpose: Validate score bounds, the outcome table, one-sided risk
//          scaling, domain independence, and the idle-decay fixed point.
// ============================================================================

//! ## Overview
//! Unit-level tests for the trust engine invariants:
//! - Scores stay within `[floor, ceiling]` under any outcome sequence
//! - Positive deltas damp past the diminishing-return threshold
//! - Risk weighting scales gains only; losses stay full-strength
//! - Domain scores initialize at the configured initial score
//! - Idle decay converges monotonically onto the effective target

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
use overseer_core::CalibrationProfile;
use overseer_core::OutcomeContext;
use overseer_core::Tick;
use overseer_core::TrustConfig;
use overseer_core::TrustConfigPatch;
use overseer_core::TrustOutcome;
use overseer_core::runtime::TrustEngine;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn agent() -> AgentId {
    AgentId::new("a-1")
}

fn ctx_with_blast(blast: BlastRadius) -> OutcomeContext {
    OutcomeContext {
        blast_radius: Some(blast),
        ..OutcomeContext::default()
    }
}

fn ctx_with_kind(kind: ArtifactKind) -> OutcomeContext {
    OutcomeContext {
        artifact_kinds: vec![kind],
        ..OutcomeContext::default()
    }
}

// ============================================================================
// SECTION: Outcome Table
// ============================================================================

#[test]
fn outcome_table_matches_the_contract() {
    assert_eq!(TrustOutcome::TaskCompletedClean.base_delta(), 3);
    assert_eq!(TrustOutcome::HumanApprovesRecommendedOption.base_delta(), 2);
    assert_eq!(TrustOutcome::HumanApprovesToolCall.base_delta(), 1);
    assert_eq!(TrustOutcome::HumanApprovesAlways.base_delta(), 3);
    assert_eq!(TrustOutcome::HumanRejectsToolCall.base_delta(), -2);
    assert_eq!(TrustOutcome::HumanOverridesAgentDecision.base_delta(), -3);
    assert_eq!(TrustOutcome::CoherenceIssueFromThisAgent.base_delta(), -2);
}

#[test]
fn apply_outcome_moves_the_global_score() {
    let engine = TrustEngine::new(TrustConfig::default());
    engine.register_agent(&agent(), Tick::ZERO);
    let delta = engine.apply_outcome(
        &agent(),
        TrustOutcome::TaskCompletedClean,
        Tick::new(1),
        &OutcomeContext::default(),
    );
    assert_eq!(delta, 3);
    assert_eq!(engine.score(&agent()), 53);
}

#[test]
fn unknown_agents_read_the_initial_score() {
    let engine = TrustEngine::new(TrustConfig::default());
    assert_eq!(engine.score(&AgentId::new("never-seen")), 50);
}

// ============================================================================
// SECTION: Bounds and Damping
// ============================================================================

#[test]
fn scores_stay_within_floor_and_ceiling() {
    let engine = TrustEngine::new(TrustConfig::default());
    engine.register_agent(&agent(), Tick::ZERO);
    for tick in 0..200 {
        engine.apply_outcome(
            &agent(),
            TrustOutcome::HumanOverridesAgentDecision,
            Tick::new(tick),
            &OutcomeContext::default(),
        );
        assert!(engine.score(&agent()) >= 0);
    }
    assert_eq!(engine.score(&agent()), 0);
    for tick in 200..600 {
        engine.apply_outcome(
            &agent(),
            TrustOutcome::TaskCompletedClean,
            Tick::new(tick),
            &OutcomeContext::default(),
        );
        assert!(engine.score(&agent()) <= 100);
    }
    assert_eq!(engine.score(&agent()), 100);
}

#[test]
fn positive_deltas_halve_past_the_diminishing_threshold() {
    let engine = TrustEngine::new(TrustConfig::default());
    engine.register_agent(&agent(), Tick::ZERO);
    engine.reconfigure(&TrustConfigPatch {
        diminishing_return_threshold: Some(52),
        ..TrustConfigPatch::default()
    });
    // 50 + 3 would cross 52, so the delta halves (floor) to 1.
    let delta = engine.apply_outcome(
        &agent(),
        TrustOutcome::TaskCompletedClean,
        Tick::new(1),
        &OutcomeContext::default(),
    );
    assert_eq!(delta, 1);
    assert_eq!(engine.score(&agent()), 51);
}

#[test]
fn risk_weighting_scales_gains_only() {
    let engine = TrustEngine::new(TrustConfig {
        risk_weighting_enabled: true,
        ..TrustConfig::default()
    });
    engine.register_agent(&agent(), Tick::ZERO);

    // +3 at trivial (0.5) floors to +1.
    let gain = engine.apply_outcome(
        &agent(),
        TrustOutcome::TaskCompletedClean,
        Tick::new(1),
        &ctx_with_blast(BlastRadius::Trivial),
    );
    assert_eq!(gain, 1);

    // -3 at trivial stays -3: losses are never scaled down.
    let loss = engine.apply_outcome(
        &agent(),
        TrustOutcome::HumanOverridesAgentDecision,
        Tick::new(2),
        &ctx_with_blast(BlastRadius::Trivial),
    );
    assert_eq!(loss, -3);

    // +2 at large (1.5) floors to +3.
    let amplified = engine.apply_outcome(
        &agent(),
        TrustOutcome::HumanApprovesRecommendedOption,
        Tick::new(3),
        &ctx_with_blast(BlastRadius::Large),
    );
    assert_eq!(amplified, 3);
}

// ============================================================================
// SECTION: Domains
// ============================================================================

#[test]
fn domain_scores_initialize_at_the_initial_score() {
    let engine = TrustEngine::new(TrustConfig::default());
    engine.register_agent(&agent(), Tick::ZERO);
    // Drive the global score away from the initial value first.
    for tick in 0..5 {
        engine.apply_outcome(
            &agent(),
            TrustOutcome::TaskCompletedClean,
            Tick::new(tick),
            &OutcomeContext::default(),
        );
    }
    assert_eq!(engine.score(&agent()), 65);

    // First domain outcome starts from 50, not 65.
    engine.apply_outcome(
        &agent(),
        TrustOutcome::HumanApprovesToolCall,
        Tick::new(6),
        &ctx_with_kind(ArtifactKind::Code),
    );
    assert_eq!(engine.domain_score(&agent(), ArtifactKind::Code), Some(51));
    assert_eq!(engine.domain_score(&agent(), ArtifactKind::Doc), None);
}

#[test]
fn domain_log_drains_per_agent() {
    let engine = TrustEngine::new(TrustConfig::default());
    engine.apply_outcome(
        &AgentId::new("a-1"),
        TrustOutcome::HumanApprovesToolCall,
        Tick::new(1),
        &ctx_with_kind(ArtifactKind::Code),
    );
    engine.apply_outcome(
        &AgentId::new("a-2"),
        TrustOutcome::HumanApprovesToolCall,
        Tick::new(1),
        &ctx_with_kind(ArtifactKind::Test),
    );
    let drained = engine.flush_domain_log(&AgentId::new("a-1"));
    assert_eq!(drained.len(), 1);
    assert_eq!(drained[0].domain, ArtifactKind::Code);
    // Second flush is empty; the other agent's records remain.
    assert!(engine.flush_domain_log(&AgentId::new("a-1")).is_empty());
    assert_eq!(engine.flush_domain_log(&AgentId::new("a-2")).len(), 1);
}

// ============================================================================
// SECTION: Decay
// ============================================================================

#[test]
fn idle_decay_converges_onto_the_ceiling_capped_target() {
    let engine = TrustEngine::new(TrustConfig {
        initial_score: 55,
        decay_target_score: 50,
        decay_ceiling: 45,
        inactivity_threshold_ticks: 2,
        decay_rate_per_tick: 1,
        ..TrustConfig::default()
    });
    engine.register_agent(&agent(), Tick::ZERO);

    let mut previous = engine.score(&agent());
    for tick in 1..=20 {
        engine.on_tick(Tick::new(tick));
        let current = engine.score(&agent());
        assert!(current <= previous, "decay must be monotonic");
        assert!(current >= 45, "decay must clamp at the effective target");
        previous = current;
    }
    assert_eq!(engine.score(&agent()), 45);

    // Further ticks hold the fixed point.
    engine.on_tick(Tick::new(21));
    engine.on_tick(Tick::new(22));
    assert_eq!(engine.score(&agent()), 45);
}

#[test]
fn active_agents_do_not_decay() {
    let engine = TrustEngine::new(TrustConfig {
        initial_score: 60,
        inactivity_threshold_ticks: 3,
        ..TrustConfig::default()
    });
    engine.register_agent(&agent(), Tick::ZERO);
    // Activity at every tick keeps the idle window below the threshold.
    for tick in 1..=10 {
        engine.apply_outcome(
            &agent(),
            TrustOutcome::CheckpointClean,
            Tick::new(tick),
            &OutcomeContext::default(),
        );
        engine.on_tick(Tick::new(tick));
    }
    assert!(engine.score(&agent()) > 60);
}

#[test]
fn decay_rises_toward_the_target_from_below() {
    let engine = TrustEngine::new(TrustConfig {
        initial_score: 40,
        decay_target_score: 50,
        decay_ceiling: 50,
        inactivity_threshold_ticks: 0,
        ..TrustConfig::default()
    });
    engine.register_agent(&agent(), Tick::ZERO);
    for tick in 1..=15 {
        engine.on_tick(Tick::new(tick));
    }
    assert_eq!(engine.score(&agent()), 50);
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

#[test]
fn reconfigure_merges_without_touching_scores() {
    let engine = TrustEngine::new(TrustConfig::default());
    engine.register_agent(&agent(), Tick::ZERO);
    engine.apply_outcome(
        &agent(),
        TrustOutcome::TaskCompletedClean,
        Tick::new(1),
        &OutcomeContext::default(),
    );
    let before = engine.score(&agent());
    engine.reconfigure(&TrustConfigPatch {
        initial_score: Some(10),
        decay_rate_per_tick: Some(5),
        ..TrustConfigPatch::default()
    });
    assert_eq!(engine.score(&agent()), before);
    assert_eq!(engine.config().initial_score, 10);
    assert_eq!(engine.config().decay_rate_per_tick, 5);
}

#[test]
fn calibration_profiles_apply_wholesale() {
    let engine = TrustEngine::new(TrustConfig::default());
    engine.apply_profile(CalibrationProfile::Conservative);
    let config = engine.config();
    assert!(config.risk_weighting_enabled);
    assert_eq!(config.initial_score, 40);
    assert_eq!(config.diminishing_return_threshold, 75);

    engine.apply_profile(CalibrationProfile::Permissive);
    let config = engine.config();
    assert!(!config.risk_weighting_enabled);
    assert_eq!(config.initial_score, 60);
}
