// crates/overseer-core/src/runtime/trust.rs
// ============================================================================
// Module: Overseer Trust Engine
// Description: Global and per-domain trust scoring with decay and risk weighting.
// Purpose: Turn observed outcomes into bounded trust scores per agent.
// Dependencies: crate::core::{artifact, identifiers, risk, time, trust}
// ============================================================================

//! ## Overview
//! The trust engine keeps one global score per agent plus a score per
//! artifact-kind domain the agent has acted in. Outcome deltas come from the
//! fixed table in [`crate::core::trust`]; positive deltas are damped past the
//! diminishing-return threshold and optionally scaled by blast radius.
//! Negative deltas always apply at full strength. Idle agents decay toward a
//! ceiling-capped target, one step per tick, with independent activity
//! clocks per domain. Everything serializes through one mutex.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::core::AgentId;
use crate::core::ArtifactKind;
use crate::core::BlastRadius;
use crate::core::CalibrationProfile;
use crate::core::DomainOutcomeRecord;
use crate::core::OutcomeContext;
use crate::core::Tick;
use crate::core::TrustConfig;
use crate::core::TrustConfigPatch;
use crate::core::TrustOutcome;

// ============================================================================
// SECTION: Engine State
// ============================================================================

/// One tracked score with its activity clock.
#[derive(Debug, Clone, Copy)]
struct ScoredEntry {
    /// Current score.
    score: i64,
    /// Tick of the last outcome applied to this score.
    last_activity_tick: Tick,
}

/// Per-agent trust state.
#[derive(Debug, Clone)]
struct AgentTrust {
    /// Global score entry.
    global: ScoredEntry,
    /// Domain entries keyed by artifact kind.
    domains: BTreeMap<ArtifactKind, ScoredEntry>,
}

/// State guarded by the engine mutex.
struct TrustInner {
    /// Active configuration.
    config: TrustConfig,
    /// Tracked agents.
    agents: BTreeMap<AgentId, AgentTrust>,
    /// Domain outcome log drained by resolvers for auditing.
    domain_log: Vec<DomainOutcomeRecord>,
}

/// Trust engine.
///
/// # Invariants
/// - Every score stays within `[floor_score, ceiling_score]` at all times.
/// - Reconfiguration never retroactively adjusts current scores.
pub struct TrustEngine {
    /// Guarded engine state.
    inner: Mutex<TrustInner>,
}

impl TrustEngine {
    /// Creates an engine with the given configuration.
    #[must_use]
    pub fn new(config: TrustConfig) -> Self {
        Self {
            inner: Mutex::new(TrustInner {
                config,
                agents: BTreeMap::new(),
                domain_log: Vec::new(),
            }),
        }
    }

    /// Locks the inner state, recovering from poisoning.
    fn lock(&self) -> std::sync::MutexGuard<'_, TrustInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// Registers an agent at the initial score. Re-registration keeps the
    /// existing scores.
    pub fn register_agent(&self, agent_id: &AgentId, tick: Tick) {
        let mut inner = self.lock();
        let initial = inner.config.initial_score;
        inner.agents.entry(agent_id.clone()).or_insert_with(|| AgentTrust {
            global: ScoredEntry {
                score: initial,
                last_activity_tick: tick,
            },
            domains: BTreeMap::new(),
        });
    }

    /// Removes an agent's tracked scores.
    pub fn remove_agent(&self, agent_id: &AgentId) {
        self.lock().agents.remove(agent_id);
    }

    // ------------------------------------------------------------------
    // Outcome application
    // ------------------------------------------------------------------

    /// Applies an outcome to the agent's global score and to every domain in
    /// the context. Unregistered agents are registered implicitly. Returns
    /// the effective delta applied to the global score.
    pub fn apply_outcome(
        &self,
        agent_id: &AgentId,
        outcome: TrustOutcome,
        tick: Tick,
        ctx: &OutcomeContext,
    ) -> i64 {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let config = inner.config.clone();
        let initial = config.initial_score;
        let agent = inner.agents.entry(agent_id.clone()).or_insert_with(|| AgentTrust {
            global: ScoredEntry {
                score: initial,
                last_activity_tick: tick,
            },
            domains: BTreeMap::new(),
        });

        let raw = outcome.base_delta();
        let effective =
            effective_delta(agent.global.score, raw, &config, ctx.blast_radius);
        agent.global.score = clamp(agent.global.score + effective, &config);
        agent.global.last_activity_tick = tick;

        let mut domain_records = Vec::new();
        for kind in &ctx.artifact_kinds {
            // First use of a domain starts at the configured initial score,
            // independent of the agent's current global score.
            let entry = agent.domains.entry(*kind).or_insert(ScoredEntry {
                score: initial,
                last_activity_tick: tick,
            });
            let domain_delta = effective_delta(entry.score, raw, &config, ctx.blast_radius);
            entry.score = clamp(entry.score + domain_delta, &config);
            entry.last_activity_tick = tick;
            domain_records.push(DomainOutcomeRecord {
                agent_id: agent_id.clone(),
                domain: *kind,
                outcome,
                delta: domain_delta,
                tick,
            });
        }
        inner.domain_log.append(&mut domain_records);
        effective
    }

    // ------------------------------------------------------------------
    // Decay
    // ------------------------------------------------------------------

    /// Tick subscriber: steps every idle score one decay increment toward
    /// the effective target. Domain scores decay independently on their own
    /// activity clocks. Agents active within the threshold are skipped.
    pub fn on_tick(&self, tick: Tick) {
        let mut inner = self.lock();
        let config = inner.config.clone();
        let target = effective_decay_target(&config);
        for agent in inner.agents.values_mut() {
            if tick.since(agent.global.last_activity_tick) > config.inactivity_threshold_ticks {
                agent.global.score = step_toward(agent.global.score, target, &config);
            }
            for entry in agent.domains.values_mut() {
                if tick.since(entry.last_activity_tick) > config.inactivity_threshold_ticks {
                    entry.score = step_toward(entry.score, target, &config);
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    /// Merges a partial configuration. Current scores are untouched.
    pub fn reconfigure(&self, patch: &TrustConfigPatch) {
        let mut inner = self.lock();
        inner.config = inner.config.clone().merged(patch);
    }

    /// Applies a named calibration profile wholesale.
    pub fn apply_profile(&self, profile: CalibrationProfile) {
        self.reconfigure(&profile.patch());
    }

    /// Returns the active configuration.
    #[must_use]
    pub fn config(&self) -> TrustConfig {
        self.lock().config.clone()
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Returns the agent's global score (initial score when untracked).
    #[must_use]
    pub fn score(&self, agent_id: &AgentId) -> i64 {
        let inner = self.lock();
        inner
            .agents
            .get(agent_id)
            .map_or(inner.config.initial_score, |agent| agent.global.score)
    }

    /// Returns a domain score, when the agent has acted in that domain.
    #[must_use]
    pub fn domain_score(&self, agent_id: &AgentId, kind: ArtifactKind) -> Option<i64> {
        let inner = self.lock();
        inner.agents.get(agent_id)?.domains.get(&kind).map(|entry| entry.score)
    }

    /// Returns every domain score for an agent, keyed by kind label.
    #[must_use]
    pub fn domain_scores(&self, agent_id: &AgentId) -> BTreeMap<String, i64> {
        let inner = self.lock();
        inner.agents.get(agent_id).map_or_else(BTreeMap::new, |agent| {
            agent
                .domains
                .iter()
                .map(|(kind, entry)| (kind.as_str().to_string(), entry.score))
                .collect()
        })
    }

    /// Returns the global score of every tracked agent.
    #[must_use]
    pub fn all_scores(&self) -> BTreeMap<AgentId, i64> {
        let inner = self.lock();
        inner.agents.iter().map(|(id, agent)| (id.clone(), agent.global.score)).collect()
    }

    /// Returns the domain scores of every tracked agent.
    #[must_use]
    pub fn all_domain_scores(&self) -> BTreeMap<AgentId, BTreeMap<String, i64>> {
        let inner = self.lock();
        inner
            .agents
            .iter()
            .map(|(id, agent)| {
                let domains = agent
                    .domains
                    .iter()
                    .map(|(kind, entry)| (kind.as_str().to_string(), entry.score))
                    .collect();
                (id.clone(), domains)
            })
            .collect()
    }

    /// Drains the accumulated domain outcome log for one agent.
    #[must_use]
    pub fn flush_domain_log(&self, agent_id: &AgentId) -> Vec<DomainOutcomeRecord> {
        let mut inner = self.lock();
        let (drained, kept): (Vec<_>, Vec<_>) =
            inner.domain_log.drain(..).partition(|record| record.agent_id == *agent_id);
        inner.domain_log = kept;
        drained
    }
}

impl std::fmt::Debug for TrustEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustEngine").finish_non_exhaustive()
    }
}

// ============================================================================
// SECTION: Scoring Rules
// ============================================================================

/// Clamps a score to the configured bounds.
const fn clamp(score: i64, config: &TrustConfig) -> i64 {
    if score < config.floor_score {
        config.floor_score
    } else if score > config.ceiling_score {
        config.ceiling_score
    } else {
        score
    }
}

/// Computes the effective delta for one score: diminishing returns first,
/// then risk weighting. Both rules touch positive deltas only; losses apply
/// at full strength regardless of blast radius.
fn effective_delta(
    score: i64,
    raw: i64,
    config: &TrustConfig,
    blast_radius: Option<BlastRadius>,
) -> i64 {
    let mut delta = raw;
    if delta > 0 && score + delta > config.diminishing_return_threshold {
        delta = scale_floor(delta, config.diminishing_return_factor);
    }
    if delta > 0
        && config.risk_weighting_enabled
        && let Some(radius) = blast_radius
    {
        delta = scale_floor(delta, config.risk_weight_map.weight(radius));
    }
    delta
}

/// Multiplies a positive delta by a factor, flooring the result.
fn scale_floor(delta: i64, factor: f64) -> i64 {
    // Deltas are single-digit table values; f64 holds them exactly.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        reason = "Deltas are small table constants; the floor result fits i64."
    )]
    let scaled = ((delta as f64) * factor).floor() as i64;
    scaled
}

/// Returns the decay target after applying the ceiling and floor caps.
const fn effective_decay_target(config: &TrustConfig) -> i64 {
    let capped = if config.decay_target_score < config.decay_ceiling {
        config.decay_target_score
    } else {
        config.decay_ceiling
    };
    if capped < config.floor_score { config.floor_score } else { capped }
}

/// Steps a score one decay increment toward the target, clamping at it.
const fn step_toward(score: i64, target: i64, config: &TrustConfig) -> i64 {
    let rate = config.decay_rate_per_tick;
    if score > target {
        let stepped = score - rate;
        if stepped < target { target } else { stepped }
    } else if score < target {
        let stepped = score + rate;
        if stepped > target { target } else { stepped }
    } else {
        score
    }
}
