// crates/overseer-core/src/core/trust.rs
// ============================================================================
// Module: Overseer Trust Model
// Description: Trust outcomes, configuration bundle, and calibration profiles.
// Purpose: Model the data that drives the trust engine's scoring rules.
// Dependencies: serde, crate::core::{artifact, identifiers, risk, time}
// ============================================================================

//! ## Overview
//! Trust scores are integers in `[floor, ceiling]` (default `[0, 100]`,
//! initial 50) tracked globally and per artifact-kind domain. The outcome
//! table maps observed events and human verdicts to deltas; diminishing
//! returns damp gains near the top of the range, risk weighting scales gains
//! (never losses) by blast radius, and idle scores decay toward a
//! ceiling-capped target.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::artifact::ArtifactKind;
use crate::core::identifiers::AgentId;
use crate::core::identifiers::WorkstreamId;
use crate::core::risk::BlastRadius;
use crate::core::time::Tick;

// ============================================================================
// SECTION: Outcomes
// ============================================================================

/// Observed outcome that adjusts trust.
///
/// # Invariants
/// - Variants are stable for serialization and audit records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustOutcome {
    /// Agent completed its assignment cleanly.
    TaskCompletedClean,
    /// Agent completed with known issues.
    TaskCompletedWithIssues,
    /// Human approved the agent's recommended option.
    HumanApprovesRecommendedOption,
    /// Human approved a gated tool call.
    HumanApprovesToolCall,
    /// Human approved with a standing always-allow.
    HumanApprovesAlways,
    /// Human rejected a gated tool call.
    HumanRejectsToolCall,
    /// Human overrode the agent's decision with their own.
    HumanOverridesAgentDecision,
    /// A coherence issue was traced to this agent.
    CoherenceIssueFromThisAgent,
    /// Agent reported an error event.
    AgentError,
    /// A guardrail fired inside the agent's sandbox.
    GuardrailTriggered,
    /// Agent produced a clean checkpoint.
    CheckpointClean,
}

impl TrustOutcome {
    /// Returns the base delta for the outcome.
    #[must_use]
    pub const fn base_delta(self) -> i64 {
        match self {
            Self::TaskCompletedClean | Self::HumanApprovesAlways => 3,
            Self::HumanApprovesRecommendedOption => 2,
            Self::TaskCompletedWithIssues | Self::HumanApprovesToolCall | Self::CheckpointClean => {
                1
            }
            Self::AgentError => -1,
            Self::HumanRejectsToolCall
            | Self::CoherenceIssueFromThisAgent
            | Self::GuardrailTriggered => -2,
            Self::HumanOverridesAgentDecision => -3,
        }
    }

    /// Returns a stable label for the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TaskCompletedClean => "task_completed_clean",
            Self::TaskCompletedWithIssues => "task_completed_with_issues",
            Self::HumanApprovesRecommendedOption => "human_approves_recommended_option",
            Self::HumanApprovesToolCall => "human_approves_tool_call",
            Self::HumanApprovesAlways => "human_approves_always",
            Self::HumanRejectsToolCall => "human_rejects_tool_call",
            Self::HumanOverridesAgentDecision => "human_overrides_agent_decision",
            Self::CoherenceIssueFromThisAgent => "coherence_issue_from_this_agent",
            Self::AgentError => "agent_error",
            Self::GuardrailTriggered => "guardrail_triggered",
            Self::CheckpointClean => "checkpoint_clean",
        }
    }
}

/// Context accompanying an outcome application.
///
/// # Invariants
/// - `artifact_kinds` selects the domain scores that also receive the delta.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeContext {
    /// Blast radius of the action, for risk weighting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blast_radius: Option<BlastRadius>,
    /// Artifact kinds (domains) touched by the action.
    #[serde(default)]
    pub artifact_kinds: Vec<ArtifactKind>,
    /// Workstreams touched by the action.
    #[serde(default)]
    pub workstreams: Vec<WorkstreamId>,
    /// Tool category, when the outcome stems from a tool approval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_category: Option<String>,
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Risk weights applied to positive deltas by blast radius.
///
/// # Invariants
/// - Weights scale gains only; losses always apply at full strength.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskWeightMap {
    /// Weight for trivial blast radius.
    pub trivial: f64,
    /// Weight for small blast radius.
    pub small: f64,
    /// Weight for medium blast radius.
    pub medium: f64,
    /// Weight for large blast radius.
    pub large: f64,
    /// Weight when the blast radius is unknown.
    pub unknown: f64,
}

impl RiskWeightMap {
    /// Returns the weight for a blast radius.
    #[must_use]
    pub const fn weight(&self, radius: BlastRadius) -> f64 {
        match radius {
            BlastRadius::Trivial => self.trivial,
            BlastRadius::Small => self.small,
            BlastRadius::Medium => self.medium,
            BlastRadius::Large => self.large,
            BlastRadius::Unknown => self.unknown,
        }
    }
}

impl Default for RiskWeightMap {
    fn default() -> Self {
        Self {
            trivial: 0.5,
            small: 0.75,
            medium: 1.0,
            large: 1.5,
            unknown: 1.0,
        }
    }
}

/// Trust engine configuration bundle.
///
/// # Invariants
/// - `floor_score <= initial_score <= ceiling_score`.
/// - Reconfiguration never retroactively adjusts existing scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustConfig {
    /// Score assigned at registration and first domain use.
    pub initial_score: i64,
    /// Lower clamp bound.
    pub floor_score: i64,
    /// Upper clamp bound.
    pub ceiling_score: i64,
    /// Target idle scores decay toward.
    pub decay_target_score: i64,
    /// Upper cap applied to the decay target.
    pub decay_ceiling: i64,
    /// Idle ticks before decay starts.
    pub inactivity_threshold_ticks: u64,
    /// Score points moved per decayed tick.
    pub decay_rate_per_tick: i64,
    /// Score above which positive deltas are damped.
    pub diminishing_return_threshold: i64,
    /// Damping factor applied past the threshold.
    pub diminishing_return_factor: f64,
    /// Whether positive deltas are scaled by blast radius.
    pub risk_weighting_enabled: bool,
    /// Per-radius weights used when risk weighting is enabled.
    pub risk_weight_map: RiskWeightMap,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            initial_score: 50,
            floor_score: 0,
            ceiling_score: 100,
            decay_target_score: 50,
            decay_ceiling: 50,
            inactivity_threshold_ticks: 0,
            decay_rate_per_tick: 1,
            diminishing_return_threshold: 90,
            diminishing_return_factor: 0.5,
            risk_weighting_enabled: false,
            risk_weight_map: RiskWeightMap::default(),
        }
    }
}

/// Partial trust configuration merged by `reconfigure`.
///
/// # Invariants
/// - Absent fields keep the current configuration value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TrustConfigPatch {
    /// Replacement initial score.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_score: Option<i64>,
    /// Replacement floor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor_score: Option<i64>,
    /// Replacement ceiling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ceiling_score: Option<i64>,
    /// Replacement decay target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decay_target_score: Option<i64>,
    /// Replacement decay ceiling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decay_ceiling: Option<i64>,
    /// Replacement inactivity threshold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inactivity_threshold_ticks: Option<u64>,
    /// Replacement decay rate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decay_rate_per_tick: Option<i64>,
    /// Replacement diminishing-return threshold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diminishing_return_threshold: Option<i64>,
    /// Replacement diminishing-return factor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diminishing_return_factor: Option<f64>,
    /// Replacement risk-weighting switch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_weighting_enabled: Option<bool>,
    /// Replacement risk weight map.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_weight_map: Option<RiskWeightMap>,
}

impl TrustConfig {
    /// Merges a patch into the configuration.
    #[must_use]
    pub fn merged(mut self, patch: &TrustConfigPatch) -> Self {
        if let Some(value) = patch.initial_score {
            self.initial_score = value;
        }
        if let Some(value) = patch.floor_score {
            self.floor_score = value;
        }
        if let Some(value) = patch.ceiling_score {
            self.ceiling_score = value;
        }
        if let Some(value) = patch.decay_target_score {
            self.decay_target_score = value;
        }
        if let Some(value) = patch.decay_ceiling {
            self.decay_ceiling = value;
        }
        if let Some(value) = patch.inactivity_threshold_ticks {
            self.inactivity_threshold_ticks = value;
        }
        if let Some(value) = patch.decay_rate_per_tick {
            self.decay_rate_per_tick = value;
        }
        if let Some(value) = patch.diminishing_return_threshold {
            self.diminishing_return_threshold = value;
        }
        if let Some(value) = patch.diminishing_return_factor {
            self.diminishing_return_factor = value;
        }
        if let Some(value) = patch.risk_weighting_enabled {
            self.risk_weighting_enabled = value;
        }
        if let Some(value) = patch.risk_weight_map {
            self.risk_weight_map = value;
        }
        self
    }
}

// ============================================================================
// SECTION: Calibration Profiles
// ============================================================================

/// Named calibration profile applied wholesale via `reconfigure`.
///
/// # Invariants
/// - Variants are stable for serialization and the profiles endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationProfile {
    /// Slow to trust: risk weighting on, early damping, fast decay.
    Conservative,
    /// The default configuration.
    Balanced,
    /// Quick to trust: no risk weighting, late damping, slow decay.
    Permissive,
}

impl CalibrationProfile {
    /// Returns a stable label for the profile.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Conservative => "conservative",
            Self::Balanced => "balanced",
            Self::Permissive => "permissive",
        }
    }

    /// Parses a wire label into a profile.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "conservative" => Some(Self::Conservative),
            "balanced" => Some(Self::Balanced),
            "permissive" => Some(Self::Permissive),
            _ => None,
        }
    }

    /// Returns the configuration patch for the profile.
    #[must_use]
    pub fn patch(self) -> TrustConfigPatch {
        match self {
            Self::Conservative => TrustConfigPatch {
                initial_score: Some(40),
                decay_target_score: Some(40),
                decay_ceiling: Some(45),
                inactivity_threshold_ticks: Some(5),
                decay_rate_per_tick: Some(2),
                diminishing_return_threshold: Some(75),
                risk_weighting_enabled: Some(true),
                ..TrustConfigPatch::default()
            },
            Self::Balanced => TrustConfigPatch {
                initial_score: Some(50),
                decay_target_score: Some(50),
                decay_ceiling: Some(50),
                inactivity_threshold_ticks: Some(0),
                decay_rate_per_tick: Some(1),
                diminishing_return_threshold: Some(90),
                risk_weighting_enabled: Some(false),
                ..TrustConfigPatch::default()
            },
            Self::Permissive => TrustConfigPatch {
                initial_score: Some(60),
                decay_target_score: Some(55),
                decay_ceiling: Some(60),
                inactivity_threshold_ticks: Some(10),
                decay_rate_per_tick: Some(1),
                diminishing_return_threshold: Some(95),
                risk_weighting_enabled: Some(false),
                ..TrustConfigPatch::default()
            },
        }
    }
}

// ============================================================================
// SECTION: Profiles and Logs
// ============================================================================

/// Persisted trust profile for one agent.
///
/// # Invariants
/// - `score` and every domain score lie in `[floor, ceiling]`.
/// - Domain entries exist only once the agent has acted in that domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustProfile {
    /// Agent identifier.
    pub agent_id: AgentId,
    /// Global trust score.
    pub score: i64,
    /// Per-domain scores keyed by artifact-kind label.
    #[serde(default)]
    pub domain_scores: BTreeMap<String, i64>,
}

/// In-memory record of a domain-score change, drained for auditing.
///
/// # Invariants
/// - Records accumulate until a resolver flushes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainOutcomeRecord {
    /// Agent whose domain score changed.
    pub agent_id: AgentId,
    /// Domain (artifact kind) touched.
    pub domain: ArtifactKind,
    /// Outcome applied.
    pub outcome: TrustOutcome,
    /// Effective delta applied to the domain score.
    pub delta: i64,
    /// Tick at application time.
    pub tick: Tick,
}
