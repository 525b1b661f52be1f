// crates/overseer-core/src/core/control.rs
// ============================================================================
// Module: Overseer Control Modes
// Description: Global autonomy posture with policy fan-out.
// Purpose: Model the control-mode enum and its per-mode default policies.
// Dependencies: serde, crate::core::{brief, risk}
// ============================================================================

//! ## Overview
//! The control mode sets the project's autonomy posture. **Orchestrator**
//! routes every gated call to a human; **adaptive** auto-approves based on
//! trust; **ecosystem** approves everything except destructive large-blast
//! calls. The mode also selects the default context-injection policy used
//! when a brief omits one.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::brief::ContextInjectionPolicy;
use crate::core::brief::ReactiveTrigger;
use crate::core::brief::WorkstreamScope;
use crate::core::risk::Severity;

// ============================================================================
// SECTION: Control Mode
// ============================================================================

/// Global autonomy posture.
///
/// # Invariants
/// - Variants are stable for serialization and policy fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    /// Every gated call goes to a human.
    #[default]
    Orchestrator,
    /// Trust-gated automatic approval.
    Adaptive,
    /// Permissive; only destructive large-blast calls are gated.
    Ecosystem,
}

impl ControlMode {
    /// Returns a stable label for the mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Orchestrator => "orchestrator",
            Self::Adaptive => "adaptive",
            Self::Ecosystem => "ecosystem",
        }
    }

    /// Parses a wire label into a mode.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "orchestrator" => Some(Self::Orchestrator),
            "adaptive" => Some(Self::Adaptive),
            "ecosystem" => Some(Self::Ecosystem),
            _ => None,
        }
    }

    /// Returns the default context-injection policy for this mode.
    ///
    /// Orchestrator leans on frequent human checkpoints and injects rarely;
    /// adaptive refreshes on a moderate cadence; ecosystem keeps agents
    /// current aggressively since humans intervene least there.
    #[must_use]
    pub fn default_injection_policy(self) -> ContextInjectionPolicy {
        match self {
            Self::Orchestrator => ContextInjectionPolicy {
                periodic_interval_ticks: Some(20),
                staleness_threshold: Some(10),
                cooldown_ticks: 5,
                max_injections_per_hour: 6,
                reactive_events: vec![ReactiveTrigger::BriefUpdated],
            },
            Self::Adaptive => ContextInjectionPolicy {
                periodic_interval_ticks: Some(10),
                staleness_threshold: Some(5),
                cooldown_ticks: 3,
                max_injections_per_hour: 12,
                reactive_events: vec![
                    ReactiveTrigger::ArtifactApproved {
                        workstreams: WorkstreamScope::Readable,
                    },
                    ReactiveTrigger::CoherenceIssue {
                        min_severity: Severity::High,
                    },
                    ReactiveTrigger::BriefUpdated,
                ],
            },
            Self::Ecosystem => ContextInjectionPolicy {
                periodic_interval_ticks: Some(5),
                staleness_threshold: Some(3),
                cooldown_ticks: 1,
                max_injections_per_hour: 30,
                reactive_events: vec![
                    ReactiveTrigger::ArtifactApproved {
                        workstreams: WorkstreamScope::All,
                    },
                    ReactiveTrigger::DecisionResolved {
                        workstreams: WorkstreamScope::Readable,
                    },
                    ReactiveTrigger::CoherenceIssue {
                        min_severity: Severity::Medium,
                    },
                    ReactiveTrigger::AgentCompleted,
                    ReactiveTrigger::BriefUpdated,
                ],
            },
        }
    }
}
