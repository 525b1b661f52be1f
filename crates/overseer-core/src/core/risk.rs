// crates/overseer-core/src/core/risk.rs
// ============================================================================
// Module: Overseer Risk Vocabulary
// Description: Severity grades and blast-radius impact tags.
// Purpose: Provide the shared risk vocabulary for decisions, issues, and trust.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Severity orders escalation urgency (`warning < low < medium < high <
//! critical`); blast radius tags the qualitative impact of an action. Both
//! feed decision priority and trust risk weighting.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Severity
// ============================================================================

/// Escalation severity grade.
///
/// # Invariants
/// - Variant order is the comparison order; reactive triggers rely on it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational warning.
    Warning,
    /// Low urgency.
    #[default]
    Low,
    /// Medium urgency.
    Medium,
    /// High urgency.
    High,
    /// Critical urgency.
    Critical,
}

impl Severity {
    /// Returns the decision priority base for this severity.
    #[must_use]
    pub const fn priority_base(self) -> i64 {
        match self {
            Self::Warning => 10,
            Self::Low => 20,
            Self::Medium => 30,
            Self::High => 40,
            Self::Critical => 50,
        }
    }

    /// Returns a stable label for the severity.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

// ============================================================================
// SECTION: Blast Radius
// ============================================================================

/// Qualitative impact tag for a proposed action.
///
/// # Invariants
/// - Variants are stable for serialization and risk-weight lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BlastRadius {
    /// Reversible with no side effects outside the sandbox.
    Trivial,
    /// Contained to a single artifact or file.
    Small,
    /// Touches several artifacts within one workstream.
    Medium,
    /// Crosses workstreams or leaves the sandbox.
    Large,
    /// Impact could not be classified.
    #[default]
    Unknown,
}

impl BlastRadius {
    /// Returns a stable label for the blast radius.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trivial => "trivial",
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
            Self::Unknown => "unknown",
        }
    }
}
