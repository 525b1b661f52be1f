// crates/overseer-core/src/core/identifiers.rs
// ============================================================================
// Module: Overseer Identifiers
// Description: Canonical opaque identifiers for agents, runs, and records.
// Purpose: Provide strongly typed, serializable identifiers with stable wire forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! This module defines the canonical identifiers used throughout Overseer.
//! Identifiers are opaque strings on the wire; no normalization is applied.
//! Adapters assign event and run identifiers, the control plane assigns
//! decision and checkpoint identifiers, and seeds assign the rest.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: String Identifier Macro
// ============================================================================

/// Declares an opaque string identifier newtype with the standard surface.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }
    };
}

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

string_id! {
    /// Agent identifier, stable across pause/resume cycles.
    ///
    /// # Invariants
    /// - Opaque UTF-8 string; no normalization or validation is applied.
    AgentId
}

string_id! {
    /// Run identifier scoped to a single agent session.
    ///
    /// # Invariants
    /// - Opaque UTF-8 string; a new run starts on every spawn or resume.
    RunId
}

string_id! {
    /// Decision identifier assigned by the control plane.
    ///
    /// # Invariants
    /// - Unique across the queue lifetime; duplicate enqueues are no-ops.
    DecisionId
}

string_id! {
    /// Artifact identifier assigned by the producing agent or seed.
    ///
    /// # Invariants
    /// - Opaque UTF-8 string; stable across artifact versions.
    ArtifactId
}

string_id! {
    /// Coherence issue identifier.
    ///
    /// # Invariants
    /// - Opaque UTF-8 string; stable across the open/resolved lifecycle.
    IssueId
}

string_id! {
    /// Workstream identifier naming a slice of project work.
    ///
    /// # Invariants
    /// - Opaque UTF-8 string; referenced by briefs, artifacts, and issues.
    WorkstreamId
}

string_id! {
    /// Checkpoint identifier assigned by the store.
    ///
    /// # Invariants
    /// - Opaque UTF-8 string; unique within the checkpoint table.
    CheckpointId
}

string_id! {
    /// Adapter-assigned event identifier used for idempotent ingestion.
    ///
    /// # Invariants
    /// - Unique per adapter; re-ingestion of the same id is a no-op.
    SourceEventId
}

// ============================================================================
// SECTION: Subscription Identifier
// ============================================================================

/// Subscription identifier handed out by the event bus and tick service.
///
/// # Invariants
/// - Monotonically assigned per component; never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Creates a subscription identifier from a raw value.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw identifier value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
