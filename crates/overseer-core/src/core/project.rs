// crates/overseer-core/src/core/project.rs
// ============================================================================
// Module: Overseer Project Configuration
// Description: Single-row project configuration record.
// Purpose: Model the seeded project description, workstream plan, and settings.
// Dependencies: serde, serde_json, crate::core::{identifiers, time}
// ============================================================================

//! ## Overview
//! A project is seeded once and then patched. The store keeps exactly one
//! project row; `seed` with mode `create` replaces it, mode `merge` overlays
//! the provided fields onto the existing row.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::WorkstreamId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Project Config
// ============================================================================

/// Planned workstream in the project configuration.
///
/// # Invariants
/// - `workstream_id` is unique within the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkstreamPlan {
    /// Workstream identifier.
    pub workstream_id: WorkstreamId,
    /// Display name.
    pub name: String,
    /// Optional description of the slice of work.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Single-row project configuration.
///
/// # Invariants
/// - At most one project exists; seeding in `create` mode replaces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    /// Project name.
    pub name: String,
    /// Project description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Planned workstreams.
    #[serde(default)]
    pub workstreams: Vec<WorkstreamPlan>,
    /// Default control mode label for new sessions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_control_mode: Option<String>,
    /// Free-form settings preserved verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Value>,
    /// Timestamp of the last seed or patch.
    pub updated_at: Timestamp,
}

/// Partial project update applied by `PATCH /api/project` and merge seeding.
///
/// # Invariants
/// - Absent fields keep the current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProjectPatch {
    /// Replacement name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Replacement description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Replacement workstream plan.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workstreams: Option<Vec<WorkstreamPlan>>,
    /// Replacement default control mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_control_mode: Option<String>,
    /// Replacement settings payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Value>,
}

impl ProjectConfig {
    /// Applies a patch, returning the updated configuration.
    #[must_use]
    pub fn apply_patch(mut self, patch: ProjectPatch, updated_at: Timestamp) -> Self {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(description) = patch.description {
            self.description = Some(description);
        }
        if let Some(workstreams) = patch.workstreams {
            self.workstreams = workstreams;
        }
        if let Some(mode) = patch.default_control_mode {
            self.default_control_mode = Some(mode);
        }
        if let Some(settings) = patch.settings {
            self.settings = Some(settings);
        }
        self.updated_at = updated_at;
        self
    }
}
