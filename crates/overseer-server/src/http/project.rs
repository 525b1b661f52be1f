// crates/overseer-server/src/http/project.rs
// ============================================================================
// Module: Project HTTP Handlers
// Description: Project seeding, reads, patches, and brief drafting.
// Purpose: Manage the single project row and derive spawn briefs from it.
// Dependencies: axum, overseer-core, uuid, crate::{error, state}
// ============================================================================

//! ## Overview
//! A project is seeded once (`create`) or overlaid (`merge`), then patched.
//! Brief drafting is deterministic: it combines the project description,
//! the workstream plan, and the current knowledge snapshot into a spawnable
//! brief; the language-model polish applied by operators happens outside
//! this surface.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::Json;
use axum::extract::Query;
use axum::extract::State;
use overseer_core::AgentBrief;
use overseer_core::AgentId;
use overseer_core::ProjectConfig;
use overseer_core::ProjectPatch;
use overseer_core::Timestamp;
use overseer_core::WorkstreamId;
use overseer_core::runtime::pending_summaries;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;
use uuid::Uuid;

use crate::error::ApiError;
use crate::error::ApiJson;
use crate::state::AppState;

// ============================================================================
// SECTION: Request Bodies
// ============================================================================

/// Query of `POST /api/project/seed`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedQuery {
    /// `create` (default) replaces; `merge` overlays.
    #[serde(default)]
    pub mode: Option<String>,
}

/// Body of `POST /api/project/draft-brief`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DraftBriefRequest {
    /// Role for the drafted agent.
    pub role: String,
    /// Primary workstream; defaults to the first planned workstream.
    #[serde(default)]
    pub workstream: Option<WorkstreamId>,
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// `POST /api/project/seed?mode=create|merge` — seeds the project row.
pub async fn seed(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SeedQuery>,
    ApiJson(patch): ApiJson<ProjectPatch>,
) -> Result<Json<Value>, ApiError> {
    let mode = query.mode.as_deref().unwrap_or("create");
    let config = match mode {
        "create" => {
            let name = patch
                .name
                .clone()
                .ok_or_else(|| ApiError::Validation("name is required for create".to_string()))?;
            ProjectConfig {
                name,
                description: None,
                workstreams: Vec::new(),
                default_control_mode: None,
                settings: None,
                updated_at: Timestamp::now(),
            }
            .apply_patch(patch, Timestamp::now())
        }
        "merge" => {
            let existing = state
                .store
                .project_config()?
                .ok_or_else(|| ApiError::Conflict("no project to merge into".to_string()))?;
            existing.apply_patch(patch, Timestamp::now())
        }
        other => return Err(ApiError::Validation(format!("unknown seed mode: {other}"))),
    };
    state.store.store_project_config(&config)?;
    state.broadcast_state_sync();
    Ok(Json(json!({ "project": config })))
}

/// `GET /api/project` — reads the project row.
pub async fn get_project(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let config = state
        .store
        .project_config()?
        .ok_or_else(|| ApiError::NotFound("no project seeded".to_string()))?;
    Ok(Json(json!({ "project": config })))
}

/// `PATCH /api/project` — overlays fields onto the project row.
pub async fn patch_project(
    State(state): State<Arc<AppState>>,
    ApiJson(patch): ApiJson<ProjectPatch>,
) -> Result<Json<Value>, ApiError> {
    let existing = state
        .store
        .project_config()?
        .ok_or_else(|| ApiError::NotFound("no project seeded".to_string()))?;
    let updated = existing.apply_patch(patch, Timestamp::now());
    state.store.store_project_config(&updated)?;
    state.broadcast_state_sync();
    Ok(Json(json!({ "project": updated })))
}

/// `POST /api/project/draft-brief` — derives a spawnable brief.
pub async fn draft_brief(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<DraftBriefRequest>,
) -> Result<Json<Value>, ApiError> {
    let project = state
        .store
        .project_config()?
        .ok_or_else(|| ApiError::NotFound("no project seeded".to_string()))?;
    let workstream = request
        .workstream
        .or_else(|| project.workstreams.first().map(|plan| plan.workstream_id.clone()))
        .ok_or_else(|| {
            ApiError::Conflict("project has no workstreams to assign".to_string())
        })?;
    let readable: Vec<WorkstreamId> = project
        .workstreams
        .iter()
        .map(|plan| plan.workstream_id.clone())
        .filter(|id| *id != workstream)
        .collect();
    let snapshot = state.store.snapshot(&pending_summaries(&state.queue))?;
    let brief = AgentBrief {
        agent_id: AgentId::new(format!("agent-{}", Uuid::new_v4())),
        role: request.role,
        workstream,
        readable_workstreams: readable,
        escalation_protocol: overseer_core::EscalationProtocol::default(),
        allowed_tools: Vec::new(),
        session_policy: overseer_core::SessionPolicy::default(),
        context_injection_policy: None,
        model_preference: None,
        project_brief: project.description.clone(),
        knowledge_snapshot: Some(snapshot),
    };
    Ok(Json(json!({ "brief": brief })))
}
