// crates/overseer-server/src/http/agents.rs
// ============================================================================
// Module: Agent HTTP Handlers
// Description: Spawn, lifecycle, brief, and checkpoint endpoints.
// Purpose: Drive the gateway and keep registry, store, and scheduler in step.
// Dependencies: axum, overseer-core, crate::{error, state}
// ============================================================================

//! ## Overview
//! Agent endpoints are orchestration glue: every lifecycle change flows
//! through the gateway, is mirrored into the store, updates the trust and
//! injection engines, and ends with a `state_sync` broadcast so dashboards
//! converge without polling.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::Json;
use axum::extract::Path;
use axum::extract::State;
use overseer_core::AgentBrief;
use overseer_core::AgentId;
use overseer_core::AgentStatus;
use overseer_core::BriefPatch;
use overseer_core::DEFAULT_CHECKPOINTS_PER_AGENT;
use overseer_core::InjectionPriority;
use overseer_core::InjectionReason;
use overseer_core::KillOptions;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;

use crate::error::ApiError;
use crate::error::ApiJson;
use crate::state::AppState;

// ============================================================================
// SECTION: Request Bodies
// ============================================================================

/// Body of `POST /api/agents/spawn`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SpawnRequest {
    /// Brief for the new agent.
    pub brief: AgentBrief,
    /// Plugin to spawn through (defaults to `local_http`).
    #[serde(default)]
    pub plugin_name: Option<String>,
}

/// Body of `POST /api/agents/:id/kill`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct KillRequest {
    /// Allow a grace window for state serialization (default true).
    #[serde(default)]
    pub grace: Option<bool>,
    /// Grace window length in milliseconds.
    #[serde(default)]
    pub grace_timeout_ms: Option<u64>,
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// `GET /api/agents` — lists runtime handles.
pub async fn list(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "agents": state.gateway.registry().list() }))
}

/// `GET /api/agents/:id` — reads one handle.
pub async fn get_one(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let agent_id = AgentId::new(id);
    let handle = state
        .gateway
        .registry()
        .get(&agent_id)
        .ok_or_else(|| ApiError::NotFound(format!("unknown agent: {agent_id}")))?;
    Ok(Json(json!({ "agent": handle })))
}

/// `POST /api/agents/spawn` — spawns and registers an agent.
pub async fn spawn(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<SpawnRequest>,
) -> Result<Json<Value>, ApiError> {
    if request.brief.agent_id.as_str().is_empty() {
        return Err(ApiError::Validation("brief.agentId must be non-empty".to_string()));
    }
    let plugin_name = request.plugin_name.as_deref().unwrap_or("local_http");
    let handle = state.gateway.spawn(plugin_name, &request.brief).await?;
    state.store.register_agent(&handle, &request.brief)?;
    state.trust.register_agent(&handle.agent_id, state.tick.current());
    state.scheduler.register_agent(request.brief.clone(), state.control.get());
    state.remember_brief(request.brief);
    state.broadcast_state_sync();
    Ok(Json(json!({ "agent": handle })))
}

/// `POST /api/agents/:id/kill` — kills an agent and orphans its decisions.
pub async fn kill(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Option<ApiJson<KillRequest>>,
) -> Result<Json<Value>, ApiError> {
    let agent_id = AgentId::new(id);
    let request = body.map(|ApiJson(request)| request).unwrap_or_default();
    let options = KillOptions {
        grace: request.grace.unwrap_or(true),
        grace_timeout_ms: request
            .grace_timeout_ms
            .or(Some(state.config.gateway.kill_grace_ms)),
    };
    let outcome = state.gateway.kill(&agent_id, &options).await?;
    if let Some(serialized) = &outcome.state
        && let Err(error) =
            state.store.store_checkpoint(serialized, None, DEFAULT_CHECKPOINTS_PER_AGENT)
    {
        tracing::warn!(agent = %agent_id, %error, "kill checkpoint persistence failed");
    }
    let orphaned = state.queue.handle_agent_killed(&agent_id);
    state.store.update_agent_status(&agent_id, AgentStatus::Completed)?;
    state.scheduler.unregister_agent(&agent_id);
    state.broadcast_state_sync();
    Ok(Json(json!({
        "outcome": outcome,
        "orphanedDecisions": orphaned.len(),
    })))
}

/// `POST /api/agents/:id/pause` — serializes and checkpoints an agent.
pub async fn pause(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let agent_id = AgentId::new(id);
    let serialized = state.gateway.pause(&agent_id).await?;
    let checkpoint =
        state.store.store_checkpoint(&serialized, None, DEFAULT_CHECKPOINTS_PER_AGENT)?;
    state.store.update_agent_status(&agent_id, AgentStatus::Paused)?;
    state.broadcast_state_sync();
    Ok(Json(json!({ "checkpoint": checkpoint })))
}

/// `POST /api/agents/:id/resume` — resumes from the latest checkpoint.
pub async fn resume(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let agent_id = AgentId::new(id);
    let record = state
        .store
        .get_agent(&agent_id)?
        .ok_or_else(|| ApiError::NotFound(format!("unknown agent: {agent_id}")))?;
    let checkpoint = state
        .store
        .latest_checkpoint(&agent_id)?
        .ok_or_else(|| ApiError::Conflict(format!("agent {agent_id} has no checkpoint")))?;
    let handle = state.gateway.resume(&record.plugin_name, &checkpoint.state).await?;
    state.store.update_agent_status(&agent_id, AgentStatus::Running)?;
    state.scheduler.register_agent(checkpoint.state.brief.clone(), state.control.get());
    state.remember_brief(checkpoint.state.brief.clone());
    state.queue.resume_agent_decisions(&agent_id);
    state.broadcast_state_sync();
    Ok(Json(json!({ "agent": handle })))
}

/// `PATCH /api/agents/:id/brief` — applies a partial brief and forces a
/// required context injection.
pub async fn patch_brief(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<BriefPatch>,
) -> Result<Json<Value>, ApiError> {
    let agent_id = AgentId::new(id);
    let brief = state
        .brief(&agent_id)
        .ok_or_else(|| ApiError::NotFound(format!("unknown agent: {agent_id}")))?;
    state.gateway.update_brief(&agent_id, &patch).await?;
    let patched = brief.apply_patch(&patch);
    state.scheduler.update_brief(patched.clone(), state.control.get());
    state.remember_brief(patched.clone());
    // The brief change always forces a refresh; a reactive `brief_updated`
    // subscription in the policy rides along and dedups on version.
    let reactive = state.scheduler.on_brief_updated(&agent_id);
    let injection_state = Arc::clone(&state);
    let injection_agent = agent_id.clone();
    tokio::spawn(async move {
        injection_state
            .scheduler
            .schedule_injection(
                &injection_agent,
                InjectionReason::BriefUpdated,
                InjectionPriority::Required,
            )
            .await;
        if let Some(scheduled) = reactive {
            injection_state
                .scheduler
                .schedule_injection(&scheduled.agent_id, scheduled.reason, scheduled.priority)
                .await;
        }
    });
    Ok(Json(json!({ "brief": patched })))
}

/// `POST /api/agents/:id/checkpoint` — requests an on-demand checkpoint.
pub async fn checkpoint(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let agent_id = AgentId::new(id);
    let serialized = state.gateway.request_checkpoint(&agent_id, None).await?;
    let checkpoint =
        state.store.store_checkpoint(&serialized, None, DEFAULT_CHECKPOINTS_PER_AGENT)?;
    Ok(Json(json!({ "checkpoint": checkpoint })))
}

/// `GET /api/agents/:id/checkpoints` — lists checkpoints, newest first.
pub async fn checkpoints(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let agent_id = AgentId::new(id);
    let checkpoints = state.store.checkpoints(&agent_id)?;
    Ok(Json(json!({ "checkpoints": checkpoints })))
}

/// `GET /api/agents/:id/checkpoints/latest` — reads the newest checkpoint.
pub async fn latest_checkpoint(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let agent_id = AgentId::new(id);
    let checkpoint = state
        .store
        .latest_checkpoint(&agent_id)?
        .ok_or_else(|| ApiError::NotFound(format!("agent {agent_id} has no checkpoint")))?;
    Ok(Json(json!({ "checkpoint": checkpoint })))
}
