// crates/overseer-server/src/http/bridge.rs
// ============================================================================
// Module: Bridge HTTP Handlers
// Description: Agent-side hook surface for events, context, and brake state.
// Purpose: Let sandboxed adapters push events and poll control-plane state.
// Dependencies: axum, overseer-core, crate::{error, state}
// ============================================================================

//! ## Overview
//! The bridge is the adapter-facing slice of the API: event push (with
//! per-event quarantine instead of request-level rejection), adapter
//! registration, a context snapshot read, and the brake poll the sandbox
//! hook checks before running tools.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::Json;
use axum::extract::Path;
use axum::extract::State;
use overseer_core::AdapterEvent;
use overseer_core::AgentId;
use overseer_core::runtime::pending_summaries;
use overseer_gateway::AdapterEventSink;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;

use crate::error::ApiError;
use crate::error::ApiJson;
use crate::state::AppState;

// ============================================================================
// SECTION: Request Bodies
// ============================================================================

/// Body of `POST /api/bridge/events`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PushEventsRequest {
    /// Agent the events belong to.
    pub agent_id: AgentId,
    /// Raw events; malformed entries are quarantined, not rejected.
    pub events: Vec<Value>,
}

/// Body of `POST /api/bridge/register`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegisterRequest {
    /// Announcing agent.
    pub agent_id: AgentId,
    /// Port the adapter listens on, when it has one.
    #[serde(default)]
    pub port: Option<u16>,
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// `POST /api/bridge/events` — pushes adapter events through ingestion.
/// Each entry is parsed independently; failures land in quarantine.
pub async fn push_events(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<PushEventsRequest>,
) -> Json<Value> {
    let mut accepted = 0_usize;
    let mut quarantined = 0_usize;
    for raw in request.events {
        match serde_json::from_value::<AdapterEvent>(raw.clone()) {
            Ok(event) => {
                state.ingestor.ingest(&request.agent_id, event);
                accepted += 1;
            }
            Err(error) => {
                state.quarantine.quarantine(
                    Some(request.agent_id.clone()),
                    format!("schema rejection: {error}"),
                    raw,
                );
                quarantined += 1;
            }
        }
    }
    Json(json!({ "accepted": accepted, "quarantined": quarantined }))
}

/// `POST /api/bridge/register` — adapter readiness announcement.
pub async fn register(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<Json<Value>, ApiError> {
    if state.gateway.registry().get(&request.agent_id).is_none() {
        return Err(ApiError::NotFound(format!("unknown agent: {}", request.agent_id)));
    }
    tracing::info!(agent = %request.agent_id, port = ?request.port, "adapter registered");
    Ok(Json(json!({ "registered": true })))
}

/// `GET /api/bridge/context/:agentId` — current knowledge snapshot.
pub async fn context(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let agent_id = AgentId::new(agent_id);
    if state.gateway.registry().get(&agent_id).is_none() {
        return Err(ApiError::NotFound(format!("unknown agent: {agent_id}")));
    }
    let snapshot = state.store.snapshot(&pending_summaries(&state.queue))?;
    Ok(Json(json!({ "snapshot": snapshot })))
}

/// `GET /api/bridge/brake/:agentId` — brake poll for the sandbox hook.
pub async fn brake_state(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
) -> Json<Value> {
    let agent_id = AgentId::new(agent_id);
    Json(json!({ "braked": state.brake.is_braked(&agent_id) }))
}
