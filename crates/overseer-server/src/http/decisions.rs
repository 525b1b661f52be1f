// crates/overseer-server/src/http/decisions.rs
// ============================================================================
// Module: Decision HTTP Handlers
// Description: Decision listing, human resolution, and the tool gate.
// Purpose: Expose the queue and drive the shared resolution pipeline.
// Dependencies: axum, overseer-core, crate::{error, resolver, state, toolgate}
// ============================================================================

//! ## Overview
//! Decision endpoints are thin: listing reads the queue's priority view,
//! resolution routes through the shared resolver pipeline (404 for unknown
//! ids, 409 for terminal ones), and the tool-gate endpoints delegate to the
//! blocking gate.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::Json;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use overseer_core::AgentId;
use overseer_core::DecisionId;
use overseer_core::DecisionResolution;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;

use crate::error::ApiError;
use crate::error::ApiJson;
use crate::resolver;
use crate::resolver::ResolutionSource;
use crate::state::AppState;
use crate::toolgate;
use crate::toolgate::ApprovalRequest;

// ============================================================================
// SECTION: Request Bodies
// ============================================================================

/// Query of `GET /api/decisions`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    /// Filter to one agent.
    #[serde(default)]
    pub agent_id: Option<String>,
    /// `pending` (default) or `all`.
    #[serde(default)]
    pub status: Option<String>,
}

/// Body of `POST /api/decisions/:id/resolve`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ResolveRequest {
    /// Resolution to attach.
    pub resolution: DecisionResolution,
    /// Resolving operator's agent attribution, when proxied.
    #[serde(default)]
    pub agent_id: Option<AgentId>,
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// `GET /api/decisions` — lists decisions by priority.
pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, ApiError> {
    let agent_id = query.agent_id.map(AgentId::new);
    let decisions = match query.status.as_deref() {
        None | Some("pending") => state.queue.list_pending(agent_id.as_ref()),
        Some("all") => state.queue.list_all(),
        Some(other) => {
            return Err(ApiError::Validation(format!("unknown status filter: {other}")));
        }
    };
    Ok(Json(json!({ "decisions": decisions })))
}

/// `POST /api/decisions/:id/resolve` — attaches a human resolution.
pub async fn resolve(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<ResolveRequest>,
) -> Result<Json<Value>, ApiError> {
    let decision_id = DecisionId::new(id);
    if state.queue.get(&decision_id).is_none() {
        return Err(ApiError::NotFound(format!("unknown decision: {decision_id}")));
    }
    let applied = resolver::apply_resolution(
        &state,
        &decision_id,
        request.resolution,
        ResolutionSource::Human,
    )
    .await?
    .ok_or_else(|| ApiError::Conflict(format!("decision {decision_id} already terminal")))?;
    Ok(Json(json!({ "resolution": applied })))
}

/// `POST /api/tool-gate/request-approval` — blocking approval RPC.
pub async fn request_approval(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<ApprovalRequest>,
) -> Result<Json<Value>, ApiError> {
    let response = toolgate::request_approval(&state, request).await?;
    Ok(Json(serde_json::to_value(response).map_err(|error| {
        ApiError::Internal(error.to_string())
    })?))
}

/// `GET /api/tool-gate/stats` — aggregate gate counters.
pub async fn stats(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "stats": state.toolgate.stats.snapshot() }))
}
