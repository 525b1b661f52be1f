// crates/overseer-server/src/http/system.rs
// ============================================================================
// Module: System HTTP Handlers
// Description: Health, tick, control mode, trust, brake, and query routes.
// Purpose: Expose the cross-cutting control-plane operations.
// Dependencies: axum, overseer-core, crate::{brake, error, state, ws}
// ============================================================================

//! ## Overview
//! The system handlers cover everything that is not agent- or
//! decision-shaped: health (with store readiness), manual tick advancement,
//! the control-mode switch (with brief propagation to running agents),
//! trust profiles and calibration, brake engagement, quarantine triage, and
//! the stored-event and coherence queries.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::Json;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use overseer_core::AgentId;
use overseer_core::AgentStatus;
use overseer_core::BriefPatch;
use overseer_core::CalibrationProfile;
use overseer_core::ControlMode;
use overseer_core::EventFilter;
use overseer_core::EventKind;
use overseer_core::IssueStatus;
use overseer_core::RunId;
use overseer_core::Timestamp;
use overseer_core::WorkstreamId;
use overseer_core::runtime::TickMode;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;

use crate::brake::BrakeBehavior;
use crate::brake::BrakeScope;
use crate::brake::ReleaseCondition;
use crate::error::ApiError;
use crate::error::ApiJson;
use crate::state::AppState;
use crate::ws::WsMessage;

// ============================================================================
// SECTION: Health and Tick
// ============================================================================

/// `GET /api/health` — liveness plus store readiness.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let status = if state.store.readiness().is_ok() { "ok" } else { "degraded" };
    Json(json!({ "status": status, "tick": state.tick.current() }))
}

/// Body of `POST /api/tick/advance`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TickAdvanceRequest {
    /// Ticks to advance (default 1).
    #[serde(default)]
    pub by: Option<u64>,
}

/// `POST /api/tick/advance` — manual clocks only.
pub async fn advance_tick(
    State(state): State<Arc<AppState>>,
    body: Option<ApiJson<TickAdvanceRequest>>,
) -> Result<Json<Value>, ApiError> {
    if state.tick.mode() != TickMode::Manual {
        return Err(ApiError::Conflict("tick mode is not manual".to_string()));
    }
    let by = body.and_then(|ApiJson(request)| request.by).unwrap_or(1);
    let tick = Arc::clone(&state.tick);
    // Subscriber fan-out hits the store; keep it off the request thread.
    let current = tokio::task::spawn_blocking(move || tick.advance(by))
        .await
        .map_err(|error| ApiError::Internal(error.to_string()))?;
    Ok(Json(json!({ "tick": current })))
}

// ============================================================================
// SECTION: Control Mode
// ============================================================================

/// `GET /api/control-mode`.
pub async fn get_control_mode(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "mode": state.control.get() }))
}

/// Body of `PUT /api/control-mode`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ControlModeRequest {
    /// New mode label.
    pub mode: String,
}

/// `PUT /api/control-mode` — switches mode, broadcasts, and propagates the
/// change to running agents through brief updates.
pub async fn put_control_mode(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<ControlModeRequest>,
) -> Result<Json<Value>, ApiError> {
    let mode = ControlMode::parse(&request.mode)
        .ok_or_else(|| ApiError::Validation(format!("unknown control mode: {}", request.mode)))?;
    state.control.set(mode);
    state.broadcast_state_sync();
    for handle in state.gateway.registry().list() {
        if handle.status != AgentStatus::Running {
            continue;
        }
        let state = Arc::clone(&state);
        let patch = BriefPatch {
            control_mode: Some(mode.as_str().to_string()),
            ..BriefPatch::default()
        };
        tokio::spawn(async move {
            if let Err(error) = state.gateway.update_brief(&handle.agent_id, &patch).await {
                tracing::warn!(agent = %handle.agent_id, %error, "control-mode propagation failed");
            }
        });
    }
    Ok(Json(json!({ "mode": mode })))
}

// ============================================================================
// SECTION: Trust
// ============================================================================

/// `GET /api/trust/:agentId` — engine scores for one agent.
pub async fn trust_profile(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
) -> Json<Value> {
    let agent_id = AgentId::new(agent_id);
    Json(json!({
        "agentId": agent_id,
        "score": state.trust.score(&agent_id),
        "domainScores": state.trust.domain_scores(&agent_id),
    }))
}

/// `GET /api/trust/profiles` — calibration profiles and the active config.
pub async fn trust_profiles(State(state): State<Arc<AppState>>) -> Json<Value> {
    let profiles: Vec<Value> = [
        CalibrationProfile::Conservative,
        CalibrationProfile::Balanced,
        CalibrationProfile::Permissive,
    ]
    .into_iter()
    .map(|profile| json!({ "name": profile.as_str(), "patch": profile.patch() }))
    .collect();
    Json(json!({ "profiles": profiles, "config": state.trust.config() }))
}

/// `POST /api/trust/profile/:name` — applies a calibration profile.
pub async fn apply_trust_profile(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let profile = CalibrationProfile::parse(&name)
        .ok_or_else(|| ApiError::NotFound(format!("unknown trust profile: {name}")))?;
    state.trust.apply_profile(profile);
    let config = state.trust.config();
    state.hub.broadcast(&WsMessage::TrustConfigUpdate {
        config: config.clone(),
    });
    Ok(Json(json!({ "profile": profile.as_str(), "config": config })))
}

// ============================================================================
// SECTION: Brake
// ============================================================================

/// Body of `POST /api/brake`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BrakeRequest {
    /// Scope label: `all`, `agent`, or `workstream`.
    pub scope: String,
    /// Target agent for agent scope.
    #[serde(default)]
    pub agent_id: Option<AgentId>,
    /// Target workstream for workstream scope.
    #[serde(default)]
    pub workstream_id: Option<WorkstreamId>,
    /// Behavior label: `pause` or `kill`.
    pub behavior: String,
    /// Release condition (default manual).
    #[serde(default)]
    pub release_condition: Option<ReleaseCondition>,
}

/// Body of `POST /api/brake/release`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BrakeReleaseRequest {
    /// Specific order to release; absent releases everything.
    #[serde(default)]
    pub brake_id: Option<String>,
}

/// `POST /api/brake` — engages an emergency brake.
pub async fn engage_brake(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<BrakeRequest>,
) -> Result<Json<Value>, ApiError> {
    let scope = match request.scope.as_str() {
        "all" => BrakeScope::All,
        "agent" => BrakeScope::Agent {
            agent_id: request
                .agent_id
                .ok_or_else(|| ApiError::Validation("agentId required for agent scope".to_string()))?,
        },
        "workstream" => BrakeScope::Workstream {
            workstream_id: request.workstream_id.ok_or_else(|| {
                ApiError::Validation("workstreamId required for workstream scope".to_string())
            })?,
        },
        other => return Err(ApiError::Validation(format!("unknown brake scope: {other}"))),
    };
    let behavior = match request.behavior.as_str() {
        "pause" => BrakeBehavior::Pause,
        "kill" => BrakeBehavior::Kill,
        other => return Err(ApiError::Validation(format!("unknown brake behavior: {other}"))),
    };
    let release = request.release_condition.unwrap_or_default();
    let order = state.brake.engage(&state, scope, behavior, release).await;
    state.broadcast_state_sync();
    Ok(Json(json!({ "brake": order })))
}

/// `POST /api/brake/release` — releases brakes.
pub async fn release_brake(
    State(state): State<Arc<AppState>>,
    body: Option<ApiJson<BrakeReleaseRequest>>,
) -> Result<Json<Value>, ApiError> {
    let request = body.map(|ApiJson(request)| request).unwrap_or_default();
    let released = state.brake.release(&state, request.brake_id.as_deref()).await;
    state.broadcast_state_sync();
    Ok(Json(json!({ "released": released })))
}

// ============================================================================
// SECTION: Queries
// ============================================================================

/// Query of `GET /api/coherence`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoherenceQuery {
    /// Filter by status label.
    #[serde(default)]
    pub status: Option<String>,
}

/// `GET /api/coherence` — lists coherence issues.
pub async fn coherence(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CoherenceQuery>,
) -> Result<Json<Value>, ApiError> {
    let status = match query.status.as_deref() {
        None => None,
        Some("open") => Some(IssueStatus::Open),
        Some("resolved") => Some(IssueStatus::Resolved),
        Some(other) => {
            return Err(ApiError::Validation(format!("unknown issue status: {other}")));
        }
    };
    let issues = state.store.list_coherence_issues(status)?;
    Ok(Json(json!({ "issues": issues })))
}

/// Query of `GET /api/events`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsQuery {
    /// Filter to one agent.
    #[serde(default)]
    pub agent_id: Option<String>,
    /// Filter to one run.
    #[serde(default)]
    pub run_id: Option<String>,
    /// Comma-separated event kinds.
    #[serde(default)]
    pub types: Option<String>,
    /// Only events ingested at or after this unix-ms timestamp.
    #[serde(default)]
    pub since: Option<i64>,
    /// Row limit (clamped to 1000, default 100).
    #[serde(default)]
    pub limit: Option<usize>,
}

/// `GET /api/events` — filtered stored-event query.
pub async fn events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<Value>, ApiError> {
    let mut types = Vec::new();
    if let Some(raw) = &query.types {
        for label in raw.split(',').map(str::trim).filter(|label| !label.is_empty()) {
            let kind = EventKind::parse(label)
                .ok_or_else(|| ApiError::Validation(format!("unknown event type: {label}")))?;
            types.push(kind);
        }
    }
    let filter = EventFilter {
        agent_id: query.agent_id.map(AgentId::new),
        run_id: query.run_id.map(RunId::new),
        types,
        since: query.since.map(Timestamp::from_unix_millis),
        limit: query.limit,
    };
    let events = state.store.events(&filter)?;
    Ok(Json(json!({ "events": events })))
}

// ============================================================================
// SECTION: Quarantine
// ============================================================================

/// `GET /api/quarantine` — lists quarantined events.
pub async fn quarantine_list(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "quarantine": state.quarantine.list() }))
}

/// `DELETE /api/quarantine` — purges the pen.
pub async fn quarantine_purge(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "purged": state.quarantine.purge() }))
}
