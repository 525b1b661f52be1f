// crates/overseer-server/src/http/mod.rs
// ============================================================================
// Module: Server HTTP Surface
// Description: Router assembly and bearer-auth middleware.
// Purpose: Expose every control-plane operation over validated JSON.
// Dependencies: axum, crate::{auth, error, state}
// ============================================================================

//! ## Overview
//! Thin handlers over the control-plane components: every route validates
//! its body through the shared extractor, maps domain errors onto the
//! status-code taxonomy, and stays free of business logic. Bearer auth
//! guards the API surface; health, login, refresh, and sandbox token
//! renewal are exempt (renewal authenticates with the token it renews).
//! When no API users are configured the guard is disabled for local
//! development.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::Router;
use axum::extract::Request;
use axum::extract::State;
use axum::middleware::Next;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;

use crate::auth::TokenKind;
use crate::error::ApiError;
use crate::state::AppState;

/// Agent lifecycle handlers.
pub mod agents;
/// Artifact handlers.
pub mod artifacts;
/// Login and token handlers.
pub mod auth_api;
/// Adapter-facing bridge handlers.
pub mod bridge;
/// Decision and tool-gate handlers.
pub mod decisions;
/// Project seeding and drafting handlers.
pub mod project;
/// Health, tick, control-mode, trust, brake, and query handlers.
pub mod system;
/// Dashboard WebSocket handler.
pub mod ws_api;

// ============================================================================
// SECTION: Router
// ============================================================================

/// Builds the full application router.
#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/health", get(system::health))
        .route("/agents", get(agents::list))
        .route("/agents/spawn", post(agents::spawn))
        .route("/agents/{id}", get(agents::get_one))
        .route("/agents/{id}/kill", post(agents::kill))
        .route("/agents/{id}/pause", post(agents::pause))
        .route("/agents/{id}/resume", post(agents::resume))
        .route("/agents/{id}/brief", axum::routing::patch(agents::patch_brief))
        .route("/agents/{id}/checkpoint", post(agents::checkpoint))
        .route("/agents/{id}/checkpoints", get(agents::checkpoints))
        .route("/agents/{id}/checkpoints/latest", get(agents::latest_checkpoint))
        .route("/decisions", get(decisions::list))
        .route("/decisions/{id}/resolve", post(decisions::resolve))
        .route("/tool-gate/request-approval", post(decisions::request_approval))
        .route("/tool-gate/stats", get(decisions::stats))
        .route("/brake", post(system::engage_brake))
        .route("/brake/release", post(system::release_brake))
        .route("/control-mode", get(system::get_control_mode).put(system::put_control_mode))
        .route("/trust/profiles", get(system::trust_profiles))
        .route("/trust/profile/{name}", post(system::apply_trust_profile))
        .route("/trust/{agent_id}", get(system::trust_profile))
        .route("/artifacts", get(artifacts::list).post(artifacts::upload))
        .route("/artifacts/{id}", get(artifacts::get_one))
        .route("/artifacts/{id}/content", get(artifacts::content))
        .route("/coherence", get(system::coherence))
        .route("/events", get(system::events))
        .route("/tick/advance", post(system::advance_tick))
        .route("/quarantine", get(system::quarantine_list).delete(system::quarantine_purge))
        .route("/project/seed", post(project::seed))
        .route("/project", get(project::get_project).patch(project::patch_project))
        .route("/project/draft-brief", post(project::draft_brief))
        .route("/bridge/events", post(bridge::push_events))
        .route("/bridge/register", post(bridge::register))
        .route("/bridge/context/{agent_id}", get(bridge::context))
        .route("/bridge/brake/{agent_id}", get(bridge::brake_state))
        .route("/token/renew", post(auth_api::renew_token))
        .route("/auth/login", post(auth_api::login))
        .route("/auth/refresh", post(auth_api::refresh))
        .route("/auth/me", get(auth_api::me));
    Router::new()
        .nest("/api", api)
        .route("/ws", get(ws_api::upgrade))
        .layer(axum::middleware::from_fn_with_state(Arc::clone(&state), require_auth))
        .layer(axum::middleware::from_fn(crate::telemetry::track))
        .with_state(state)
}

// ============================================================================
// SECTION: Auth Middleware
// ============================================================================

/// Paths reachable without a bearer token.
const OPEN_PATHS: &[&str] =
    &["/api/health", "/api/auth/login", "/api/auth/refresh", "/api/token/renew", "/ws"];

/// Bearer-auth guard over the API surface. Accepts operator access tokens
/// everywhere and sandbox tokens on the bridge routes.
async fn require_auth(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let path = request.uri().path().to_string();
    if OPEN_PATHS.contains(&path.as_str()) || state.config.auth.users.is_empty() {
        return Ok(next.run(request).await);
    }
    let token = bearer_token(&request)
        .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))?;
    let claims = state
        .auth
        .verify(&token)
        .map_err(|error| ApiError::Unauthorized(error.to_string()))?;
    let allowed = match claims.kind {
        TokenKind::Access => true,
        TokenKind::Sandbox => path.starts_with("/api/bridge/") || path.starts_with("/api/tool-gate/"),
        TokenKind::Refresh => false,
    };
    if !allowed {
        return Err(ApiError::Unauthorized("token not valid for this surface".to_string()));
    }
    Ok(next.run(request).await)
}

/// Extracts the bearer token from a request.
fn bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(std::string::ToString::to_string)
}
