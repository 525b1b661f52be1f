// crates/overseer-server/src/http/auth_api.rs
// ============================================================================
// Module: Auth HTTP Handlers
// Description: Login, refresh, identity, and sandbox token renewal.
// Purpose: Expose the token service at the HTTP edge.
// Dependencies: axum, crate::{auth, error, state}
// ============================================================================

//! ## Overview
//! Login exchanges configured credentials for an access/refresh pair;
//! refresh rotates the pair; `me` echoes the verified claims. Sandbox token
//! renewal is adapter-initiated and authenticates with the token being
//! renewed, so it stays reachable without an operator session.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;

use crate::auth::TokenKind;
use crate::error::ApiError;
use crate::error::ApiJson;
use crate::state::AppState;

// ============================================================================
// SECTION: Request Bodies
// ============================================================================

/// Body of `POST /api/auth/login`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LoginRequest {
    /// Login name.
    pub username: String,
    /// Password.
    pub password: String,
}

/// Body of `POST /api/auth/refresh`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RefreshRequest {
    /// Refresh token to rotate.
    pub refresh_token: String,
}

/// Extracts the bearer token from headers.
fn bearer(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(std::string::ToString::to_string)
        .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// `POST /api/auth/login`.
pub async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    let pair = state
        .auth
        .login(&request.username, &request.password)
        .map_err(|error| ApiError::Unauthorized(error.to_string()))?;
    Ok(Json(json!(pair)))
}

/// `POST /api/auth/refresh`.
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<RefreshRequest>,
) -> Result<Json<Value>, ApiError> {
    let pair = state
        .auth
        .refresh(&request.refresh_token)
        .map_err(|error| ApiError::Unauthorized(error.to_string()))?;
    Ok(Json(json!(pair)))
}

/// `GET /api/auth/me` — echoes verified claims.
pub async fn me(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let token = bearer(&headers)?;
    let claims = state
        .auth
        .verify_kind(&token, TokenKind::Access)
        .map_err(|error| ApiError::Unauthorized(error.to_string()))?;
    Ok(Json(json!({ "username": claims.sub, "role": claims.role })))
}

/// `POST /api/token/renew` — sandbox-initiated token rotation.
pub async fn renew_token(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let token = bearer(&headers)?;
    let (renewed, expires_at) = state
        .auth
        .renew_sandbox(&token)
        .map_err(|error| ApiError::Unauthorized(error.to_string()))?;
    Ok(Json(json!({ "token": renewed, "expiresAt": expires_at })))
}
