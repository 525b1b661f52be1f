// crates/overseer-server/src/http/artifacts.rs
// ============================================================================
// Module: Artifact HTTP Handlers
// Description: Artifact listing, reads, and content upload.
// Purpose: Serve the artifact index and the artifact:// content store.
// Dependencies: axum, base64, overseer-core, crate::{error, state}
// ============================================================================

//! ## Overview
//! Artifact reads serve the store's versioned records; uploads write
//! content rows keyed by `(agent, artifact)` and answer with the
//! `artifact://` URI the backend resolves later. Binary uploads arrive
//! base64-encoded; text uploads go through verbatim.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::Json;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::response::Response;
use base64::Engine;
use overseer_core::AgentId;
use overseer_core::ArtifactEvent;
use overseer_core::ArtifactId;
use overseer_core::WorkstreamId;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;

use crate::error::ApiError;
use crate::error::ApiJson;
use crate::state::AppState;

// ============================================================================
// SECTION: Request Bodies
// ============================================================================

/// Query of `GET /api/artifacts`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    /// Filter to one workstream.
    #[serde(default)]
    pub workstream: Option<String>,
}

/// Query of `GET /api/artifacts/:id/content`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentQuery {
    /// Uploading agent; defaults to the artifact's creator.
    #[serde(default)]
    pub agent_id: Option<String>,
}

/// Body of `POST /api/artifacts`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UploadRequest {
    /// Uploading agent.
    pub agent_id: AgentId,
    /// Artifact identifier.
    pub artifact_id: ArtifactId,
    /// Content payload (utf-8 text, or base64 when flagged).
    pub content: String,
    /// `utf8` (default) or `base64`.
    #[serde(default)]
    pub content_encoding: Option<String>,
    /// MIME type of the content.
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Optional artifact record to upsert alongside the content.
    #[serde(default)]
    pub artifact: Option<ArtifactEvent>,
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// `GET /api/artifacts` — lists artifact records.
pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, ApiError> {
    let workstream = query.workstream.map(WorkstreamId::new);
    let artifacts = state.store.list_artifacts(workstream.as_ref())?;
    Ok(Json(json!({ "artifacts": artifacts })))
}

/// `GET /api/artifacts/:id` — reads one artifact record.
pub async fn get_one(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let artifact_id = ArtifactId::new(id);
    let artifact = state
        .store
        .get_artifact(&artifact_id)?
        .ok_or_else(|| ApiError::NotFound(format!("unknown artifact: {artifact_id}")))?;
    Ok(Json(json!({ "artifact": artifact })))
}

/// `GET /api/artifacts/:id/content` — streams stored content bytes.
pub async fn content(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<ContentQuery>,
) -> Result<Response, ApiError> {
    let artifact_id = ArtifactId::new(id);
    let agent_id = match query.agent_id {
        Some(agent_id) => AgentId::new(agent_id),
        None => state
            .store
            .get_artifact(&artifact_id)?
            .map(|artifact| artifact.provenance.created_by)
            .ok_or_else(|| ApiError::NotFound(format!("unknown artifact: {artifact_id}")))?,
    };
    let content = state
        .store
        .get_artifact_content(&agent_id, &artifact_id)?
        .ok_or_else(|| ApiError::NotFound(format!("no content for artifact {artifact_id}")))?;
    let mime = content.mime_type.unwrap_or_else(|| "application/octet-stream".to_string());
    Ok(([(header::CONTENT_TYPE, mime)], content.content).into_response())
}

/// `POST /api/artifacts` — stores content (and optionally the record).
pub async fn upload(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<UploadRequest>,
) -> Result<Json<Value>, ApiError> {
    let bytes = match request.content_encoding.as_deref() {
        None | Some("utf8") => request.content.into_bytes(),
        Some("base64") => base64::engine::general_purpose::STANDARD
            .decode(request.content.as_bytes())
            .map_err(|error| ApiError::Validation(format!("invalid base64 content: {error}")))?,
        Some(other) => {
            return Err(ApiError::Validation(format!("unknown content encoding: {other}")));
        }
    };
    let stored = state.store.store_artifact_content(
        &request.agent_id,
        &request.artifact_id,
        &bytes,
        request.mime_type.as_deref(),
    )?;
    if let Some(mut artifact) = request.artifact {
        artifact.uri = Some(stored.backend_uri.clone());
        artifact.size_bytes = Some(u64::try_from(bytes.len()).unwrap_or(u64::MAX));
        state.store.store_artifact(&artifact)?;
    }
    Ok(Json(json!({ "uri": stored.backend_uri, "stored": stored.stored })))
}
