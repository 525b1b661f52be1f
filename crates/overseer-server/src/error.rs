// crates/overseer-server/src/error.rs
// ============================================================================
// Module: Server API Errors
// Description: Error taxonomy for the HTTP surface.
// Purpose: Map domain failures onto status codes and the JSON error envelope.
// Dependencies: axum, serde_json, thiserror, overseer-core, overseer-gateway
// ============================================================================

//! ## Overview
//! Every handler failure flows through [`ApiError`]: schema rejections are
//! 400 with a `details` field, unknown entities 404, lifecycle and
//! concurrency conflicts 409, auth failures 401, and plugin/storage
//! failures 500. The body shape is `{error, message?, details?}` on every
//! path.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use overseer_core::StoreError;
use overseer_gateway::GatewayError;
use thiserror::Error;

// ============================================================================
// SECTION: API Error
// ============================================================================

/// HTTP surface error taxonomy.
///
/// # Invariants
/// - Variants map 1:1 onto response status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Request body failed schema validation.
    #[error("Validation failed")]
    Validation(String),
    /// Referenced entity does not exist.
    #[error("{0}")]
    NotFound(String),
    /// Request conflicts with current state.
    #[error("{0}")]
    Conflict(String),
    /// Caller is not authenticated or not permitted.
    #[error("{0}")]
    Unauthorized(String),
    /// Internal failure (plugin, storage, or invariant violation).
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Returns the response status code.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::Validation(details) => serde_json::json!({
                "error": "Validation failed",
                "details": details,
            }),
            Self::NotFound(message) => serde_json::json!({
                "error": "Not found",
                "message": message,
            }),
            Self::Conflict(message) => serde_json::json!({
                "error": "Conflict",
                "message": message,
            }),
            Self::Unauthorized(message) => serde_json::json!({
                "error": "Unauthorized",
                "message": message,
            }),
            Self::Internal(message) => serde_json::json!({
                "error": "Internal error",
                "message": message,
            }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Conflict {
                expected,
                actual,
            } => Self::Conflict(format!("version conflict: expected {expected}, actual {actual}")),
            StoreError::Duplicate(message) => Self::Conflict(message),
            StoreError::NotFound(message) => Self::NotFound(message),
            StoreError::Io(message) | StoreError::Corrupt(message) => Self::Internal(message),
            StoreError::Invalid(message) => Self::Conflict(message),
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(error: GatewayError) -> Self {
        match error {
            GatewayError::UnknownAgent(message) | GatewayError::UnknownPlugin(message) => {
                Self::NotFound(message)
            }
            GatewayError::Lifecycle(message) => Self::Conflict(message),
            GatewayError::Unsupported(operation) => {
                Self::Conflict(format!("plugin does not support {operation}"))
            }
            GatewayError::Plugin(error) => Self::Internal(error.to_string()),
        }
    }
}

// ============================================================================
// SECTION: Validated JSON Extractor
// ============================================================================

/// JSON extractor that converts rejections into the validation envelope.
pub struct ApiJson<T>(pub T);

impl<S, T> axum::extract::FromRequest<S> for ApiJson<T>
where
    S: Send + Sync,
    T: serde::de::DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(
        req: axum::extract::Request,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError::Validation(rejection.body_text())),
        }
    }
}

impl<S, T> axum::extract::OptionalFromRequest<S> for ApiJson<T>
where
    S: Send + Sync,
    T: serde::de::DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(
        req: axum::extract::Request,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        match <Json<T> as axum::extract::OptionalFromRequest<S>>::from_request(req, state).await {
            Ok(Some(Json(value))) => Ok(Some(Self(value))),
            Ok(None) => Ok(None),
            Err(rejection) => Err(ApiError::Validation(rejection.body_text())),
        }
    }
}
