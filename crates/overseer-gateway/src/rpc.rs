// crates/overseer-gateway/src/rpc.rs
// ============================================================================
// Module: Adapter RPC Helpers
// Description: Shared JSON-over-HTTP helpers for adapter shims.
// Purpose: One request/response path for both transports.
// Dependencies: overseer-core, reqwest, serde_json
// ============================================================================

//! ## Overview
//! Both transports speak the same JSON RPC surface to their shims; this
//! module holds the shared request path. Non-success statuses are protocol
//! errors, connection failures are transport errors.

// ============================================================================
// SECTION: Imports
// ============================================================================

use overseer_core::PluginError;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Issues a JSON POST against a shim endpoint and decodes the response.
///
/// # Errors
///
/// Returns [`PluginError::Transport`] on connection failure and
/// [`PluginError::Protocol`] on non-success statuses or undecodable bodies.
pub(crate) async fn post_json<T: serde::de::DeserializeOwned>(
    client: &reqwest::Client,
    base_url: &str,
    path: &str,
    body: &serde_json::Value,
) -> Result<T, PluginError> {
    let url = format!("{base_url}{path}");
    let response = client
        .post(&url)
        .json(body)
        .send()
        .await
        .map_err(|error| PluginError::Transport(error.to_string()))?;
    if !response.status().is_success() {
        return Err(PluginError::Protocol(format!(
            "shim replied {} to {path}",
            response.status()
        )));
    }
    response.json::<T>().await.map_err(|error| PluginError::Protocol(error.to_string()))
}
