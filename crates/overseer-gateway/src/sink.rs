// crates/overseer-gateway/src/sink.rs
// ============================================================================
// Module: Gateway Event Sink
// Description: Ingestion seam for adapter-pushed events.
// Purpose: Decouple transports from the server's ingestion pipeline.
// Dependencies: overseer-core
// ============================================================================

//! ## Overview
//! Transports push every adapter event through this seam. The server's
//! ingestion pipeline implements it (validation, quarantine, persistence,
//! bus publication); tests substitute an in-memory recorder.

// ============================================================================
// SECTION: Imports
// ============================================================================

use overseer_core::AdapterEvent;
use overseer_core::AgentId;

// ============================================================================
// SECTION: Sink
// ============================================================================

/// Ingestion seam for adapter events.
///
/// Implementations must be fast; transports call this from their event pump
/// tasks.
pub trait AdapterEventSink: Send + Sync {
    /// Ingests one adapter event attributed to an agent.
    fn ingest(&self, agent_id: &AgentId, event: AdapterEvent);
}

/// Issues sandbox-scoped backend tokens for spawned adapters.
///
/// The server implements this with its auth service; the gateway only needs
/// the opaque token and its expiry for the bootstrap payload.
pub trait SandboxTokenIssuer: Send + Sync {
    /// Issues a token for an agent. Returns `(token, expires_at_unix_ms)`.
    fn issue(&self, agent_id: &AgentId) -> (String, i64);
}
