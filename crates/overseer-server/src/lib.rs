// crates/overseer-server/src/lib.rs
// ============================================================================
// Module: Overseer Server
// Description: HTTP/WebSocket surface and control-plane assembly.
// Purpose: Expose the control plane to operators, dashboards, and adapters.
// Dependencies: axum, overseer-config, overseer-core, overseer-gateway,
// overseer-store-sqlite, tokio
// ============================================================================

//! ## Overview
//! `overseer-server` wires the control plane together and serves it: the
//! [`state::AppState`] assembly, the [`http`] router, the blocking
//! [`toolgate`], the shared [`resolver`] pipeline, the [`brake`] manager,
//! the [`ingest`] pipeline, [`auth`], [`ws`] broadcasting, [`quarantine`],
//! and [`telemetry`]. The `overseer-server` binary loads configuration,
//! builds the state, and runs the axum server with graceful shutdown.

/// Token issuance and verification.
pub mod auth;
/// Emergency brake manager.
pub mod brake;
/// API error taxonomy and validated JSON extraction.
pub mod error;
/// Route handlers and router assembly.
pub mod http;
/// Event ingestion pipeline.
pub mod ingest;
/// Malformed-event pen.
pub mod quarantine;
/// Shared resolution pipeline.
pub mod resolver;
/// Application state and wiring.
pub mod state;
/// Request metrics.
pub mod telemetry;
/// Blocking tool-approval gate.
pub mod toolgate;
/// Dashboard broadcasting.
pub mod ws;

pub use state::AppState;
pub use state::PluginFactory;
