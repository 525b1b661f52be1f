// crates/overseer-core/src/lib.rs
// ============================================================================
// Module: Overseer Core
// Description: Domain model, interfaces, and runtime engines.
// Purpose: Provide the control-plane core consumed by store, gateway, and server.
// Dependencies: async-trait, serde, serde_json, thiserror, tokio, tracing
// ============================================================================

//! ## Overview
//! `overseer-core` is the heart of the Overseer control plane: the typed
//! domain model (events, decisions, briefs, trust, snapshots), the
//! backend-agnostic interfaces ([`interfaces::ProjectStore`],
//! [`interfaces::AgentPlugin`]), and the runtime engines (tick service,
//! event bus, decision queue, trust engine, context injection scheduler).
//! The crate does no network or disk I/O of its own; persistence and
//! transport live in the sibling crates.

/// Canonical domain model.
pub mod core;
/// Backend-agnostic interfaces.
pub mod interfaces;
/// In-process runtime engines.
pub mod runtime;

pub use core::*;
pub use interfaces::AgentPlugin;
pub use interfaces::InjectionTarget;
pub use interfaces::KillOptions;
pub use interfaces::KillOutcome;
pub use interfaces::PluginCapabilities;
pub use interfaces::PluginError;
pub use interfaces::ProjectStore;
pub use interfaces::StoreError;
