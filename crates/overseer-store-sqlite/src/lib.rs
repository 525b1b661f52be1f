// crates/overseer-store-sqlite/src/lib.rs
// ============================================================================
// Module: Overseer SQLite Store
// Description: Durable ProjectStore implementation over SQLite.
// Purpose: Persist artifacts, agents, events, trust, and checkpoints with WAL.
// Dependencies: overseer-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! This crate implements [`overseer_core::ProjectStore`] on `SQLite`. Writes
//! serialize through a single writer connection inside explicit
//! transactions; reads run on a small pool of read-only WAL connections (the
//! writer connection doubles as the reader for `:memory:` databases). The
//! global version counter is bumped inside the same transaction as the
//! mutation it describes.

/// The store implementation.
pub mod store;

pub use store::SqliteProjectStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
