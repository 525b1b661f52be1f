// crates/overseer-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Project Store
// Description: Durable ProjectStore backed by SQLite WAL.
// Purpose: Persist project knowledge with transactional writes and versioning.
// Dependencies: overseer-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! [`SqliteProjectStore`] persists everything the control plane owns
//! durably: artifacts (with optimistic versioning), agents, coherence
//! issues, trust scores, workstreams, event envelopes, checkpoints, the
//! project row, and the audit log. Every write runs in a transaction on the
//! single writer connection; the global version counter is bumped inside
//! the same transaction as any snapshot-visible mutation. Reads run on a
//! pool of read-only WAL connections; `:memory:` databases route reads
//! through the writer connection since separate in-memory connections would
//! see separate databases.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use overseer_core::ActiveAgentSummary;
use overseer_core::AgentBrief;
use overseer_core::AgentHandle;
use overseer_core::AgentId;
use overseer_core::AgentRecord;
use overseer_core::AgentStatus;
use overseer_core::Artifact;
use overseer_core::ArtifactContent;
use overseer_core::ArtifactEvent;
use overseer_core::ArtifactId;
use overseer_core::ArtifactIndexEntry;
use overseer_core::AuditLogEntry;
use overseer_core::Checkpoint;
use overseer_core::CheckpointId;
use overseer_core::CoherenceIssue;
use overseer_core::DecisionId;
use overseer_core::EventEnvelope;
use overseer_core::EventFilter;
use overseer_core::IssueId;
use overseer_core::IssueStatus;
use overseer_core::KnowledgeSnapshot;
use overseer_core::PendingDecisionSummary;
use overseer_core::ProjectConfig;
use overseer_core::ProjectStore;
use overseer_core::SerializedAgentState;
use overseer_core::StoreError;
use overseer_core::StoredContent;
use overseer_core::Timestamp;
use overseer_core::TrustProfile;
use overseer_core::WorkstreamId;
use overseer_core::WorkstreamSummary;
use overseer_core::artifact_uri;
use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Default read connection pool size.
const DEFAULT_READ_POOL_SIZE: usize = 4;
/// Hard ceiling for event query limits.
const MAX_EVENT_LIMIT: usize = 1_000;
/// Default event query limit when the filter omits one.
const DEFAULT_EVENT_LIMIT: usize = 100;
/// Coherence issues included in a snapshot, newest first.
const SNAPSHOT_RECENT_ISSUES: usize = 20;
/// Persisted trust score bounds.
const TRUST_FLOOR: i64 = 0;
/// Persisted trust score ceiling.
const TRUST_CEILING: i64 = 100;
/// Persisted trust default when a profile is absent.
const TRUST_DEFAULT: i64 = 50;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` project store.
///
/// # Invariants
/// - `path` of `:memory:` selects an in-memory database (reads share the
///   writer connection).
/// - `read_pool_size` must be greater than zero for file-backed stores.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the database file, or `:memory:`.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Number of read-only connections for the read path.
    #[serde(default = "default_read_pool_size")]
    pub read_pool_size: usize,
}

impl SqliteStoreConfig {
    /// Builds a config for an in-memory store (tests and ephemeral runs).
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            path: PathBuf::from(":memory:"),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::Wal,
            sync_mode: SqliteSyncMode::Full,
            read_pool_size: DEFAULT_READ_POOL_SIZE,
        }
    }

    /// Returns true when the config selects an in-memory database.
    #[must_use]
    pub fn is_in_memory(&self) -> bool {
        self.path.as_os_str() == ":memory:"
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Returns the default read connection pool size.
const fn default_read_pool_size() -> usize {
    DEFAULT_READ_POOL_SIZE
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while opening or migrating the store.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Underlying `SQLite` failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Configuration is invalid.
    #[error("invalid store config: {0}")]
    Invalid(String),
    /// On-disk schema is newer than this build supports.
    #[error("unsupported schema version: {0} (supported {SCHEMA_VERSION})")]
    SchemaVersion(i64),
}

/// Maps a `SQLite` error into the core store error taxonomy.
fn map_sqlite(error: &rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(inner, _) = error
        && inner.code == ErrorCode::ConstraintViolation
    {
        return StoreError::Duplicate(error.to_string());
    }
    StoreError::Io(error.to_string())
}

/// Maps a serde failure on stored JSON into a corruption error.
fn map_corrupt(error: &serde_json::Error) -> StoreError {
    StoreError::Corrupt(error.to_string())
}

/// Maps a serde failure on caller-supplied data into an invalid error.
fn map_invalid(error: &serde_json::Error) -> StoreError {
    StoreError::Invalid(error.to_string())
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Durable project store backed by `SQLite`.
///
/// # Invariants
/// - All writes serialize through the writer connection in transactions.
/// - The global version counter never decreases.
pub struct SqliteProjectStore {
    /// Writer connection; all mutations serialize through it.
    writer: Mutex<Connection>,
    /// Read-only connections (empty for `:memory:` stores).
    readers: Vec<Mutex<Connection>>,
    /// Round-robin cursor over the read pool.
    next_reader: AtomicUsize,
}

impl SqliteProjectStore {
    /// Opens (and migrates) a store from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] on connection, pragma, or migration
    /// failures, or when the on-disk schema is unsupported.
    pub fn new(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        if !config.is_in_memory() && config.read_pool_size == 0 {
            return Err(SqliteStoreError::Invalid(
                "read_pool_size must be greater than zero".to_string(),
            ));
        }
        let writer = Connection::open(&config.path)?;
        apply_pragmas(&writer, config)?;
        migrate(&writer)?;
        let mut readers = Vec::new();
        if !config.is_in_memory() {
            for _ in 0..config.read_pool_size {
                let reader = Connection::open_with_flags(
                    &config.path,
                    OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
                )?;
                reader.busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))?;
                readers.push(Mutex::new(reader));
            }
        }
        Ok(Self {
            writer: Mutex::new(writer),
            readers,
            next_reader: AtomicUsize::new(0),
        })
    }

    /// Locks the writer connection, recovering from poisoning.
    fn writer(&self) -> MutexGuard<'_, Connection> {
        match self.writer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Runs a read closure on a pooled reader (or the writer for
    /// `:memory:` stores).
    fn with_reader<T>(
        &self,
        read: impl FnOnce(&Connection) -> Result<T, rusqlite::Error>,
    ) -> Result<T, StoreError> {
        self.with_reader_store(|conn| read(conn).map_err(|error| map_sqlite(&error)))
    }

    /// Runs a read closure that maps its own errors, on a pooled reader (or
    /// the writer for `:memory:` stores).
    fn with_reader_store<T>(
        &self,
        read: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        if self.readers.is_empty() {
            let conn = self.writer();
            return read(&conn);
        }
        let index = self.next_reader.fetch_add(1, Ordering::Relaxed) % self.readers.len();
        let conn = match self.readers[index].lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        read(&conn)
    }
}

impl std::fmt::Debug for SqliteProjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteProjectStore")
            .field("readers", &self.readers.len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// SECTION: Schema
// ============================================================================

/// Applies connection pragmas from configuration.
fn apply_pragmas(
    conn: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    conn.busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))?;
    if !config.is_in_memory() {
        conn.pragma_update(None, "journal_mode", config.journal_mode.pragma_value())?;
    }
    conn.pragma_update(None, "synchronous", config.sync_mode.pragma_value())?;
    conn.pragma_update(None, "foreign_keys", "on")?;
    Ok(())
}

/// Creates or upgrades the schema.
fn migrate(conn: &Connection) -> Result<(), SqliteStoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS meta (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )?;
    let stored: Option<i64> = conn
        .query_row("SELECT value FROM meta WHERE key = 'schema_version'", [], |row| {
            row.get::<_, String>(0)
        })
        .optional()?
        .and_then(|value| value.parse().ok());
    match stored {
        Some(version) if version > SCHEMA_VERSION => {
            return Err(SqliteStoreError::SchemaVersion(version));
        }
        Some(_) => {}
        None => {
            conn.execute(
                "INSERT INTO meta (key, value) VALUES ('schema_version', ?1)",
                params![SCHEMA_VERSION.to_string()],
            )?;
            conn.execute(
                "INSERT OR IGNORE INTO meta (key, value) VALUES ('global_version', '0')",
                [],
            )?;
        }
    }
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS artifacts (
            artifact_id TEXT PRIMARY KEY,
            workstream  TEXT NOT NULL,
            version     INTEGER NOT NULL,
            record      TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_artifacts_workstream ON artifacts (workstream);
        CREATE TABLE IF NOT EXISTS artifact_content (
            agent_id    TEXT NOT NULL,
            artifact_id TEXT NOT NULL,
            content     BLOB NOT NULL,
            mime_type   TEXT,
            uploaded_at INTEGER NOT NULL,
            PRIMARY KEY (agent_id, artifact_id)
        );
        CREATE TABLE IF NOT EXISTS agents (
            agent_id TEXT PRIMARY KEY,
            status   TEXT NOT NULL,
            record   TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS coherence_issues (
            issue_id  TEXT PRIMARY KEY,
            status    TEXT NOT NULL,
            raised_at INTEGER NOT NULL,
            record    TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS trust_scores (
            agent_id TEXT PRIMARY KEY,
            score    INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS trust_domain_scores (
            agent_id TEXT NOT NULL,
            domain   TEXT NOT NULL,
            score    INTEGER NOT NULL,
            PRIMARY KEY (agent_id, domain)
        );
        CREATE TABLE IF NOT EXISTS workstreams (
            workstream_id TEXT PRIMARY KEY,
            name          TEXT NOT NULL,
            status        TEXT NOT NULL,
            last_activity TEXT
        );
        CREATE TABLE IF NOT EXISTS events (
            seq             INTEGER PRIMARY KEY AUTOINCREMENT,
            source_event_id TEXT NOT NULL UNIQUE,
            agent_id        TEXT NOT NULL,
            run_id          TEXT NOT NULL,
            source_sequence INTEGER NOT NULL,
            event_type      TEXT NOT NULL,
            ingested_at     INTEGER NOT NULL,
            envelope        TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_events_agent ON events (agent_id, run_id);
        CREATE TABLE IF NOT EXISTS checkpoints (
            seq           INTEGER PRIMARY KEY AUTOINCREMENT,
            checkpoint_id TEXT NOT NULL UNIQUE,
            agent_id      TEXT NOT NULL,
            decision_id   TEXT,
            created_at    INTEGER NOT NULL,
            state         TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_checkpoints_agent ON checkpoints (agent_id);
        CREATE TABLE IF NOT EXISTS project (
            id     INTEGER PRIMARY KEY CHECK (id = 1),
            config TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS audit_log (
            seq             INTEGER PRIMARY KEY AUTOINCREMENT,
            entity_type     TEXT NOT NULL,
            entity_id       TEXT NOT NULL,
            action          TEXT NOT NULL,
            caller_agent_id TEXT,
            timestamp       INTEGER NOT NULL,
            details         TEXT
        );",
    )?;
    Ok(())
}

// ============================================================================
// SECTION: Transaction Helpers
// ============================================================================

/// Bumps the global version counter inside the current transaction.
fn bump_version(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute(
        "UPDATE meta SET value = CAST(CAST(value AS INTEGER) + 1 AS TEXT)
         WHERE key = 'global_version'",
        [],
    )?;
    Ok(())
}

/// Reads the global version counter.
fn read_version(conn: &Connection) -> Result<u64, rusqlite::Error> {
    let value: String =
        conn.query_row("SELECT value FROM meta WHERE key = 'global_version'", [], |row| {
            row.get(0)
        })?;
    Ok(value.parse().unwrap_or(0))
}

/// Appends an audit row inside the current transaction.
fn insert_audit(conn: &Connection, entry: &AuditLogEntry) -> Result<(), rusqlite::Error> {
    let details = entry
        .details
        .as_ref()
        .map(std::string::ToString::to_string);
    conn.execute(
        "INSERT INTO audit_log (entity_type, entity_id, action, caller_agent_id, timestamp, details)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            entry.entity_type,
            entry.entity_id,
            entry.action,
            entry.caller_agent_id.as_ref().map(overseer_core::AgentId::as_str),
            entry.timestamp.as_unix_millis(),
            details,
        ],
    )?;
    Ok(())
}

/// Idempotently inserts a workstream row inside the current transaction.
fn ensure_workstream_row(
    conn: &Connection,
    id: &WorkstreamId,
    name: Option<&str>,
    status: Option<&str>,
) -> Result<bool, rusqlite::Error> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO workstreams (workstream_id, name, status)
         VALUES (?1, ?2, ?3)",
        params![id.as_str(), name.unwrap_or(id.as_str()), status.unwrap_or("active")],
    )?;
    Ok(inserted > 0)
}

/// Builds an [`Artifact`] record from an upsert event and a version.
fn artifact_from_event(event: &ArtifactEvent, version: u64) -> Artifact {
    Artifact {
        artifact_id: event.artifact_id.clone(),
        name: event.name.clone(),
        kind: event.kind,
        workstream: event.workstream.clone(),
        status: event.status,
        quality_score: event.quality_score,
        provenance: event.provenance.clone(),
        uri: event.uri.clone(),
        mime_type: event.mime_type.clone(),
        size_bytes: event.size_bytes,
        content_hash: event.content_hash.clone(),
        version,
    }
}

/// Writes an artifact row (insert or replace) inside the current
/// transaction, ensuring its workstream and bumping the global version.
fn write_artifact(
    conn: &Connection,
    artifact: &Artifact,
) -> Result<(), StoreError> {
    let record = serde_json::to_string(artifact).map_err(|error| map_invalid(&error))?;
    conn.execute(
        "INSERT INTO artifacts (artifact_id, workstream, version, record)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (artifact_id)
         DO UPDATE SET workstream = ?2, version = ?3, record = ?4",
        params![
            artifact.artifact_id.as_str(),
            artifact.workstream.as_str(),
            i64::try_from(artifact.version).unwrap_or(i64::MAX),
            record,
        ],
    )
    .map_err(|error| map_sqlite(&error))?;
    ensure_workstream_row(conn, &artifact.workstream, None, None)
        .map_err(|error| map_sqlite(&error))?;
    bump_version(conn).map_err(|error| map_sqlite(&error))?;
    Ok(())
}

// ============================================================================
// SECTION: Shared Reads
// ============================================================================

/// Collects JSON record rows from a prepared query and deserializes them.
fn collect_records<T: serde::de::DeserializeOwned>(
    rows: Vec<String>,
) -> Result<Vec<T>, StoreError> {
    rows.into_iter()
        .map(|json| serde_json::from_str(&json).map_err(|error| map_corrupt(&error)))
        .collect()
}

/// Reads artifacts, optionally filtered by workstream.
fn read_artifacts(
    conn: &Connection,
    workstream: Option<&WorkstreamId>,
) -> Result<Vec<Artifact>, StoreError> {
    let rows = (|| -> Result<Vec<String>, rusqlite::Error> {
        let mut rows = Vec::new();
        match workstream {
            Some(workstream) => {
                let mut stmt = conn.prepare(
                    "SELECT record FROM artifacts WHERE workstream = ?1 ORDER BY artifact_id",
                )?;
                let mapped = stmt.query_map(params![workstream.as_str()], |row| row.get(0))?;
                for row in mapped {
                    rows.push(row?);
                }
            }
            None => {
                let mut stmt = conn.prepare("SELECT record FROM artifacts ORDER BY artifact_id")?;
                let mapped = stmt.query_map([], |row| row.get(0))?;
                for row in mapped {
                    rows.push(row?);
                }
            }
        }
        Ok(rows)
    })()
    .map_err(|error| map_sqlite(&error))?;
    collect_records(rows)
}

/// Reads coherence issues, optionally filtered by status, newest first.
fn read_issues(
    conn: &Connection,
    status: Option<IssueStatus>,
) -> Result<Vec<CoherenceIssue>, StoreError> {
    let rows = (|| -> Result<Vec<String>, rusqlite::Error> {
        let mut rows = Vec::new();
        match status {
            Some(status) => {
                let mut stmt = conn.prepare(
                    "SELECT record FROM coherence_issues WHERE status = ?1
                     ORDER BY raised_at DESC",
                )?;
                let mapped = stmt.query_map(params![status.as_str()], |row| row.get(0))?;
                for row in mapped {
                    rows.push(row?);
                }
            }
            None => {
                let mut stmt =
                    conn.prepare("SELECT record FROM coherence_issues ORDER BY raised_at DESC")?;
                let mapped = stmt.query_map([], |row| row.get(0))?;
                for row in mapped {
                    rows.push(row?);
                }
            }
        }
        Ok(rows)
    })()
    .map_err(|error| map_sqlite(&error))?;
    collect_records(rows)
}

/// Reads every agent record.
fn read_agents(conn: &Connection) -> Result<Vec<AgentRecord>, StoreError> {
    let rows = (|| -> Result<Vec<String>, rusqlite::Error> {
        let mut stmt = conn.prepare("SELECT record FROM agents ORDER BY agent_id")?;
        let mapped = stmt.query_map([], |row| row.get(0))?;
        let mut rows = Vec::new();
        for row in mapped {
            rows.push(row?);
        }
        Ok(rows)
    })()
    .map_err(|error| map_sqlite(&error))?;
    collect_records(rows)
}

/// Reads every workstream summary.
fn read_workstreams(conn: &Connection) -> Result<Vec<WorkstreamSummary>, StoreError> {
    (|| -> Result<Vec<WorkstreamSummary>, rusqlite::Error> {
        let mut stmt = conn.prepare(
            "SELECT workstream_id, name, status, last_activity FROM workstreams
             ORDER BY workstream_id",
        )?;
        let mapped = stmt.query_map([], |row| {
            Ok(WorkstreamSummary {
                workstream_id: WorkstreamId::new(row.get::<_, String>(0)?),
                name: row.get(1)?,
                status: row.get(2)?,
                last_activity: row.get(3)?,
            })
        })?;
        let mut summaries = Vec::new();
        for row in mapped {
            summaries.push(row?);
        }
        Ok(summaries)
    })()
    .map_err(|error| map_sqlite(&error))
}

// ============================================================================
// SECTION: ProjectStore Implementation
// ============================================================================

impl ProjectStore for SqliteProjectStore {
    // ------------------------------------------------------------------
    // Artifacts
    // ------------------------------------------------------------------

    fn upsert_artifact(
        &self,
        event: &ArtifactEvent,
        expected_version: u64,
        caller: Option<&AgentId>,
    ) -> Result<Artifact, StoreError> {
        let mut writer = self.writer();
        let tx = writer.transaction().map_err(|error| map_sqlite(&error))?;
        let stored: Option<i64> = tx
            .query_row(
                "SELECT version FROM artifacts WHERE artifact_id = ?1",
                params![event.artifact_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|error| map_sqlite(&error))?;
        let actual = stored.map_or(0, |version| u64::try_from(version).unwrap_or(0));
        if actual != expected_version {
            return Err(StoreError::Conflict {
                expected: expected_version,
                actual,
            });
        }
        let artifact = artifact_from_event(event, expected_version + 1);
        write_artifact(&tx, &artifact)?;
        let action = if expected_version == 0 { "create" } else { "update" };
        insert_audit(
            &tx,
            &AuditLogEntry::now(
                "artifact",
                artifact.artifact_id.as_str(),
                action,
                caller.cloned(),
                Some(serde_json::json!({ "version": artifact.version })),
            ),
        )
        .map_err(|error| map_sqlite(&error))?;
        tx.commit().map_err(|error| map_sqlite(&error))?;
        Ok(artifact)
    }

    fn store_artifact(&self, event: &ArtifactEvent) -> Result<Artifact, StoreError> {
        let mut writer = self.writer();
        let tx = writer.transaction().map_err(|error| map_sqlite(&error))?;
        let stored: Option<i64> = tx
            .query_row(
                "SELECT version FROM artifacts WHERE artifact_id = ?1",
                params![event.artifact_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|error| map_sqlite(&error))?;
        let next = stored.map_or(0, |version| u64::try_from(version).unwrap_or(0)) + 1;
        let artifact = artifact_from_event(event, next);
        write_artifact(&tx, &artifact)?;
        tx.commit().map_err(|error| map_sqlite(&error))?;
        Ok(artifact)
    }

    fn get_artifact(&self, id: &ArtifactId) -> Result<Option<Artifact>, StoreError> {
        let record: Option<String> = self.with_reader(|conn| {
            conn.query_row(
                "SELECT record FROM artifacts WHERE artifact_id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()
        })?;
        record
            .map(|json| serde_json::from_str(&json).map_err(|error| map_corrupt(&error)))
            .transpose()
    }

    fn list_artifacts(
        &self,
        workstream: Option<&WorkstreamId>,
    ) -> Result<Vec<Artifact>, StoreError> {
        self.with_reader_store(|conn| read_artifacts(conn, workstream))
    }

    fn artifact_version(&self, id: &ArtifactId) -> Result<u64, StoreError> {
        let version: Option<i64> = self.with_reader(|conn| {
            conn.query_row(
                "SELECT version FROM artifacts WHERE artifact_id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()
        })?;
        Ok(version.map_or(0, |value| u64::try_from(value).unwrap_or(0)))
    }

    fn store_artifact_content(
        &self,
        agent_id: &AgentId,
        artifact_id: &ArtifactId,
        content: &[u8],
        mime_type: Option<&str>,
    ) -> Result<StoredContent, StoreError> {
        let writer = self.writer();
        writer
            .execute(
                "INSERT INTO artifact_content (agent_id, artifact_id, content, mime_type, uploaded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (agent_id, artifact_id)
                 DO UPDATE SET content = ?3, mime_type = ?4, uploaded_at = ?5",
                params![
                    agent_id.as_str(),
                    artifact_id.as_str(),
                    content,
                    mime_type,
                    Timestamp::now().as_unix_millis(),
                ],
            )
            .map_err(|error| map_sqlite(&error))?;
        Ok(StoredContent {
            backend_uri: artifact_uri(agent_id, artifact_id),
            stored: true,
        })
    }

    fn get_artifact_content(
        &self,
        agent_id: &AgentId,
        artifact_id: &ArtifactId,
    ) -> Result<Option<ArtifactContent>, StoreError> {
        self.with_reader(|conn| {
            conn.query_row(
                "SELECT content, mime_type, uploaded_at FROM artifact_content
                 WHERE agent_id = ?1 AND artifact_id = ?2",
                params![agent_id.as_str(), artifact_id.as_str()],
                |row| {
                    Ok(ArtifactContent {
                        agent_id: agent_id.clone(),
                        artifact_id: artifact_id.clone(),
                        content: row.get(0)?,
                        mime_type: row.get(1)?,
                        uploaded_at: Timestamp::from_unix_millis(row.get(2)?),
                    })
                },
            )
            .optional()
        })
    }

    // ------------------------------------------------------------------
    // Agents
    // ------------------------------------------------------------------

    fn register_agent(&self, handle: &AgentHandle, brief: &AgentBrief) -> Result<(), StoreError> {
        let record = AgentRecord {
            agent_id: handle.agent_id.clone(),
            role: brief.role.clone(),
            workstream: brief.workstream.clone(),
            plugin_name: handle.plugin_name.clone(),
            model_preference: brief.model_preference.clone(),
            status: handle.status,
            registered_at: Timestamp::now(),
        };
        let json = serde_json::to_string(&record).map_err(|error| map_invalid(&error))?;
        let mut writer = self.writer();
        let tx = writer.transaction().map_err(|error| map_sqlite(&error))?;
        tx.execute(
            "INSERT INTO agents (agent_id, status, record) VALUES (?1, ?2, ?3)
             ON CONFLICT (agent_id) DO UPDATE SET status = ?2, record = ?3",
            params![record.agent_id.as_str(), record.status.as_str(), json],
        )
        .map_err(|error| map_sqlite(&error))?;
        ensure_workstream_row(&tx, &record.workstream, None, None)
            .map_err(|error| map_sqlite(&error))?;
        bump_version(&tx).map_err(|error| map_sqlite(&error))?;
        tx.commit().map_err(|error| map_sqlite(&error))?;
        Ok(())
    }

    fn update_agent_status(&self, id: &AgentId, status: AgentStatus) -> Result<(), StoreError> {
        let mut writer = self.writer();
        let tx = writer.transaction().map_err(|error| map_sqlite(&error))?;
        let record: Option<String> = tx
            .query_row(
                "SELECT record FROM agents WHERE agent_id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|error| map_sqlite(&error))?;
        let Some(json) = record else {
            return Err(StoreError::NotFound(format!("agent {id}")));
        };
        let mut record: AgentRecord =
            serde_json::from_str(&json).map_err(|error| map_corrupt(&error))?;
        record.status = status;
        let json = serde_json::to_string(&record).map_err(|error| map_invalid(&error))?;
        tx.execute(
            "UPDATE agents SET status = ?2, record = ?3 WHERE agent_id = ?1",
            params![id.as_str(), status.as_str(), json],
        )
        .map_err(|error| map_sqlite(&error))?;
        bump_version(&tx).map_err(|error| map_sqlite(&error))?;
        tx.commit().map_err(|error| map_sqlite(&error))?;
        Ok(())
    }

    fn remove_agent(&self, id: &AgentId) -> Result<(), StoreError> {
        let mut writer = self.writer();
        let tx = writer.transaction().map_err(|error| map_sqlite(&error))?;
        tx.execute("DELETE FROM agents WHERE agent_id = ?1", params![id.as_str()])
            .map_err(|error| map_sqlite(&error))?;
        bump_version(&tx).map_err(|error| map_sqlite(&error))?;
        tx.commit().map_err(|error| map_sqlite(&error))?;
        Ok(())
    }

    fn get_agent(&self, id: &AgentId) -> Result<Option<AgentRecord>, StoreError> {
        let record: Option<String> = self.with_reader(|conn| {
            conn.query_row(
                "SELECT record FROM agents WHERE agent_id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()
        })?;
        record
            .map(|json| serde_json::from_str(&json).map_err(|error| map_corrupt(&error)))
            .transpose()
    }

    fn list_agents(&self) -> Result<Vec<AgentRecord>, StoreError> {
        self.with_reader_store(read_agents)
    }

    // ------------------------------------------------------------------
    // Coherence
    // ------------------------------------------------------------------

    fn store_coherence_issue(&self, issue: &CoherenceIssue) -> Result<(), StoreError> {
        let json = serde_json::to_string(issue).map_err(|error| map_invalid(&error))?;
        let mut writer = self.writer();
        let tx = writer.transaction().map_err(|error| map_sqlite(&error))?;
        tx.execute(
            "INSERT INTO coherence_issues (issue_id, status, raised_at, record)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (issue_id) DO UPDATE SET status = ?2, record = ?4",
            params![
                issue.issue_id.as_str(),
                issue.status.as_str(),
                issue.raised_at.as_unix_millis(),
                json,
            ],
        )
        .map_err(|error| map_sqlite(&error))?;
        bump_version(&tx).map_err(|error| map_sqlite(&error))?;
        tx.commit().map_err(|error| map_sqlite(&error))?;
        Ok(())
    }

    fn list_coherence_issues(
        &self,
        status: Option<IssueStatus>,
    ) -> Result<Vec<CoherenceIssue>, StoreError> {
        self.with_reader_store(|conn| read_issues(conn, status))
    }

    fn resolve_coherence_issue(
        &self,
        id: &IssueId,
        resolution: &str,
        caller: Option<&AgentId>,
    ) -> Result<(), StoreError> {
        let mut writer = self.writer();
        let tx = writer.transaction().map_err(|error| map_sqlite(&error))?;
        let record: Option<String> = tx
            .query_row(
                "SELECT record FROM coherence_issues WHERE issue_id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|error| map_sqlite(&error))?;
        let Some(json) = record else {
            return Err(StoreError::NotFound(format!("coherence issue {id}")));
        };
        let mut issue: CoherenceIssue =
            serde_json::from_str(&json).map_err(|error| map_corrupt(&error))?;
        if issue.status == IssueStatus::Resolved {
            return Err(StoreError::Invalid(format!("coherence issue {id} already resolved")));
        }
        issue.status = IssueStatus::Resolved;
        issue.resolution = Some(resolution.to_string());
        let json = serde_json::to_string(&issue).map_err(|error| map_invalid(&error))?;
        tx.execute(
            "UPDATE coherence_issues SET status = ?2, record = ?3 WHERE issue_id = ?1",
            params![id.as_str(), issue.status.as_str(), json],
        )
        .map_err(|error| map_sqlite(&error))?;
        insert_audit(
            &tx,
            &AuditLogEntry::now(
                "coherence",
                id.as_str(),
                "resolve",
                caller.cloned(),
                Some(serde_json::json!({ "resolution": resolution })),
            ),
        )
        .map_err(|error| map_sqlite(&error))?;
        bump_version(&tx).map_err(|error| map_sqlite(&error))?;
        tx.commit().map_err(|error| map_sqlite(&error))?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Trust
    // ------------------------------------------------------------------

    fn trust_profile(&self, id: &AgentId) -> Result<TrustProfile, StoreError> {
        let score: Option<i64> = self.with_reader(|conn| {
            conn.query_row(
                "SELECT score FROM trust_scores WHERE agent_id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()
        })?;
        let domain_scores = self.domain_trust_scores(id)?;
        Ok(TrustProfile {
            agent_id: id.clone(),
            score: score.unwrap_or(TRUST_DEFAULT),
            domain_scores,
        })
    }

    fn update_trust(&self, id: &AgentId, delta: i64, reason: &str) -> Result<i64, StoreError> {
        let mut writer = self.writer();
        let tx = writer.transaction().map_err(|error| map_sqlite(&error))?;
        let stored: Option<i64> = tx
            .query_row(
                "SELECT score FROM trust_scores WHERE agent_id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|error| map_sqlite(&error))?;
        let updated =
            (stored.unwrap_or(TRUST_DEFAULT) + delta).clamp(TRUST_FLOOR, TRUST_CEILING);
        tx.execute(
            "INSERT INTO trust_scores (agent_id, score) VALUES (?1, ?2)
             ON CONFLICT (agent_id) DO UPDATE SET score = ?2",
            params![id.as_str(), updated],
        )
        .map_err(|error| map_sqlite(&error))?;
        insert_audit(
            &tx,
            &AuditLogEntry::now(
                "trust",
                id.as_str(),
                "update",
                None,
                Some(serde_json::json!({ "delta": delta, "score": updated, "reason": reason })),
            ),
        )
        .map_err(|error| map_sqlite(&error))?;
        tx.commit().map_err(|error| map_sqlite(&error))?;
        Ok(updated)
    }

    fn domain_trust_scores(&self, id: &AgentId) -> Result<BTreeMap<String, i64>, StoreError> {
        self.with_reader(|conn| {
            let mut stmt = conn.prepare(
                "SELECT domain, score FROM trust_domain_scores WHERE agent_id = ?1",
            )?;
            let mapped = stmt
                .query_map(params![id.as_str()], |row| Ok((row.get(0)?, row.get(1)?)))?;
            let mut scores = BTreeMap::new();
            for row in mapped {
                let (domain, score): (String, i64) = row?;
                scores.insert(domain, score);
            }
            Ok(scores)
        })
    }

    fn store_domain_trust_scores(
        &self,
        id: &AgentId,
        scores: &BTreeMap<String, i64>,
    ) -> Result<(), StoreError> {
        let mut writer = self.writer();
        let tx = writer.transaction().map_err(|error| map_sqlite(&error))?;
        for (domain, score) in scores {
            tx.execute(
                "INSERT INTO trust_domain_scores (agent_id, domain, score) VALUES (?1, ?2, ?3)
                 ON CONFLICT (agent_id, domain) DO UPDATE SET score = ?3",
                params![id.as_str(), domain, (*score).clamp(TRUST_FLOOR, TRUST_CEILING)],
            )
            .map_err(|error| map_sqlite(&error))?;
        }
        tx.commit().map_err(|error| map_sqlite(&error))?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Workstreams
    // ------------------------------------------------------------------

    fn ensure_workstream(
        &self,
        id: &WorkstreamId,
        name: Option<&str>,
        status: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut writer = self.writer();
        let tx = writer.transaction().map_err(|error| map_sqlite(&error))?;
        let inserted =
            ensure_workstream_row(&tx, id, name, status).map_err(|error| map_sqlite(&error))?;
        if inserted {
            bump_version(&tx).map_err(|error| map_sqlite(&error))?;
        }
        tx.commit().map_err(|error| map_sqlite(&error))?;
        Ok(())
    }

    fn update_workstream_activity(
        &self,
        id: &WorkstreamId,
        activity: &str,
    ) -> Result<(), StoreError> {
        let mut writer = self.writer();
        let tx = writer.transaction().map_err(|error| map_sqlite(&error))?;
        ensure_workstream_row(&tx, id, None, None).map_err(|error| map_sqlite(&error))?;
        tx.execute(
            "UPDATE workstreams SET last_activity = ?2 WHERE workstream_id = ?1",
            params![id.as_str(), activity],
        )
        .map_err(|error| map_sqlite(&error))?;
        bump_version(&tx).map_err(|error| map_sqlite(&error))?;
        tx.commit().map_err(|error| map_sqlite(&error))?;
        Ok(())
    }

    fn list_workstreams(&self) -> Result<Vec<WorkstreamSummary>, StoreError> {
        self.with_reader_store(read_workstreams)
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    fn append_event(&self, envelope: &EventEnvelope) -> Result<(), StoreError> {
        let json = serde_json::to_string(envelope).map_err(|error| map_invalid(&error))?;
        let writer = self.writer();
        writer
            .execute(
                "INSERT INTO events
                 (source_event_id, agent_id, run_id, source_sequence, event_type, ingested_at, envelope)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    envelope.source_event_id.as_str(),
                    envelope.agent_id.as_str(),
                    envelope.run_id.as_str(),
                    i64::try_from(envelope.source_sequence).unwrap_or(i64::MAX),
                    envelope.event.kind().as_str(),
                    envelope.ingested_at.as_unix_millis(),
                    json,
                ],
            )
            .map_err(|error| map_sqlite(&error))?;
        Ok(())
    }

    fn events(&self, filter: &EventFilter) -> Result<Vec<EventEnvelope>, StoreError> {
        let limit = filter.limit.unwrap_or(DEFAULT_EVENT_LIMIT).min(MAX_EVENT_LIMIT);
        let mut sql = String::from("SELECT envelope FROM events WHERE 1 = 1");
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(agent_id) = &filter.agent_id {
            sql.push_str(" AND agent_id = ?");
            args.push(Box::new(agent_id.as_str().to_string()));
        }
        if let Some(run_id) = &filter.run_id {
            sql.push_str(" AND run_id = ?");
            args.push(Box::new(run_id.as_str().to_string()));
        }
        if !filter.types.is_empty() {
            let placeholders = vec!["?"; filter.types.len()].join(", ");
            sql.push_str(&format!(" AND event_type IN ({placeholders})"));
            for kind in &filter.types {
                args.push(Box::new(kind.as_str().to_string()));
            }
        }
        if let Some(since) = filter.since {
            sql.push_str(" AND ingested_at >= ?");
            args.push(Box::new(since.as_unix_millis()));
        }
        sql.push_str(" ORDER BY seq ASC LIMIT ?");
        args.push(Box::new(i64::try_from(limit).unwrap_or(i64::MAX)));
        let rows: Vec<String> = self.with_reader(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let params = rusqlite::params_from_iter(args.iter().map(std::convert::AsRef::as_ref));
            let mapped = stmt.query_map(params, |row| row.get(0))?;
            let mut rows = Vec::new();
            for row in mapped {
                rows.push(row?);
            }
            Ok(rows)
        })?;
        rows.into_iter()
            .map(|json| serde_json::from_str(&json).map_err(|error| map_corrupt(&error)))
            .collect()
    }

    // ------------------------------------------------------------------
    // Checkpoints
    // ------------------------------------------------------------------

    fn store_checkpoint(
        &self,
        state: &SerializedAgentState,
        decision_id: Option<&DecisionId>,
        max_per_agent: usize,
    ) -> Result<Checkpoint, StoreError> {
        let json = serde_json::to_string(state).map_err(|error| map_invalid(&error))?;
        let created_at = Timestamp::now();
        let mut writer = self.writer();
        let tx = writer.transaction().map_err(|error| map_sqlite(&error))?;
        tx.execute(
            "INSERT INTO checkpoints (checkpoint_id, agent_id, decision_id, created_at, state)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                // Placeholder id; replaced with the rowid-derived id below.
                format!("cp-pending-{}", state.agent_id),
                state.agent_id.as_str(),
                decision_id.map(DecisionId::as_str),
                created_at.as_unix_millis(),
                json,
            ],
        )
        .map_err(|error| map_sqlite(&error))?;
        let seq = tx.last_insert_rowid();
        let checkpoint_id = CheckpointId::new(format!("cp-{seq}"));
        tx.execute(
            "UPDATE checkpoints SET checkpoint_id = ?1 WHERE seq = ?2",
            params![checkpoint_id.as_str(), seq],
        )
        .map_err(|error| map_sqlite(&error))?;
        let max = i64::try_from(max_per_agent.max(1)).unwrap_or(i64::MAX);
        tx.execute(
            "DELETE FROM checkpoints WHERE agent_id = ?1 AND seq NOT IN (
                SELECT seq FROM checkpoints WHERE agent_id = ?1 ORDER BY seq DESC LIMIT ?2
             )",
            params![state.agent_id.as_str(), max],
        )
        .map_err(|error| map_sqlite(&error))?;
        tx.commit().map_err(|error| map_sqlite(&error))?;
        Ok(Checkpoint {
            checkpoint_id,
            agent_id: state.agent_id.clone(),
            state: state.clone(),
            decision_id: decision_id.cloned(),
            created_at,
        })
    }

    fn latest_checkpoint(&self, agent_id: &AgentId) -> Result<Option<Checkpoint>, StoreError> {
        Ok(self.checkpoints(agent_id)?.into_iter().next())
    }

    fn checkpoints(&self, agent_id: &AgentId) -> Result<Vec<Checkpoint>, StoreError> {
        let rows: Vec<(String, Option<String>, i64, String)> = self.with_reader(|conn| {
            let mut stmt = conn.prepare(
                "SELECT checkpoint_id, decision_id, created_at, state FROM checkpoints
                 WHERE agent_id = ?1 ORDER BY seq DESC",
            )?;
            let mapped = stmt.query_map(params![agent_id.as_str()], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?;
            let mut rows = Vec::new();
            for row in mapped {
                rows.push(row?);
            }
            Ok(rows)
        })?;
        rows.into_iter()
            .map(|(checkpoint_id, decision_id, created_at, state)| {
                let state: SerializedAgentState =
                    serde_json::from_str(&state).map_err(|error| map_corrupt(&error))?;
                Ok(Checkpoint {
                    checkpoint_id: CheckpointId::new(checkpoint_id),
                    agent_id: agent_id.clone(),
                    state,
                    decision_id: decision_id.map(DecisionId::new),
                    created_at: Timestamp::from_unix_millis(created_at),
                })
            })
            .collect()
    }

    fn checkpoint_count(&self, agent_id: &AgentId) -> Result<u64, StoreError> {
        let count: i64 = self.with_reader(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM checkpoints WHERE agent_id = ?1",
                params![agent_id.as_str()],
                |row| row.get(0),
            )
        })?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    fn delete_checkpoints(&self, agent_id: &AgentId) -> Result<u64, StoreError> {
        let writer = self.writer();
        let deleted = writer
            .execute("DELETE FROM checkpoints WHERE agent_id = ?1", params![agent_id.as_str()])
            .map_err(|error| map_sqlite(&error))?;
        Ok(u64::try_from(deleted).unwrap_or(0))
    }

    // ------------------------------------------------------------------
    // Project, audit, versioning
    // ------------------------------------------------------------------

    fn store_project_config(&self, config: &ProjectConfig) -> Result<(), StoreError> {
        let json = serde_json::to_string(config).map_err(|error| map_invalid(&error))?;
        let mut writer = self.writer();
        let tx = writer.transaction().map_err(|error| map_sqlite(&error))?;
        tx.execute(
            "INSERT INTO project (id, config) VALUES (1, ?1)
             ON CONFLICT (id) DO UPDATE SET config = ?1",
            params![json],
        )
        .map_err(|error| map_sqlite(&error))?;
        for plan in &config.workstreams {
            ensure_workstream_row(&tx, &plan.workstream_id, Some(&plan.name), None)
                .map_err(|error| map_sqlite(&error))?;
        }
        bump_version(&tx).map_err(|error| map_sqlite(&error))?;
        tx.commit().map_err(|error| map_sqlite(&error))?;
        Ok(())
    }

    fn project_config(&self) -> Result<Option<ProjectConfig>, StoreError> {
        let record: Option<String> = self.with_reader(|conn| {
            conn.query_row("SELECT config FROM project WHERE id = 1", [], |row| row.get(0))
                .optional()
        })?;
        record
            .map(|json| serde_json::from_str(&json).map_err(|error| map_corrupt(&error)))
            .transpose()
    }

    fn has_project(&self) -> Result<bool, StoreError> {
        Ok(self.project_config()?.is_some())
    }

    fn append_audit(&self, entry: &AuditLogEntry) -> Result<(), StoreError> {
        let writer = self.writer();
        insert_audit(&writer, entry).map_err(|error| map_sqlite(&error))
    }

    fn audit_log(
        &self,
        entity_type: Option<&str>,
        entity_id: Option<&str>,
    ) -> Result<Vec<AuditLogEntry>, StoreError> {
        let mut sql = String::from(
            "SELECT entity_type, entity_id, action, caller_agent_id, timestamp, details
             FROM audit_log WHERE 1 = 1",
        );
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(entity_type) = entity_type {
            sql.push_str(" AND entity_type = ?");
            args.push(Box::new(entity_type.to_string()));
        }
        if let Some(entity_id) = entity_id {
            sql.push_str(" AND entity_id = ?");
            args.push(Box::new(entity_id.to_string()));
        }
        sql.push_str(" ORDER BY seq ASC");
        self.with_reader(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let params = rusqlite::params_from_iter(args.iter().map(std::convert::AsRef::as_ref));
            let mapped = stmt.query_map(params, |row| {
                let details: Option<String> = row.get(5)?;
                Ok(AuditLogEntry {
                    entity_type: row.get(0)?,
                    entity_id: row.get(1)?,
                    action: row.get(2)?,
                    caller_agent_id: row.get::<_, Option<String>>(3)?.map(AgentId::new),
                    timestamp: Timestamp::from_unix_millis(row.get(4)?),
                    details: details.and_then(|json| serde_json::from_str(&json).ok()),
                })
            })?;
            let mut entries = Vec::new();
            for row in mapped {
                entries.push(row?);
            }
            Ok(entries)
        })
    }

    fn version(&self) -> Result<u64, StoreError> {
        self.with_reader(read_version)
    }

    fn snapshot(
        &self,
        pending_decisions: &[PendingDecisionSummary],
    ) -> Result<KnowledgeSnapshot, StoreError> {
        // One read transaction so the version and every section describe the
        // same point in time.
        self.with_reader_store(|conn| {
            let tx = conn.unchecked_transaction().map_err(|error| map_sqlite(&error))?;
            let version = read_version(&tx).map_err(|error| map_sqlite(&error))?;
            let workstreams = read_workstreams(&tx)?;
            let mut recent_coherence_issues = read_issues(&tx, None)?;
            recent_coherence_issues.truncate(SNAPSHOT_RECENT_ISSUES);
            let artifact_index: Vec<ArtifactIndexEntry> = read_artifacts(&tx, None)?
                .into_iter()
                .map(|artifact| ArtifactIndexEntry {
                    artifact_id: artifact.artifact_id,
                    name: artifact.name,
                    kind: artifact.kind,
                    workstream: artifact.workstream,
                    status: artifact.status,
                    version: artifact.version,
                    quality_score: artifact.quality_score,
                })
                .collect();
            let active_agents: Vec<ActiveAgentSummary> = read_agents(&tx)?
                .into_iter()
                .filter(|record| !record.status.is_terminal())
                .map(|record| ActiveAgentSummary {
                    agent_id: record.agent_id,
                    role: record.role,
                    workstream: record.workstream,
                    status: record.status,
                })
                .collect();
            tx.commit().map_err(|error| map_sqlite(&error))?;
            let mut snapshot = KnowledgeSnapshot {
                version,
                generated_at: Timestamp::now(),
                workstreams,
                pending_decisions: pending_decisions.to_vec(),
                recent_coherence_issues,
                artifact_index,
                active_agents,
                estimated_tokens: 0,
            };
            let body = serde_json::to_string(&snapshot).map_err(|error| map_invalid(&error))?;
            snapshot.estimated_tokens = KnowledgeSnapshot::estimate_tokens(body.len());
            Ok(snapshot)
        })
    }

    fn readiness(&self) -> Result<(), StoreError> {
        self.with_reader(|conn| conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)))?;
        Ok(())
    }
}
