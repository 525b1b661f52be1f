// crates/overseer-config/src/lib.rs
// ============================================================================
// Module: Overseer Config
// Description: Canonical configuration model and validation.
// Purpose: Load, default, and validate the server's TOML configuration.
// Dependencies: overseer-core, serde, thiserror, toml
// ============================================================================

//! ## Overview
//! The configuration model mirrors the server's deployment knobs: bind
//! address, database location, tick drive mode, gateway port range, decision
//! timeout policy, trust calibration, and API auth. Loading validates every
//! range up front so the server never starts with a config it cannot honor.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;

use overseer_core::CalibrationProfile;
use overseer_core::ControlMode;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading and validation errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading the configuration file failed.
    #[error("config read error: {0}")]
    Read(String),
    /// TOML parsing failed.
    #[error("config parse error: {0}")]
    Parse(String),
    /// A field failed range or consistency validation.
    #[error("config validation error: {0}")]
    Validation(String),
}

// ============================================================================
// SECTION: Sections
// ============================================================================

/// HTTP server section.
///
/// # Invariants
/// - `bind_addr` must parse as a socket address.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    /// Bind address, e.g. `127.0.0.1:8400`.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

/// Returns the default bind address.
fn default_bind_addr() -> String {
    "127.0.0.1:8400".to_string()
}

/// Database section.
///
/// # Invariants
/// - `path` of `:memory:` selects an ephemeral store.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseSection {
    /// Database file path or `:memory:`.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
    /// Read connection pool size.
    #[serde(default = "default_read_pool_size")]
    pub read_pool_size: usize,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            read_pool_size: default_read_pool_size(),
        }
    }
}

/// Returns the default database path.
fn default_database_path() -> PathBuf {
    PathBuf::from("overseer.db")
}

/// Returns the default read pool size.
const fn default_read_pool_size() -> usize {
    4
}

/// Tick clock drive mode.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TickDriveMode {
    /// Advance only via `POST /api/tick/advance`.
    #[default]
    Manual,
    /// Advance automatically on an interval.
    Timer,
}

/// Tick section.
///
/// # Invariants
/// - `interval_ms` must be non-zero in timer mode.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TickSection {
    /// Drive mode.
    #[serde(default)]
    pub mode: TickDriveMode,
    /// Timer interval in milliseconds (timer mode only).
    #[serde(default = "default_tick_interval_ms")]
    pub interval_ms: u64,
}

impl Default for TickSection {
    fn default() -> Self {
        Self {
            mode: TickDriveMode::Manual,
            interval_ms: default_tick_interval_ms(),
        }
    }
}

/// Returns the default tick interval.
const fn default_tick_interval_ms() -> u64 {
    30_000
}

/// Gateway section.
///
/// # Invariants
/// - `port_range_start <= port_range_end`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewaySection {
    /// First port in the adapter port pool.
    #[serde(default = "default_port_range_start")]
    pub port_range_start: u16,
    /// Last port in the adapter port pool (inclusive).
    #[serde(default = "default_port_range_end")]
    pub port_range_end: u16,
    /// Container health poll interval in milliseconds.
    #[serde(default = "default_health_poll_interval_ms")]
    pub health_poll_interval_ms: u64,
    /// Container startup timeout in milliseconds.
    #[serde(default = "default_startup_timeout_ms")]
    pub startup_timeout_ms: u64,
    /// Kill grace window in milliseconds before escalation.
    #[serde(default = "default_kill_grace_ms")]
    pub kill_grace_ms: u64,
    /// Per-RPC timeout against adapter shims in milliseconds.
    #[serde(default = "default_rpc_timeout_ms")]
    pub rpc_timeout_ms: u64,
    /// Adapter shim executable for the local transport (disables the
    /// transport when absent).
    #[serde(default)]
    pub adapter_command: Option<String>,
    /// Arguments for the adapter shim executable.
    #[serde(default)]
    pub adapter_args: Vec<String>,
    /// Container image for the container transport (disables the transport
    /// when absent).
    #[serde(default)]
    pub container_image: Option<String>,
    /// Port the shim binds inside the container.
    #[serde(default = "default_container_port")]
    pub container_port: u16,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            port_range_start: default_port_range_start(),
            port_range_end: default_port_range_end(),
            health_poll_interval_ms: default_health_poll_interval_ms(),
            startup_timeout_ms: default_startup_timeout_ms(),
            kill_grace_ms: default_kill_grace_ms(),
            rpc_timeout_ms: default_rpc_timeout_ms(),
            adapter_command: None,
            adapter_args: Vec::new(),
            container_image: None,
            container_port: default_container_port(),
        }
    }
}

/// Returns the default adapter RPC timeout.
const fn default_rpc_timeout_ms() -> u64 {
    30_000
}

/// Returns the default in-container shim port.
const fn default_container_port() -> u16 {
    8_080
}

/// Returns the default port pool start.
const fn default_port_range_start() -> u16 {
    9_200
}

/// Returns the default port pool end.
const fn default_port_range_end() -> u16 {
    9_299
}

/// Returns the default health poll interval.
const fn default_health_poll_interval_ms() -> u64 {
    500
}

/// Returns the default startup timeout.
const fn default_startup_timeout_ms() -> u64 {
    60_000
}

/// Returns the default kill grace window.
const fn default_kill_grace_ms() -> u64 {
    5_000
}

/// Decision queue section.
///
/// # Invariants
/// - `timeout_ticks` of `None` disables enqueue-relative timeouts.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DecisionSection {
    /// Ticks before a pending decision auto-resolves.
    #[serde(default)]
    pub timeout_ticks: Option<u64>,
}

/// Trust section.
///
/// # Invariants
/// - `profile`, when set, must name a known calibration profile.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrustSection {
    /// Calibration profile applied at startup.
    #[serde(default)]
    pub profile: Option<String>,
}

/// One configured API user.
///
/// # Invariants
/// - `password_sha256` is the lowercase hex SHA-256 of the password.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiUserSection {
    /// Login name.
    pub username: String,
    /// SHA-256 hex digest of the password.
    pub password_sha256: String,
    /// Role label embedded in issued tokens.
    #[serde(default = "default_user_role")]
    pub role: String,
}

/// Returns the default API user role.
fn default_user_role() -> String {
    "operator".to_string()
}

/// Auth section.
///
/// # Invariants
/// - `secret` must be non-empty; it signs API and sandbox tokens.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthSection {
    /// HMAC secret for token signing.
    pub secret: String,
    /// Access token lifetime in minutes.
    #[serde(default = "default_access_ttl_minutes")]
    pub access_ttl_minutes: u64,
    /// Refresh token lifetime in minutes.
    #[serde(default = "default_refresh_ttl_minutes")]
    pub refresh_ttl_minutes: u64,
    /// Sandbox token lifetime in minutes.
    #[serde(default = "default_sandbox_ttl_minutes")]
    pub sandbox_ttl_minutes: u64,
    /// Configured API users.
    #[serde(default)]
    pub users: Vec<ApiUserSection>,
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            secret: String::new(),
            access_ttl_minutes: default_access_ttl_minutes(),
            refresh_ttl_minutes: default_refresh_ttl_minutes(),
            sandbox_ttl_minutes: default_sandbox_ttl_minutes(),
            users: Vec::new(),
        }
    }
}

/// Returns the default access token lifetime.
const fn default_access_ttl_minutes() -> u64 {
    60
}

/// Returns the default refresh token lifetime.
const fn default_refresh_ttl_minutes() -> u64 {
    24 * 60
}

/// Returns the default sandbox token lifetime.
const fn default_sandbox_ttl_minutes() -> u64 {
    60
}

// ============================================================================
// SECTION: Top-Level Config
// ============================================================================

/// Complete server configuration.
///
/// # Invariants
/// - [`OverseerConfig::validate`] has accepted every loaded instance.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OverseerConfig {
    /// HTTP server section.
    #[serde(default)]
    pub server: ServerSection,
    /// Database section.
    #[serde(default)]
    pub database: DatabaseSection,
    /// Tick section.
    #[serde(default)]
    pub tick: TickSection,
    /// Gateway section.
    #[serde(default)]
    pub gateway: GatewaySection,
    /// Decision queue section.
    #[serde(default)]
    pub decisions: DecisionSection,
    /// Trust section.
    #[serde(default)]
    pub trust: TrustSection,
    /// Auth section.
    #[serde(default)]
    pub auth: AuthSection,
    /// Control mode at startup.
    #[serde(default = "default_control_mode")]
    pub control_mode: String,
}

/// Returns the default startup control mode.
fn default_control_mode() -> String {
    "orchestrator".to_string()
}

impl Default for OverseerConfig {
    fn default() -> Self {
        Self {
            server: ServerSection::default(),
            database: DatabaseSection::default(),
            tick: TickSection::default(),
            gateway: GatewaySection::default(),
            decisions: DecisionSection::default(),
            trust: TrustSection::default(),
            auth: AuthSection::default(),
            control_mode: default_control_mode(),
        }
    }
}

impl OverseerConfig {
    /// Loads and validates configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on read, parse, or validation failure.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|error| ConfigError::Read(error.to_string()))?;
        Self::from_toml(&raw)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on parse or validation failure.
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(raw).map_err(|error| ConfigError::Parse(error.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates ranges and cross-field consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.bind_addr.parse::<SocketAddr>().map_err(|_| {
            ConfigError::Validation(format!(
                "server.bind_addr is not a socket address: {}",
                self.server.bind_addr
            ))
        })?;
        if self.database.read_pool_size == 0 {
            return Err(ConfigError::Validation(
                "database.read_pool_size must be greater than zero".to_string(),
            ));
        }
        if self.tick.mode == TickDriveMode::Timer && self.tick.interval_ms == 0 {
            return Err(ConfigError::Validation(
                "tick.interval_ms must be greater than zero in timer mode".to_string(),
            ));
        }
        if self.gateway.port_range_start > self.gateway.port_range_end {
            return Err(ConfigError::Validation(format!(
                "gateway.port_range_start {} exceeds port_range_end {}",
                self.gateway.port_range_start, self.gateway.port_range_end
            )));
        }
        if self.gateway.health_poll_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "gateway.health_poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.decisions.timeout_ticks == Some(0) {
            return Err(ConfigError::Validation(
                "decisions.timeout_ticks must be greater than zero when set".to_string(),
            ));
        }
        if let Some(profile) = &self.trust.profile
            && CalibrationProfile::parse(profile).is_none()
        {
            return Err(ConfigError::Validation(format!(
                "trust.profile is not a known calibration profile: {profile}"
            )));
        }
        if self.auth.secret.is_empty() {
            return Err(ConfigError::Validation("auth.secret must be set".to_string()));
        }
        if self.auth.access_ttl_minutes == 0 || self.auth.sandbox_ttl_minutes == 0 {
            return Err(ConfigError::Validation(
                "auth token lifetimes must be greater than zero".to_string(),
            ));
        }
        if ControlMode::parse(&self.control_mode).is_none() {
            return Err(ConfigError::Validation(format!(
                "control_mode is not a known mode: {}",
                self.control_mode
            )));
        }
        Ok(())
    }

    /// Returns the parsed startup control mode. Validation guarantees the
    /// label parses; unvalidated instances fall back to orchestrator.
    #[must_use]
    pub fn startup_control_mode(&self) -> ControlMode {
        ControlMode::parse(&self.control_mode).unwrap_or_default()
    }
}
