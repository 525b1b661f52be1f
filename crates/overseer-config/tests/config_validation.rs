// crates/overseer-config/tests/config_validation.rs
// ============================================================================
// Module: Config Validation Tests
// Description: Parse defaults, range checks, and strict-field rejection.
// Purpose: Validate that every invalid configuration fails loud at load.
// ============================================================================

//! ## Overview
//! Tests the configuration contract:
//! - Minimal TOML parses with documented defaults
//! - Invalid bind addresses, port ranges, and intervals are rejected
//! - Unknown sections and fields are rejected
//! - Calibration profile and control mode names are checked

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    missing_docs,
    clippy::missing_docs_in_private_items,
    reason = "Test-only assertions and helpers are permitted."
)]

use overseer_config::ConfigError;
use overseer_config::OverseerConfig;
use overseer_config::TickDriveMode;

// ============================================================================
// SECTION: Helpers
// ============================================================================

const MINIMAL: &str = r#"
[auth]
secret = "dev-secret"
"#;

fn assert_validation_error(toml: &str, needle: &str) {
    match OverseerConfig::from_toml(toml) {
        Err(ConfigError::Validation(message)) => {
            assert!(message.contains(needle), "message {message:?} missing {needle:?}");
        }
        other => panic!("expected validation error containing {needle:?}, got {other:?}"),
    }
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

#[test]
fn minimal_config_parses_with_defaults() {
    let config = OverseerConfig::from_toml(MINIMAL).unwrap();
    assert_eq!(config.server.bind_addr, "127.0.0.1:8400");
    assert_eq!(config.tick.mode, TickDriveMode::Manual);
    assert_eq!(config.gateway.port_range_start, 9_200);
    assert_eq!(config.gateway.port_range_end, 9_299);
    assert_eq!(config.decisions.timeout_ticks, None);
    assert_eq!(config.control_mode, "orchestrator");
    assert_eq!(config.auth.access_ttl_minutes, 60);
}

#[test]
fn full_config_round_trips() {
    let config = OverseerConfig::from_toml(
        r#"
control_mode = "adaptive"

[server]
bind_addr = "0.0.0.0:9000"

[database]
path = ":memory:"
read_pool_size = 2

[tick]
mode = "timer"
interval_ms = 5000

[gateway]
port_range_start = 9300
port_range_end = 9310
adapter_command = "overseer-adapter"

[decisions]
timeout_ticks = 10

[trust]
profile = "conservative"

[auth]
secret = "dev-secret"

[[auth.users]]
username = "op"
password_sha256 = "ab"
"#,
    )
    .unwrap();
    assert_eq!(config.tick.mode, TickDriveMode::Timer);
    assert_eq!(config.decisions.timeout_ticks, Some(10));
    assert_eq!(config.auth.users.len(), 1);
    assert_eq!(
        config.startup_control_mode(),
        overseer_core::ControlMode::Adaptive
    );
}

// ============================================================================
// SECTION: Rejections
// ============================================================================

#[test]
fn invalid_bind_address_is_rejected() {
    assert_validation_error(
        r#"
[server]
bind_addr = "not-an-address"

[auth]
secret = "dev-secret"
"#,
        "bind_addr",
    );
}

#[test]
fn inverted_port_range_is_rejected() {
    assert_validation_error(
        r#"
[gateway]
port_range_start = 9300
port_range_end = 9200

[auth]
secret = "dev-secret"
"#,
        "port_range_start",
    );
}

#[test]
fn timer_mode_requires_a_nonzero_interval() {
    assert_validation_error(
        r#"
[tick]
mode = "timer"
interval_ms = 0

[auth]
secret = "dev-secret"
"#,
        "interval_ms",
    );
}

#[test]
fn zero_timeout_ticks_is_rejected() {
    assert_validation_error(
        r#"
[decisions]
timeout_ticks = 0

[auth]
secret = "dev-secret"
"#,
        "timeout_ticks",
    );
}

#[test]
fn unknown_trust_profile_is_rejected() {
    assert_validation_error(
        r#"
[trust]
profile = "reckless"

[auth]
secret = "dev-secret"
"#,
        "trust.profile",
    );
}

#[test]
fn empty_auth_secret_is_rejected() {
    assert_validation_error(
        r#"
[auth]
secret = ""
"#,
        "auth.secret",
    );
}

#[test]
fn unknown_control_mode_is_rejected() {
    assert_validation_error(
        r#"
control_mode = "anarchy"

[auth]
secret = "dev-secret"
"#,
        "control_mode",
    );
}

#[test]
fn unknown_fields_fail_parsing() {
    let error = OverseerConfig::from_toml(
        r#"
[auth]
secret = "dev-secret"
surprise = true
"#,
    )
    .unwrap_err();
    assert!(matches!(error, ConfigError::Parse(_)));
}

#[test]
fn zero_read_pool_is_rejected() {
    assert_validation_error(
        r#"
[database]
read_pool_size = 0

[auth]
secret = "dev-secret"
"#,
        "read_pool_size",
    );
}
