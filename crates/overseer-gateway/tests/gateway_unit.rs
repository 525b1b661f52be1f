// crates/overseer-gateway/tests/gateway_unit.rs
// ============================================================================
// Module: Gateway Unit Tests
// Description: Port pool allocation and handle registry behavior.
// Purpose: Validate lowest-free allocation, loud exhaustion, release
//          semantics, and registry status ownership.
// ============================================================================

//! ## Overview
//! Unit-level tests for the gateway's resource managers:
//! - The pool allocates the lowest free port and fails loud on exhaustion
//! - Released ports become allocatable again; foreign ports are ignored
//! - The registry holds one handle per agent and tracks status mutations

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

use overseer_core::AgentHandle;
use overseer_core::AgentId;
use overseer_core::AgentStatus;
use overseer_gateway::AgentRegistry;
use overseer_gateway::PortPool;
use overseer_gateway::PortPoolError;

// ============================================================================
// SECTION: Port Pool
// ============================================================================

#[test]
fn allocation_returns_the_lowest_free_port() {
    let pool = PortPool::new(9_200..=9_202);
    assert_eq!(pool.allocate().unwrap(), 9_200);
    assert_eq!(pool.allocate().unwrap(), 9_201);
    assert_eq!(pool.allocate().unwrap(), 9_202);
    assert_eq!(pool.available(), 0);
}

#[test]
fn exhaustion_fails_loud() {
    let pool = PortPool::new(9_200..=9_200);
    pool.allocate().unwrap();
    let error = pool.allocate().unwrap_err();
    assert_eq!(error, PortPoolError::Exhausted {
        start: 9_200,
        end: 9_200,
    });
}

#[test]
fn released_ports_are_reused_lowest_first() {
    let pool = PortPool::new(9_200..=9_203);
    let first = pool.allocate().unwrap();
    let second = pool.allocate().unwrap();
    pool.release(first);
    // The freed low port wins over the next sequential one.
    assert_eq!(pool.allocate().unwrap(), first);
    pool.release(second);
    assert_eq!(pool.allocate().unwrap(), second);
}

#[test]
fn foreign_ports_are_ignored_on_release() {
    let pool = PortPool::new(9_200..=9_201);
    pool.release(80);
    assert_eq!(pool.available(), 2);
    assert_eq!(pool.allocate().unwrap(), 9_200);
}

// ============================================================================
// SECTION: Agent Registry
// ============================================================================

fn handle(agent: &str) -> AgentHandle {
    AgentHandle {
        agent_id: AgentId::new(agent),
        plugin_name: "local_http".to_string(),
        status: AgentStatus::Running,
        session_id: Some("sess-1".to_string()),
    }
}

#[test]
fn registry_holds_one_handle_per_agent() {
    let registry = AgentRegistry::new();
    registry.insert(handle("a-1"));
    registry.insert(handle("a-2"));
    let mut replacement = handle("a-1");
    replacement.session_id = Some("sess-2".to_string());
    registry.insert(replacement);

    let handles = registry.list();
    assert_eq!(handles.len(), 2);
    let stored = registry.get(&AgentId::new("a-1")).unwrap();
    assert_eq!(stored.session_id.as_deref(), Some("sess-2"));
}

#[test]
fn status_updates_require_a_known_agent() {
    let registry = AgentRegistry::new();
    registry.insert(handle("a-1"));
    assert!(registry.set_status(&AgentId::new("a-1"), AgentStatus::Paused));
    assert_eq!(registry.get(&AgentId::new("a-1")).unwrap().status, AgentStatus::Paused);
    assert!(!registry.set_status(&AgentId::new("ghost"), AgentStatus::Paused));
}

#[test]
fn removal_returns_the_handle() {
    let registry = AgentRegistry::new();
    registry.insert(handle("a-1"));
    let removed = registry.remove(&AgentId::new("a-1")).unwrap();
    assert_eq!(removed.agent_id.as_str(), "a-1");
    assert!(registry.get(&AgentId::new("a-1")).is_none());
    assert!(registry.remove(&AgentId::new("a-1")).is_none());
}
