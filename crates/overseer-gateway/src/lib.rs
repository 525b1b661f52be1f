// crates/overseer-gateway/src/lib.rs
// ============================================================================
// Module: Overseer Gateway
// Description: Agent gateway, handle registry, port pool, and transports.
// Purpose: Bridge the control plane to provider adapters in sandboxes.
// Dependencies: overseer-core, reqwest, tokio, tokio-tungstenite
// ============================================================================

//! ## Overview
//! The gateway crate owns everything between the control plane and the
//! sandboxed adapter shims: the [`gateway::AgentGateway`] lifecycle facade,
//! the [`registry::AgentRegistry`] of runtime handles, the
//! [`ports::PortPool`] for host-port allocation, and two transports speaking
//! the shim RPC surface — [`local_http::LocalHttpPlugin`] (child process)
//! and [`container::ContainerPlugin`] (docker-managed sandbox).

/// Container adapter transport.
pub mod container;
/// Lifecycle facade.
pub mod gateway;
/// Local child-process adapter transport.
pub mod local_http;
/// Host-port pool.
pub mod ports;
/// Runtime handle registry.
pub mod registry;
/// Shared shim RPC helpers.
mod rpc;
/// Ingestion and token seams.
pub mod sink;

pub use container::ContainerConfig;
pub use container::ContainerPlugin;
pub use gateway::AgentGateway;
pub use gateway::ExitListener;
pub use gateway::GatewayError;
pub use local_http::LocalHttpConfig;
pub use local_http::LocalHttpPlugin;
pub use ports::PortPool;
pub use ports::PortPoolError;
pub use registry::AgentRegistry;
pub use sink::AdapterEventSink;
pub use sink::SandboxTokenIssuer;
