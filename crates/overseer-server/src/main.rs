// crates/overseer-server/src/main.rs
// ============================================================================
// Module: Overseer Server Binary
// Description: Configuration loading, assembly, and the serve loop.
// Purpose: Run the control plane with graceful shutdown.
// Dependencies: axum-server, clap, tokio, tracing-subscriber, crate
// ============================================================================

//! ## Overview
//! The binary loads a TOML configuration, initializes tracing, builds the
//! wired [`AppState`] with the transports the configuration enables, starts
//! the tick timer when configured, and serves the router until ctrl-c.
//! Shutdown drains the HTTP server, stops the timer, and best-effort pauses
//! running agents so their state survives the restart.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;

use clap::Parser;
use overseer_config::OverseerConfig;
use overseer_core::AgentId;
use overseer_core::AgentStatus;
use overseer_core::interfaces::AgentPlugin;
use overseer_gateway::AgentGateway;
use overseer_gateway::ContainerConfig;
use overseer_gateway::ContainerPlugin;
use overseer_gateway::LocalHttpConfig;
use overseer_gateway::LocalHttpPlugin;
use overseer_gateway::PortPool;
use overseer_server::AppState;
use overseer_server::PluginFactory;
use overseer_server::http;
use tracing_subscriber::EnvFilter;

// ============================================================================
// SECTION: CLI
// ============================================================================

/// Overseer control-plane server.
#[derive(Debug, Parser)]
#[command(name = "overseer-server", version, about = "Overseer control plane")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "overseer.toml")]
    config: PathBuf,
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// Process exit error.
#[derive(Debug, thiserror::Error)]
enum MainError {
    /// Configuration failed to load.
    #[error("configuration error: {0}")]
    Config(String),
    /// The control plane failed to assemble.
    #[error("startup error: {0}")]
    Startup(String),
    /// The server loop failed.
    #[error("server error: {0}")]
    Serve(String),
}

#[tokio::main]
async fn main() -> Result<(), MainError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let config =
        OverseerConfig::load(&args.config).map_err(|error| MainError::Config(error.to_string()))?;
    let bind_addr: SocketAddr = config
        .server
        .bind_addr
        .parse()
        .map_err(|error| MainError::Config(format!("bind address: {error}")))?;

    let state = build_state(config).map_err(|error| MainError::Startup(error.to_string()))?;
    let timer = state.tick.start_timer();

    let router = http::router(Arc::clone(&state));
    let handle = axum_server::Handle::new();
    let shutdown_handle = handle.clone();
    let shutdown_state = Arc::clone(&state);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            tracing::error!("ctrl-c handler failed; shutting down immediately");
        }
        tracing::info!("shutdown requested; draining");
        shutdown_handle.graceful_shutdown(Some(Duration::from_secs(10)));
        shutdown(&shutdown_state).await;
    });

    tracing::info!(%bind_addr, "overseer control plane listening");
    let served = axum_server::bind(bind_addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await;
    if let Some(timer) = timer {
        timer.abort();
    }
    served.map_err(|error| MainError::Serve(error.to_string()))
}

// ============================================================================
// SECTION: Assembly
// ============================================================================

/// Builds the application state with the configured transports.
fn build_state(config: OverseerConfig) -> Result<Arc<AppState>, overseer_server::state::BuildError> {
    let backend_url = format!("http://{}", config.server.bind_addr);
    let artifact_endpoint = format!("{backend_url}/api/artifacts");
    let gateway_config = config.gateway.clone();
    let ports = Arc::new(PortPool::new(
        gateway_config.port_range_start..=gateway_config.port_range_end,
    ));

    // The exit relay breaks the plugin -> gateway cycle: plugins are built
    // first, the gateway is filled in after assembly.
    let relay: Arc<OnceLock<Arc<AgentGateway>>> = Arc::new(OnceLock::new());
    let exit_relay = Arc::clone(&relay);
    let factory: PluginFactory = Box::new(move |sink, tokens| {
        let on_exit: Arc<dyn Fn(&AgentId) + Send + Sync> = Arc::new(move |agent_id| {
            if let Some(gateway) = exit_relay.get() {
                gateway.notify_exit(agent_id);
            }
        });
        let mut plugins: Vec<Arc<dyn AgentPlugin>> = Vec::new();
        if let Some(command) = &gateway_config.adapter_command {
            plugins.push(Arc::new(LocalHttpPlugin::new(
                LocalHttpConfig {
                    plugin_name: "local_http".to_string(),
                    command: command.clone(),
                    args: gateway_config.adapter_args.clone(),
                    backend_url: backend_url.clone(),
                    artifact_upload_endpoint: artifact_endpoint.clone(),
                    spawn_timeout_ms: gateway_config.startup_timeout_ms,
                    kill_grace_ms: gateway_config.kill_grace_ms,
                    rpc_timeout_ms: gateway_config.rpc_timeout_ms,
                },
                Arc::clone(&sink),
                Arc::clone(&tokens),
                Arc::clone(&on_exit),
            )));
        }
        if let Some(image) = &gateway_config.container_image {
            plugins.push(Arc::new(ContainerPlugin::new(
                ContainerConfig {
                    plugin_name: "container".to_string(),
                    image: image.clone(),
                    container_port: gateway_config.container_port,
                    backend_url: backend_url.clone(),
                    artifact_upload_endpoint: artifact_endpoint.clone(),
                    health_poll_interval_ms: gateway_config.health_poll_interval_ms,
                    startup_timeout_ms: gateway_config.startup_timeout_ms,
                    kill_grace_ms: gateway_config.kill_grace_ms,
                    rpc_timeout_ms: gateway_config.rpc_timeout_ms,
                },
                Arc::clone(&ports),
                Arc::clone(&sink),
                Arc::clone(&tokens),
                on_exit,
            )));
        }
        if plugins.is_empty() {
            tracing::warn!("no adapter transports configured; spawn requests will 404");
        }
        plugins
    });

    let state = AppState::build(config, factory)?;
    let _ = relay.set(Arc::clone(&state.gateway));
    Ok(state)
}

// ============================================================================
// SECTION: Shutdown
// ============================================================================

/// Best-effort pause of running agents so state survives restarts.
async fn shutdown(state: &Arc<AppState>) {
    for handle in state.gateway.registry().list() {
        if handle.status != AgentStatus::Running {
            continue;
        }
        match state.gateway.pause(&handle.agent_id).await {
            Ok(serialized) => {
                if let Err(error) = state.store.store_checkpoint(
                    &serialized,
                    None,
                    overseer_core::DEFAULT_CHECKPOINTS_PER_AGENT,
                ) {
                    tracing::warn!(agent = %handle.agent_id, %error, "shutdown checkpoint failed");
                }
            }
            Err(error) => {
                tracing::warn!(agent = %handle.agent_id, %error, "shutdown pause failed");
            }
        }
    }
}
