// crates/overseer-gateway/src/container.rs
// ============================================================================
// Module: Container Adapter Transport
// Description: Docker-managed adapter sandbox with health-gated startup.
// Purpose: Run adapter shims in containers with the same RPC surface.
// Dependencies: futures-util, overseer-core, reqwest, serde_json, tokio,
// tokio-tungstenite, tracing, crate::{ports, rpc, sink}
// ============================================================================

//! ## Overview
//! The container transport runs each shim in a container: create with the
//! bootstrap environment and a host-port binding from the pool, start, then
//! poll `GET /health` until it answers 200 or the startup timeout expires
//! (timeout tears the container down and releases the port). The RPC and
//! event surfaces match the local transport. A `docker wait` watcher
//! notifies exit listeners; graceful stop uses SIGTERM with a timeout and a
//! SIGKILL fallback via `docker stop`/`docker rm -f`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use overseer_core::AdapterEvent;
use overseer_core::AgentBrief;
use overseer_core::AgentHandle;
use overseer_core::AgentId;
use overseer_core::AgentStatus;
use overseer_core::BriefPatch;
use overseer_core::ContextInjection;
use overseer_core::DecisionId;
use overseer_core::DecisionResolution;
use overseer_core::KillOptions;
use overseer_core::KillOutcome;
use overseer_core::PluginCapabilities;
use overseer_core::PluginError;
use overseer_core::SerializedAgentState;
use overseer_core::interfaces::AgentPlugin;
use tokio::process::Command;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::ports::PortPool;
use crate::sink::AdapterEventSink;
use crate::sink::SandboxTokenIssuer;

// ============================================================================
// SECTION: Config
// ============================================================================

/// Configuration for the container transport.
///
/// # Invariants
/// - `container_port` is the port the shim binds inside the container.
#[derive(Debug, Clone)]
pub struct ContainerConfig {
    /// Plugin registry name.
    pub plugin_name: String,
    /// Container image to run.
    pub image: String,
    /// Port the shim binds inside the container.
    pub container_port: u16,
    /// Backend base URL handed to the shim.
    pub backend_url: String,
    /// Artifact upload endpoint handed to the shim.
    pub artifact_upload_endpoint: String,
    /// Health poll interval in milliseconds.
    pub health_poll_interval_ms: u64,
    /// Startup timeout in milliseconds.
    pub startup_timeout_ms: u64,
    /// Grace window in milliseconds for SIGTERM before SIGKILL.
    pub kill_grace_ms: u64,
    /// Per-RPC timeout in milliseconds.
    pub rpc_timeout_ms: u64,
}

// ============================================================================
// SECTION: Container Tracking
// ============================================================================

/// A live containerized agent.
struct ContainerAgent {
    /// Container name.
    container_name: String,
    /// Host port bound to the shim.
    host_port: u16,
    /// Base URL for RPCs.
    base_url: String,
    /// Event pump task.
    events_task: tokio::task::JoinHandle<()>,
    /// Exit watcher task.
    wait_task: tokio::task::JoinHandle<()>,
}

// ============================================================================
// SECTION: Plugin
// ============================================================================

/// Container adapter transport plugin.
///
/// # Invariants
/// - Every allocated host port is released on teardown, including failed
///   startups.
pub struct ContainerPlugin {
    /// Transport configuration.
    config: ContainerConfig,
    /// Host port pool.
    ports: Arc<PortPool>,
    /// HTTP client for shim RPCs and health polls.
    client: reqwest::Client,
    /// Live containers keyed by agent id.
    containers: Mutex<HashMap<AgentId, ContainerAgent>>,
    /// Ingestion sink for pumped events.
    sink: Arc<dyn AdapterEventSink>,
    /// Sandbox token issuer for bootstrap payloads.
    tokens: Arc<dyn SandboxTokenIssuer>,
    /// Exit callback invoked when a container exits.
    on_exit: Arc<dyn Fn(&AgentId) + Send + Sync>,
}

impl ContainerPlugin {
    /// Creates the transport.
    #[must_use]
    pub fn new(
        config: ContainerConfig,
        ports: Arc<PortPool>,
        sink: Arc<dyn AdapterEventSink>,
        tokens: Arc<dyn SandboxTokenIssuer>,
        on_exit: Arc<dyn Fn(&AgentId) + Send + Sync>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.rpc_timeout_ms))
            .build()
            .unwrap_or_default();
        Self {
            config,
            ports,
            client,
            containers: Mutex::new(HashMap::new()),
            sink,
            tokens,
            on_exit,
        }
    }

    /// Locks the container map, recovering from poisoning.
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<AgentId, ContainerAgent>> {
        match self.containers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Returns the RPC base URL for an agent.
    fn base_url(&self, agent_id: &AgentId) -> Result<String, PluginError> {
        self.lock()
            .get(agent_id)
            .map(|container| container.base_url.clone())
            .ok_or_else(|| PluginError::NotFound(agent_id.to_string()))
    }

    /// Issues a JSON POST against a live agent's shim.
    async fn agent_post<T: serde::de::DeserializeOwned>(
        &self,
        agent_id: &AgentId,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, PluginError> {
        let base_url = self.base_url(agent_id)?;
        crate::rpc::post_json(&self.client, &base_url, path, body).await
    }

    /// Runs a docker CLI command, failing on non-zero exit.
    async fn docker(args: &[&str]) -> Result<String, PluginError> {
        let output = Command::new("docker")
            .args(args)
            .output()
            .await
            .map_err(|error| PluginError::Transport(error.to_string()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PluginError::Transport(format!(
                "docker {} failed: {}",
                args.first().unwrap_or(&"?"),
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Polls the shim health endpoint until 200 or the startup timeout.
    async fn await_healthy(&self, base_url: &str) -> Result<(), PluginError> {
        let deadline = Duration::from_millis(self.config.startup_timeout_ms);
        let interval = Duration::from_millis(self.config.health_poll_interval_ms.max(1));
        let url = format!("{base_url}/health");
        let poll = async {
            loop {
                if let Ok(response) = self.client.get(&url).send().await
                    && response.status().is_success()
                {
                    return;
                }
                tokio::time::sleep(interval).await;
            }
        };
        tokio::time::timeout(deadline, poll)
            .await
            .map_err(|_| PluginError::Timeout("container health poll".to_string()))
    }

    /// Creates and starts a container for an agent, health-gated. On any
    /// failure the container is removed and the port released.
    async fn boot_container(
        &self,
        agent_id: &AgentId,
        rpc_path: &str,
        rpc_body: &serde_json::Value,
    ) -> Result<AgentHandle, PluginError> {
        let host_port = self.ports.allocate().map_err(|error| {
            PluginError::Transport(error.to_string())
        })?;
        match self.try_boot(agent_id, host_port, rpc_path, rpc_body).await {
            Ok(handle) => Ok(handle),
            Err(error) => {
                let container_name = container_name(&self.config.plugin_name, agent_id);
                let _ = Self::docker(&["rm", "-f", &container_name]).await;
                self.ports.release(host_port);
                Err(error)
            }
        }
    }

    /// The fallible part of container startup, separated so the caller can
    /// clean up uniformly.
    async fn try_boot(
        &self,
        agent_id: &AgentId,
        host_port: u16,
        rpc_path: &str,
        rpc_body: &serde_json::Value,
    ) -> Result<AgentHandle, PluginError> {
        let (token, expires_at) = self.tokens.issue(agent_id);
        let bootstrap = serde_json::json!({
            "backendUrl": self.config.backend_url,
            "backendToken": token,
            "tokenExpiresAt": expires_at,
            "agentId": agent_id,
            "artifactUploadEndpoint": self.config.artifact_upload_endpoint,
        })
        .to_string();
        let container_name = container_name(&self.config.plugin_name, agent_id);
        let publish = format!("{host_port}:{}", self.config.container_port);
        let env = format!("AGENT_BOOTSTRAP={bootstrap}");
        Self::docker(&[
            "create",
            "--name",
            &container_name,
            "-p",
            &publish,
            "-e",
            &env,
            &self.config.image,
        ])
        .await?;
        Self::docker(&["start", &container_name]).await?;
        let base_url = format!("http://127.0.0.1:{host_port}");
        self.await_healthy(&base_url).await?;
        let response: serde_json::Value =
            crate::rpc::post_json(&self.client, &base_url, rpc_path, rpc_body).await?;
        let session_id = response
            .get("sessionId")
            .and_then(serde_json::Value::as_str)
            .map(std::string::ToString::to_string);
        let events_task = self.start_event_pump(agent_id, host_port).await?;
        let wait_task = self.start_exit_watcher(agent_id, &container_name);
        self.lock().insert(agent_id.clone(), ContainerAgent {
            container_name,
            host_port,
            base_url,
            events_task,
            wait_task,
        });
        Ok(AgentHandle {
            agent_id: agent_id.clone(),
            plugin_name: self.config.plugin_name.clone(),
            status: AgentStatus::Running,
            session_id,
        })
    }

    /// Connects the `/events` stream and spawns the pump task.
    async fn start_event_pump(
        &self,
        agent_id: &AgentId,
        host_port: u16,
    ) -> Result<tokio::task::JoinHandle<()>, PluginError> {
        let url = format!("ws://127.0.0.1:{host_port}/events");
        let (stream, _) = connect_async(&url)
            .await
            .map_err(|error| PluginError::Transport(error.to_string()))?;
        let (_, mut reader) = stream.split();
        let sink = Arc::clone(&self.sink);
        let agent_id = agent_id.clone();
        Ok(tokio::spawn(async move {
            while let Some(message) = reader.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        match serde_json::from_str::<AdapterEvent>(text.as_str()) {
                            Ok(event) => sink.ingest(&agent_id, event),
                            Err(error) => {
                                tracing::warn!(agent = %agent_id, %error, "unparseable adapter event");
                            }
                        }
                    }
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
            tracing::info!(agent = %agent_id, "container event stream closed");
        }))
    }

    /// Spawns a `docker wait` watcher notifying exit listeners.
    fn start_exit_watcher(
        &self,
        agent_id: &AgentId,
        container_name: &str,
    ) -> tokio::task::JoinHandle<()> {
        let on_exit = Arc::clone(&self.on_exit);
        let agent_id = agent_id.clone();
        let container_name = container_name.to_string();
        tokio::spawn(async move {
            let _ = Command::new("docker").args(["wait", &container_name]).output().await;
            tracing::info!(agent = %agent_id, container = %container_name, "container exited");
            on_exit(&agent_id);
        })
    }

    /// Stops and removes a container, releasing its port.
    async fn teardown(&self, agent_id: &AgentId) {
        let Some(container) = self.lock().remove(agent_id) else {
            return;
        };
        container.events_task.abort();
        container.wait_task.abort();
        let grace_secs = (self.config.kill_grace_ms / 1_000).max(1).to_string();
        if let Err(error) =
            Self::docker(&["stop", "-t", &grace_secs, &container.container_name]).await
        {
            tracing::warn!(agent = %agent_id, %error, "docker stop failed; forcing removal");
        }
        let _ = Self::docker(&["rm", "-f", &container.container_name]).await;
        self.ports.release(container.host_port);
    }
}

impl std::fmt::Debug for ContainerPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerPlugin")
            .field("plugin_name", &self.config.plugin_name)
            .field("image", &self.config.image)
            .finish_non_exhaustive()
    }
}

/// Builds the container name for an agent.
fn container_name(plugin_name: &str, agent_id: &AgentId) -> String {
    format!("overseer-{plugin_name}-{agent_id}")
}

// ============================================================================
// SECTION: Plugin Contract
// ============================================================================

#[async_trait]
impl AgentPlugin for ContainerPlugin {
    fn name(&self) -> &str {
        &self.config.plugin_name
    }

    fn capabilities(&self) -> PluginCapabilities {
        PluginCapabilities {
            can_pause: true,
            can_resume: true,
            can_checkpoint: true,
            can_update_brief: true,
        }
    }

    async fn spawn(&self, brief: &AgentBrief) -> Result<AgentHandle, PluginError> {
        let body = serde_json::to_value(brief)
            .map_err(|error| PluginError::Protocol(error.to_string()))?;
        self.boot_container(&brief.agent_id, "/spawn", &body).await
    }

    async fn pause(&self, handle: &AgentHandle) -> Result<SerializedAgentState, PluginError> {
        let state: SerializedAgentState =
            self.agent_post(&handle.agent_id, "/pause", &serde_json::json!({})).await?;
        self.teardown(&handle.agent_id).await;
        Ok(state)
    }

    async fn resume(&self, state: &SerializedAgentState) -> Result<AgentHandle, PluginError> {
        let body = serde_json::to_value(state)
            .map_err(|error| PluginError::Protocol(error.to_string()))?;
        self.boot_container(&state.agent_id, "/resume", &body).await
    }

    async fn kill(
        &self,
        handle: &AgentHandle,
        options: &KillOptions,
    ) -> Result<KillOutcome, PluginError> {
        let body = serde_json::to_value(options)
            .map_err(|error| PluginError::Protocol(error.to_string()))?;
        let outcome = if options.grace {
            match self.agent_post::<KillOutcome>(&handle.agent_id, "/kill", &body).await {
                Ok(outcome) => outcome,
                Err(error) => {
                    tracing::warn!(agent = %handle.agent_id, %error, "graceful kill RPC failed");
                    KillOutcome {
                        state: None,
                        artifacts_extracted: false,
                        clean_shutdown: false,
                    }
                }
            }
        } else {
            KillOutcome {
                state: None,
                artifacts_extracted: false,
                clean_shutdown: false,
            }
        };
        self.teardown(&handle.agent_id).await;
        Ok(outcome)
    }

    async fn resolve_decision(
        &self,
        handle: &AgentHandle,
        decision_id: &DecisionId,
        resolution: &DecisionResolution,
    ) -> Result<(), PluginError> {
        let body = serde_json::json!({
            "decisionId": decision_id,
            "resolution": resolution,
        });
        self.agent_post::<serde_json::Value>(&handle.agent_id, "/resolve", &body).await?;
        Ok(())
    }

    async fn inject_context(
        &self,
        handle: &AgentHandle,
        injection: &ContextInjection,
    ) -> Result<(), PluginError> {
        let body = serde_json::to_value(injection)
            .map_err(|error| PluginError::Protocol(error.to_string()))?;
        self.agent_post::<serde_json::Value>(&handle.agent_id, "/inject-context", &body).await?;
        Ok(())
    }

    async fn update_brief(
        &self,
        handle: &AgentHandle,
        patch: &BriefPatch,
    ) -> Result<(), PluginError> {
        let body = serde_json::to_value(patch)
            .map_err(|error| PluginError::Protocol(error.to_string()))?;
        self.agent_post::<serde_json::Value>(&handle.agent_id, "/update-brief", &body).await?;
        Ok(())
    }

    async fn request_checkpoint(
        &self,
        handle: &AgentHandle,
        decision_id: Option<&DecisionId>,
    ) -> Result<SerializedAgentState, PluginError> {
        let body = serde_json::json!({ "decisionId": decision_id });
        self.agent_post(&handle.agent_id, "/checkpoint", &body).await
    }
}
