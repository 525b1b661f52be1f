// crates/overseer-gateway/src/local_http.rs
// ============================================================================
// Module: Local HTTP Adapter Transport
// Description: Child-process adapter shim spoken to over JSON HTTP + WS.
// Purpose: Spawn adapter shims, proxy RPCs, and pump their event streams.
// Dependencies: futures-util, overseer-core, reqwest, serde_json, tokio,
// tokio-tungstenite, tracing
// ============================================================================

//! ## Overview
//! The local-HTTP transport runs each adapter shim as a child process. The
//! shim receives an `AGENT_BOOTSTRAP` environment payload, binds an
//! ephemeral port, and announces `{"port": n}` on stdout. RPCs
//! (`/spawn`, `/pause`, `/resume`, `/kill`, `/resolve`, `/inject-context`,
//! `/update-brief`, `/checkpoint`) are JSON over HTTP; observed events
//! arrive over a WebSocket at `/events` and flow into the ingestion sink.
//! A closing event stream is treated as adapter exit.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::process::Stdio;
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
use serde::Deserialize;
use serde::Serialize;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;
use tokio::process::Child;
use tokio::process::Command;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::sink::AdapterEventSink;
use crate::sink::SandboxTokenIssuer;

// ============================================================================
// SECTION: Config
// ============================================================================

/// Configuration for the local-HTTP transport.
///
/// # Invariants
/// - `command` is the adapter shim executable; `args` are passed verbatim.
#[derive(Debug, Clone)]
pub struct LocalHttpConfig {
    /// Plugin registry name.
    pub plugin_name: String,
    /// Shim executable.
    pub command: String,
    /// Shim arguments.
    pub args: Vec<String>,
    /// Backend base URL handed to the shim.
    pub backend_url: String,
    /// Artifact upload endpoint handed to the shim.
    pub artifact_upload_endpoint: String,
    /// Milliseconds to wait for the stdout port announcement.
    pub spawn_timeout_ms: u64,
    /// Milliseconds to wait for a clean exit before SIGKILL.
    pub kill_grace_ms: u64,
    /// Per-RPC timeout in milliseconds.
    pub rpc_timeout_ms: u64,
}

/// Bootstrap payload serialized into `AGENT_BOOTSTRAP`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BootstrapPayload<'a> {
    /// Backend base URL.
    backend_url: &'a str,
    /// Sandbox-scoped backend token.
    backend_token: String,
    /// Token expiry (unix ms).
    token_expires_at: i64,
    /// Agent identifier.
    agent_id: &'a str,
    /// Artifact upload endpoint.
    artifact_upload_endpoint: &'a str,
}

/// Port announcement the shim prints on stdout.
#[derive(Debug, Deserialize)]
struct PortAnnouncement {
    /// Bound port.
    port: u16,
}

/// Response body of `POST /spawn` and `POST /resume`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpawnResponse {
    /// Provider session identifier, when the shim exposes one.
    #[serde(default)]
    session_id: Option<String>,
}

// ============================================================================
// SECTION: Process Tracking
// ============================================================================

/// A live adapter shim process.
struct AdapterProcess {
    /// Child process handle.
    child: Child,
    /// Base URL for RPCs.
    base_url: String,
    /// Event pump task.
    events_task: tokio::task::JoinHandle<()>,
}

// ============================================================================
// SECTION: Plugin
// ============================================================================

/// Local-HTTP adapter transport plugin.
///
/// # Invariants
/// - One shim process per live agent; teardown always reaps the child.
pub struct LocalHttpPlugin {
    /// Transport configuration.
    config: LocalHttpConfig,
    /// HTTP client for shim RPCs.
    client: reqwest::Client,
    /// Live processes keyed by agent id.
    processes: Mutex<HashMap<AgentId, AdapterProcess>>,
    /// Ingestion sink for pumped events.
    sink: Arc<dyn AdapterEventSink>,
    /// Sandbox token issuer for bootstrap payloads.
    tokens: Arc<dyn SandboxTokenIssuer>,
    /// Exit callback invoked when an event stream closes.
    on_exit: Arc<dyn Fn(&AgentId) + Send + Sync>,
}

impl LocalHttpPlugin {
    /// Creates the transport.
    #[must_use]
    pub fn new(
        config: LocalHttpConfig,
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
            client,
            processes: Mutex::new(HashMap::new()),
            sink,
            tokens,
            on_exit,
        }
    }

    /// Locks the process map, recovering from poisoning.
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<AgentId, AdapterProcess>> {
        match self.processes.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Returns the RPC base URL for an agent.
    fn base_url(&self, agent_id: &AgentId) -> Result<String, PluginError> {
        self.lock()
            .get(agent_id)
            .map(|process| process.base_url.clone())
            .ok_or_else(|| PluginError::NotFound(agent_id.to_string()))
    }

    /// Starts a shim process and waits for its port announcement.
    async fn start_process(&self, agent_id: &AgentId) -> Result<(Child, u16), PluginError> {
        let (token, expires_at) = self.tokens.issue(agent_id);
        let bootstrap = BootstrapPayload {
            backend_url: &self.config.backend_url,
            backend_token: token,
            token_expires_at: expires_at,
            agent_id: agent_id.as_str(),
            artifact_upload_endpoint: &self.config.artifact_upload_endpoint,
        };
        let bootstrap = serde_json::to_string(&bootstrap)
            .map_err(|error| PluginError::Protocol(error.to_string()))?;
        let mut child = Command::new(&self.config.command)
            .args(&self.config.args)
            .env("AGENT_BOOTSTRAP", bootstrap)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|error| PluginError::Transport(error.to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PluginError::Transport("shim stdout unavailable".to_string()))?;
        let mut lines = BufReader::new(stdout).lines();
        let announcement = tokio::time::timeout(
            Duration::from_millis(self.config.spawn_timeout_ms),
            lines.next_line(),
        )
        .await
        .map_err(|_| PluginError::Timeout("waiting for shim port announcement".to_string()))?
        .map_err(|error| PluginError::Transport(error.to_string()))?
        .ok_or_else(|| PluginError::Protocol("shim exited before announcing a port".to_string()))?;
        let announcement: PortAnnouncement = serde_json::from_str(&announcement)
            .map_err(|error| PluginError::Protocol(error.to_string()))?;
        Ok((child, announcement.port))
    }

    /// Connects the `/events` stream and spawns the pump task.
    async fn start_event_pump(
        &self,
        agent_id: &AgentId,
        port: u16,
    ) -> Result<tokio::task::JoinHandle<()>, PluginError> {
        let url = format!("ws://127.0.0.1:{port}/events");
        let (stream, _) = connect_async(&url)
            .await
            .map_err(|error| PluginError::Transport(error.to_string()))?;
        let (_, mut reader) = stream.split();
        let sink = Arc::clone(&self.sink);
        let on_exit = Arc::clone(&self.on_exit);
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
            tracing::info!(agent = %agent_id, "adapter event stream closed");
            on_exit(&agent_id);
        }))
    }

    /// Spawns a shim, issues the given lifecycle RPC, and tracks the
    /// process. Shared by spawn and resume.
    async fn boot_agent(
        &self,
        agent_id: &AgentId,
        rpc_path: &str,
        rpc_body: &serde_json::Value,
    ) -> Result<AgentHandle, PluginError> {
        let (child, port) = self.start_process(agent_id).await?;
        let base_url = format!("http://127.0.0.1:{port}");
        let response: SpawnResponse = match crate::rpc::post_json(
            &self.client,
            &base_url,
            rpc_path,
            rpc_body,
        )
        .await
        {
            Ok(response) => response,
            Err(error) => {
                // The shim never became an agent; kill_on_drop reaps it.
                drop(child);
                return Err(error);
            }
        };
        let events_task = self.start_event_pump(agent_id, port).await?;
        self.lock().insert(agent_id.clone(), AdapterProcess {
            child,
            base_url,
            events_task,
        });
        Ok(AgentHandle {
            agent_id: agent_id.clone(),
            plugin_name: self.config.plugin_name.clone(),
            status: AgentStatus::Running,
            session_id: response.session_id,
        })
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

    /// Removes a tracked process and tears it down: wait for a clean exit
    /// within the grace window, then SIGKILL.
    async fn teardown(&self, agent_id: &AgentId) {
        let Some(mut process) = self.lock().remove(agent_id) else {
            return;
        };
        process.events_task.abort();
        let grace = Duration::from_millis(self.config.kill_grace_ms);
        if tokio::time::timeout(grace, process.child.wait()).await.is_err() {
            if let Err(error) = process.child.start_kill() {
                tracing::warn!(agent = %agent_id, %error, "failed to kill shim process");
            }
            let _ = process.child.wait().await;
        }
    }
}

impl std::fmt::Debug for LocalHttpPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalHttpPlugin")
            .field("plugin_name", &self.config.plugin_name)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// SECTION: Plugin Contract
// ============================================================================

#[async_trait]
impl AgentPlugin for LocalHttpPlugin {
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
        self.boot_agent(&brief.agent_id, "/spawn", &body).await
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
        self.boot_agent(&state.agent_id, "/resume", &body).await
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
