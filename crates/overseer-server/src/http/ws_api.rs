// crates/overseer-server/src/http/ws_api.rs
// ============================================================================
// Module: Dashboard WebSocket Handler
// Description: Upgrade endpoint bridging the hub to client sockets.
// Purpose: Stream events and state syncs to dashboards.
// Dependencies: axum, futures-util, crate::state
// ============================================================================

//! ## Overview
//! Each dashboard connection subscribes to the hub, receives an immediate
//! `state_sync`, then streams frames until disconnect. Inbound frames are
//! ignored except pings; dashboards drive the system over HTTP, never the
//! socket. Lagged connections are dropped and reconnect with a fresh sync.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::extract::State;
use axum::extract::WebSocketUpgrade;
use axum::extract::ws::Message;
use axum::extract::ws::WebSocket;
use axum::response::Response;
use futures_util::SinkExt;
use futures_util::StreamExt;
use tokio::sync::broadcast::error::RecvError;

use crate::state::AppState;

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// `GET /ws` — upgrades a dashboard connection.
pub async fn upgrade(State(state): State<Arc<AppState>>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| serve_socket(state, socket))
}

/// Serves one dashboard socket until it closes or lags out.
async fn serve_socket(state: Arc<AppState>, socket: WebSocket) {
    let mut receiver = state.hub.subscribe();
    // Seed the client so it renders without waiting for the next change.
    state.broadcast_state_sync();
    let (mut writer, mut reader) = socket.split();
    loop {
        tokio::select! {
            frame = receiver.recv() => match frame {
                Ok(frame) => {
                    if writer.send(Message::Text(frame.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "dashboard connection lagged; dropping");
                    break;
                }
                Err(RecvError::Closed) => break,
            },
            inbound = reader.next() => match inbound {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
}
