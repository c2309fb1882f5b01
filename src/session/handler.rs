//! WebSocket session handler.
//!
//! One session = one user connection: a read loop with a pong-extended
//! deadline, a single write pump that owns the sink, and a dispatcher
//! wired to a fresh per-session registry. Closing the socket cancels
//! every monitor the session owns.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::time::{interval_at, timeout, Instant};
use tracing::{debug, error, info, warn};

use super::{Dispatcher, Outbox};
use crate::engine::AutoOrderRegistry;
use crate::types::{ClientFrame, ServerFrame};
use crate::AppState;

/// Read deadline; extended by any inbound traffic including pongs.
pub const PONG_TIMEOUT: Duration = Duration::from_secs(60);

/// Ping cadence, kept under the pong deadline.
pub const PING_PERIOD: Duration = Duration::from_millis(PONG_TIMEOUT.as_millis() as u64 * 9 / 10);

/// Maximum inbound frame size.
pub const MAX_FRAME_BYTES: usize = 512 * 1024;

#[derive(Debug, Deserialize)]
pub struct SessionParams {
    /// Authenticated upstream; the engine only needs the identity.
    pub user_id: String,
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<SessionParams>,
    State(state): State<AppState>,
) -> Response {
    ws.max_message_size(MAX_FRAME_BYTES)
        .on_upgrade(move |socket| handle_socket(socket, state, params.user_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, user_id: String) {
    info!(user = %user_id, "session connected");
    let (mut sink, mut stream) = socket.split();

    let (outbox, mut frames) = Outbox::channel();

    // Write pump: the only task that touches the sink. Serializes every
    // frame and keeps the connection alive with periodic pings.
    let write_task = tokio::spawn(async move {
        let mut ping = interval_at(Instant::now() + PING_PERIOD, PING_PERIOD);

        loop {
            tokio::select! {
                frame = frames.recv() => match frame {
                    Some(frame) => {
                        let json = match serde_json::to_string(&frame) {
                            Ok(json) => json,
                            Err(e) => {
                                error!(error = %e, "failed to serialize frame");
                                continue;
                            }
                        };
                        if sink.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                    None => {
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                },
                _ = ping.tick() => {
                    if sink.send(Message::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Each session owns its monitors; nothing leaks across users.
    let registry = Arc::new(AutoOrderRegistry::new());
    let dispatcher = Dispatcher::new(
        user_id.clone(),
        state.config.clone(),
        registry,
        state.gateway.clone(),
        state.notifier.clone(),
        state.chat.clone(),
        state.message_store.clone(),
        outbox.clone(),
    );

    loop {
        let next = match timeout(PONG_TIMEOUT, stream.next()).await {
            Ok(next) => next,
            Err(_) => {
                warn!(user = %user_id, "read deadline exceeded; closing session");
                break;
            }
        };

        match next {
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientFrame>(&text) {
                Ok(frame) => dispatcher.handle_frame(frame).await,
                Err(e) => {
                    debug!(user = %user_id, error = %e, "unparseable frame");
                    outbox.send(ServerFrame::error(format!("Invalid message: {}", e)));
                }
            },
            Some(Ok(Message::Pong(_))) => {
                // Deadline already extended by this read.
                debug!(user = %user_id, "pong");
            }
            Some(Ok(Message::Ping(_))) => {
                // axum answers transport pings automatically.
            }
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                error!(user = %user_id, error = %e, "websocket error");
                break;
            }
        }
    }

    dispatcher.teardown();
    write_task.abort();
    info!(user = %user_id, "session disconnected");
}
