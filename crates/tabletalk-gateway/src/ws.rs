// SPDX-FileCopyrightText: 2026 TableTalk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket transport for the session orchestrator.
//!
//! `GET /ws?sessionId=<str>&userEmail=<str>`; connections missing either
//! parameter are closed with policy-violation code 1008. Each connection
//! runs one reader loop plus a sender task that preserves enqueue order and
//! pings idle clients every 30 s.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use axum::{
    extract::{
        Query, State, WebSocketUpgrade,
        ws::{CloseFrame, Message, WebSocket},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::frames::{ClientFrame, ServerFrame};
use crate::server::GatewayState;

/// RFC 6455 policy violation, sent when required query params are missing.
const CLOSE_POLICY_VIOLATION: u16 = 1008;

/// Outbound frame buffer per connection; sends enqueue in order.
const OUTBOUND_BUFFER: usize = 64;

/// Query parameters carried on the upgrade request.
#[derive(Debug, Deserialize)]
pub struct WsParams {
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
    #[serde(rename = "userEmail")]
    pub user_email: Option<String>,
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<GatewayState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, params))
}

async fn handle_socket(mut socket: WebSocket, state: GatewayState, params: WsParams) {
    let session_id = params.session_id.filter(|s| !s.trim().is_empty());
    let user_email = params.user_email.filter(|e| !e.trim().is_empty());
    let (Some(session_id), Some(user_email)) = (session_id, user_email) else {
        let _ = socket
            .send(Message::Close(Some(CloseFrame {
                code: CLOSE_POLICY_VIOLATION,
                reason: "sessionId and userEmail query parameters are required".into(),
            })))
            .await;
        return;
    };

    let entry = match state.orchestrator.connect(&session_id, &user_email).await {
        Ok(entry) => entry,
        Err(e) => {
            warn!(session_id, error = %e, "session establishment failed");
            let frame = ServerFrame::error("failed to establish session");
            let _ = socket.send(Message::Text(frame.to_json().into())).await;
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };

    // Child token: closing this socket cancels its background work without
    // tearing down a concurrent peer on the same session.
    let conn_token = entry.cancel.child_token();
    let (tx, mut rx) = mpsc::channel::<ServerFrame>(OUTBOUND_BUFFER);
    let (mut ws_tx, mut ws_rx) = socket.split();

    let _ = tx.send(ServerFrame::status("connected")).await;

    // Sender task: forwards frames in enqueue order and heartbeats idle
    // connections. A stale pong closes the socket, cancels the connection
    // token (waking the reader), and flags the session for eviction.
    let heartbeat = state.heartbeat_interval;
    let last_pong = Arc::new(AtomicI64::new(chrono::Utc::now().timestamp_millis()));
    let pong_timed_out = Arc::new(AtomicBool::new(false));
    let sender_pong = last_pong.clone();
    let sender_timed_out = pong_timed_out.clone();
    let sender_token = conn_token.clone();
    let sender_session = session_id.clone();
    let sender = tokio::spawn(async move {
        let mut ping = tokio::time::interval(heartbeat);
        ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        ping.tick().await; // immediate first tick
        loop {
            tokio::select! {
                frame = rx.recv() => {
                    let Some(frame) = frame else { break };
                    if ws_tx.send(Message::Text(frame.to_json().into())).await.is_err() {
                        break;
                    }
                }
                _ = ping.tick() => {
                    let age = chrono::Utc::now().timestamp_millis()
                        - sender_pong.load(Ordering::Relaxed);
                    if age > 3 * heartbeat.as_millis() as i64 {
                        warn!(session_id = %sender_session, "missed pongs, dropping connection");
                        sender_timed_out.store(true, Ordering::Relaxed);
                        let _ = ws_tx.send(Message::Close(None)).await;
                        sender_token.cancel();
                        break;
                    }
                    if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
                _ = sender_token.cancelled() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    // Reader loop: one frame at a time, malformed JSON answered with an
    // error frame but the connection stays up. Also watches the connection
    // token so a missed-pong drop tears the reader down promptly.
    loop {
        let msg = tokio::select! {
            msg = ws_rx.next() => msg,
            _ = conn_token.cancelled() => break,
        };
        let Some(Ok(msg)) = msg else { break };
        match msg {
            Message::Text(text) => {
                let text_str: &str = &text;
                match serde_json::from_str::<ClientFrame>(text_str) {
                    Ok(frame) => {
                        state
                            .orchestrator
                            .dispatch(&entry, frame, &tx, &conn_token)
                            .await;
                    }
                    Err(e) => {
                        debug!(session_id, error = %e, "malformed frame");
                        let _ = tx.send(ServerFrame::error("malformed frame")).await;
                    }
                }
            }
            Message::Pong(_) => {
                last_pong.store(chrono::Utc::now().timestamp_millis(), Ordering::Relaxed);
                entry.touch().await;
            }
            Message::Close(_) => break,
            // Binary frames are not part of the protocol; pings are answered
            // by the protocol layer.
            _ => {}
        }
    }

    conn_token.cancel();
    drop(tx);
    let _ = sender.await;

    // A client that stopped answering pings is gone for good: clean up the
    // session, not just the socket.
    if pong_timed_out.load(Ordering::Relaxed) {
        state.orchestrator.evict_session(&session_id).await;
    }
    info!(session_id, "connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ws_params_decode_both_fields() {
        let params: WsParams =
            serde_json::from_str(r#"{"sessionId":"s1","userEmail":"a@ex.com"}"#).unwrap();
        assert_eq!(params.session_id.as_deref(), Some("s1"));
        assert_eq!(params.user_email.as_deref(), Some("a@ex.com"));
    }

    #[test]
    fn ws_params_tolerate_missing_fields() {
        let params: WsParams = serde_json::from_str(r#"{"sessionId":"s1"}"#).unwrap();
        assert_eq!(params.session_id.as_deref(), Some("s1"));
        assert!(params.user_email.is_none());
    }

    #[test]
    fn close_code_is_policy_violation() {
        assert_eq!(CLOSE_POLICY_VIOLATION, 1008);
    }
}
