// SPDX-FileCopyrightText: 2026 TableTalk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Heartbeat and transport tests over a real WebSocket.
//!
//! These spin up the axum gateway on an ephemeral port and drive it with a
//! tokio-tungstenite client. Polling the client stream answers server pings
//! automatically; a client that never polls never pongs, which is how the
//! missed-pong path is exercised.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use tabletalk_core::StorageAdapter;
use tabletalk_core::types::SessionStatus;
use tabletalk_gateway::server::{GatewayState, router};
use tabletalk_test_utils::TestHarness;

/// Serve the gateway on an ephemeral port; returns the ws URL base.
async fn start_gateway(harness: &TestHarness, heartbeat: Duration) -> String {
    let state = GatewayState {
        orchestrator: harness.orchestrator.clone(),
        heartbeat_interval: heartbeat,
        start_time: std::time::Instant::now(),
    };
    let app = router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("ws://{addr}/ws")
}

/// Poll until the registry holds (or no longer holds) the session.
async fn wait_for_registry(harness: &TestHarness, session_id: &str, present: bool) -> bool {
    for _ in 0..100 {
        if harness.registry.get(session_id).is_some() == present {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

#[tokio::test]
async fn missing_params_close_with_policy_violation() {
    let harness = TestHarness::builder().build().await.unwrap();
    let url = start_gateway(&harness, Duration::from_secs(30)).await;

    let (mut ws, _) = connect_async(format!("{url}?sessionId=only")).await.unwrap();
    loop {
        match tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("close frame expected before timeout")
        {
            Some(Ok(Message::Close(Some(frame)))) => {
                assert_eq!(frame.code, CloseCode::Policy);
                break;
            }
            Some(Ok(_)) => continue,
            other => panic!("expected close frame, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn missed_pongs_drop_connection_and_clean_up_session() {
    let harness = TestHarness::builder().build().await.unwrap();
    let url = start_gateway(&harness, Duration::from_millis(50)).await;

    // Hold the socket without polling it: server pings are never answered.
    let (ws, _) = connect_async(format!("{url}?sessionId=hb-dead&userEmail=hb@ex.com"))
        .await
        .unwrap();
    assert!(
        wait_for_registry(&harness, "hb-dead", true).await,
        "session must attach first"
    );

    // Pong age exceeds 3x the heartbeat after ~150ms; the server closes the
    // socket and evicts the session.
    assert!(
        wait_for_registry(&harness, "hb-dead", false).await,
        "registry entry must be evicted after missed pongs"
    );
    let session = harness.storage.get_session("hb-dead").await.unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Completed);

    drop(ws);
}

#[tokio::test]
async fn responsive_client_survives_heartbeat_window() {
    let harness = TestHarness::builder().build().await.unwrap();
    let url = start_gateway(&harness, Duration::from_millis(50)).await;

    let (ws, _) = connect_async(format!("{url}?sessionId=hb-alive&userEmail=hb2@ex.com"))
        .await
        .unwrap();
    assert!(wait_for_registry(&harness, "hb-alive", true).await);

    // Continuously polling the stream answers pings with pongs.
    let reader = tokio::spawn(async move {
        let mut ws = ws;
        while let Some(Ok(_)) = ws.next().await {}
    });

    // Several multiples of the 3x-heartbeat drop window.
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(
        harness.registry.get("hb-alive").is_some(),
        "responsive client must not be dropped"
    );
    let session = harness.storage.get_session("hb-alive").await.unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Active);

    reader.abort();
}

#[tokio::test]
async fn test_frame_round_trips_over_real_socket() {
    let harness = TestHarness::builder().build().await.unwrap();
    let url = start_gateway(&harness, Duration::from_secs(30)).await;

    let (mut ws, _) = connect_async(format!("{url}?sessionId=ws-echo&userEmail=echo@ex.com"))
        .await
        .unwrap();
    ws.send(Message::Text(r#"{"type":"test","data":{"ping":1}}"#.into()))
        .await
        .unwrap();

    // Skip the connect status frame; the echo follows.
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("echo expected before timeout")
            .expect("socket must stay open")
            .unwrap();
        if let Message::Text(text) = msg {
            let frame: serde_json::Value = serde_json::from_str(&text).unwrap();
            if frame["type"] == "status"
                && frame["data"]["message"].as_str().unwrap().contains("echo")
            {
                break;
            }
        }
    }
}
