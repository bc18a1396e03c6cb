// SPDX-FileCopyrightText: 2026 TableTalk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end integration tests for the complete TableTalk pipeline.
//!
//! Each test creates an isolated TestHarness with temp SQLite and mock
//! adapters, then drives frames through the orchestrator exactly as the
//! WebSocket reader would. Tests are independent and order-insensitive.

use std::collections::BTreeMap;
use std::time::Duration;

use tabletalk_core::StorageAdapter;
use tabletalk_core::types::{CompletionStatus, IntentResponse, MealType, SessionStatus};
use tabletalk_test_utils::TestHarness;

fn named_intent_response() -> IntentResponse {
    IntentResponse {
        id: "3221".into(),
        is_completed: true,
        fields: BTreeMap::from([("name".to_string(), "Johnny".to_string())]),
        next_prompt: "Nice, Johnny! What did you have for breakfast?".into(),
    }
}

fn meal_intent_response() -> IntentResponse {
    IntentResponse {
        id: "4001".into(),
        is_completed: true,
        fields: BTreeMap::from([
            ("mealType".to_string(), "breakfast".to_string()),
            ("foodsLogged".to_string(), "eggs, toast".to_string()),
            ("totalCalories".to_string(), "300".to_string()),
        ]),
        next_prompt: "Great!".into(),
    }
}

// ---- S1: first-time user completes one intent ----

#[tokio::test]
async fn first_time_user_completes_one_intent() {
    let harness = TestHarness::builder()
        .with_intent_responses(vec![named_intent_response()])
        .build()
        .await
        .unwrap();
    harness.seed_demo_agent("A").await.unwrap();

    let mut conn = harness.connect("s1", "john@ex.com").await.unwrap();

    conn.send_json(r#"{"type":"client_ready_request","data":{"agentId":"A"}}"#)
        .await;
    let ready = conn.recv_type("client_ready_response").await.unwrap();
    assert_eq!(ready["data"]["agent"]["_id"], "A");
    assert_eq!(ready["data"]["agent"]["sections"][0]["introduction"][0]["id"], 3201);
    assert_eq!(ready["data"]["userInfo"]["hasInteractedBefore"], false);

    conn.send_json(
        r#"{
            "type": "user_message",
            "data": {
                "prompt": "Intent: Get user's name\nIntent ID:\n3221\nUser: Call me Johnny",
                "userTranscript": "Call me Johnny",
                "intentId": 3221,
                "agentId": "A",
                "sectionId": "A-sec-1",
                "intentPrompt": "Get user's name"
            }
        }"#,
    )
    .await;

    let ai = conn.recv_type("ai_response").await.unwrap();
    assert_eq!(ai["data"]["intentResponse"]["id"], "3221");
    assert_eq!(ai["data"]["intentResponse"]["isCompleted"], true);
    assert_eq!(ai["data"]["intentResponse"]["fields"]["name"], "Johnny");

    harness.settle().await;

    // One IntentBuilderResponse with the extracted name.
    let record = harness
        .storage
        .get_intent_response("s1", "A", Some("A-sec-1"), "3221")
        .await
        .unwrap()
        .expect("intent response must be persisted");
    assert_eq!(record.fields.get("name").map(String::as_str), Some("Johnny"));
    assert!(record.is_completed);

    // Two conversation messages: user then ai.
    let messages = harness.storage.get_messages("s1").await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].content, "Call me Johnny");
    assert!(messages[1].content.starts_with("Nice, Johnny!"));
}

// ---- S2: intent completion with meal ----

#[tokio::test]
async fn completed_meal_intent_creates_food_entry_and_summary() {
    let harness = TestHarness::builder()
        .with_intent_responses(vec![meal_intent_response()])
        .build()
        .await
        .unwrap();

    let mut conn = harness.connect("s2", "john@ex.com").await.unwrap();
    conn.send_json(
        r#"{
            "type": "user_message",
            "data": {
                "prompt": "Intent ID:\n4001\nUser: eggs and toast",
                "userTranscript": "I had eggs and toast, about 300 calories",
                "intentId": 4001,
                "agentId": "A"
            }
        }"#,
    )
    .await;
    conn.recv_type("ai_response").await.unwrap();
    harness.settle().await;

    let user = harness
        .storage
        .get_user_by_email("john@ex.com")
        .await
        .unwrap()
        .unwrap();
    let entries = harness.storage.list_food_entries(&user.id).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].meal_type, MealType::Breakfast);
    let names: Vec<_> = entries[0].foods.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["eggs", "toast"]);
    assert_eq!(entries[0].total_calories, Some(300.0));

    let conversation = harness.storage.get_conversation("s2").await.unwrap().unwrap();
    assert_eq!(conversation.summary.completion_status, CompletionStatus::Complete);
    assert!(conversation.summary.is_complete_meal);
    assert_eq!(conversation.summary.meal_type, Some(MealType::Breakfast));

    // Meal counter bumped.
    assert_eq!(user.stats.total_meals, 1);
}

// ---- Validation: invalid meal data suppresses the entry ----

#[tokio::test]
async fn invalid_meal_type_suppresses_food_entry_without_failing_turn() {
    let harness = TestHarness::builder()
        .with_intent_responses(vec![IntentResponse {
            id: "4001".into(),
            is_completed: true,
            fields: BTreeMap::from([
                ("mealType".to_string(), "brunch".to_string()),
                ("foodsLogged".to_string(), "eggs".to_string()),
            ]),
            next_prompt: "Noted!".into(),
        }])
        .build()
        .await
        .unwrap();

    let mut conn = harness.connect("s-bad-meal", "kim@ex.com").await.unwrap();
    conn.send_json(r#"{"type":"user_message","data":{"prompt":"Intent ID:\n4001","intentId":4001,"agentId":"A"}}"#)
        .await;
    // The turn still answers.
    let ai = conn.recv_type("ai_response").await.unwrap();
    assert_eq!(ai["data"]["intentResponse"]["nextPrompt"], "Noted!");
    harness.settle().await;

    let user = harness.storage.get_user_by_email("kim@ex.com").await.unwrap().unwrap();
    assert!(harness.storage.list_food_entries(&user.id).await.unwrap().is_empty());
}

// ---- S3: race on reconnect ----

#[tokio::test]
async fn concurrent_connects_converge_on_one_session() {
    let harness = TestHarness::builder().build().await.unwrap();

    let conn_a = harness.connect("s3", "race@ex.com").await.unwrap();
    let conn_b = harness.connect("s3", "race@ex.com").await.unwrap();

    // One registry entry shared by both connections.
    assert!(std::sync::Arc::ptr_eq(&conn_a.entry, &conn_b.entry));
    assert_eq!(harness.registry.len(), 1);

    // Exactly one persisted session row.
    let user = harness.storage.get_user_by_email("race@ex.com").await.unwrap().unwrap();
    let sessions = harness.storage.list_recent_sessions(&user.id, 10).await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].session_id, "s3");
}

// ---- S4: greeting rate limit ----

#[tokio::test]
async fn greeting_requests_are_rate_limited_per_user() {
    // Performance mode keeps the frame sequence deterministic (no tts_response
    // interleaving), so "no new ai_response" can be asserted strictly.
    let harness = TestHarness::builder().with_performance_mode().build().await.unwrap();
    let mut conn = harness.connect("s4", "greet@ex.com").await.unwrap();

    conn.send_json(r#"{"type":"user_message","data":"!request_greeting"}"#).await;
    let first = conn.recv().await.unwrap();
    assert_eq!(first["type"], "ai_response");

    for _ in 0..2 {
        conn.send_json(r#"{"type":"user_message","data":"!request_greeting"}"#).await;
        let limited = conn.recv().await.unwrap();
        assert_eq!(limited["type"], "error");
        let message = limited["data"]["message"].as_str().unwrap();
        assert!(message.contains("please wait"), "got: {message}");
    }
}

// ---- S5: conversation summary ----

#[tokio::test]
async fn summary_request_returns_bullet_digest() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness
        .completion
        .push_text_response("- Agent introduced itself\n- User logged breakfast")
        .await;

    let mut conn = harness.connect("s5", "sum@ex.com").await.unwrap();
    let history: Vec<serde_json::Value> = (0..10)
        .map(|i| {
            serde_json::json!({
                "speaker": if i % 2 == 0 { "Agent" } else { "User" },
                "text": format!("turn {i}")
            })
        })
        .collect();
    let frame = serde_json::json!({
        "type": "conversation_summary_request",
        "data": { "conversationHistory": history }
    });
    conn.send_json(&frame.to_string()).await;

    let response = conn.recv_type("conversation_summary_response").await.unwrap();
    assert_eq!(
        response["data"]["summary"],
        "- Agent introduced itself\n- User logged breakfast"
    );
}

// ---- S6: LLM fallback prompt derivation ----

#[tokio::test]
async fn default_intent_response_gets_fallback_prompt() {
    // Empty mock queue: every turn yields the default IntentResponse.
    let harness = TestHarness::builder().build().await.unwrap();
    let mut conn = harness.connect("s6", "fb@ex.com").await.unwrap();

    // intentPrompt without a question mark gets one appended.
    conn.send_json(
        r#"{"type":"user_message","data":{"prompt":"x","intentId":1,"intentPrompt":"Tell me about your lunch"}}"#,
    )
    .await;
    let ai = conn.recv_type("ai_response").await.unwrap();
    assert_eq!(ai["data"]["intentResponse"]["nextPrompt"], "Tell me about your lunch?");
    assert_eq!(ai["data"]["intentResponse"]["isCompleted"], false);

    // A question-form intentPrompt passes through verbatim.
    conn.send_json(
        r#"{"type":"user_message","data":{"prompt":"x","intentId":1,"intentPrompt":"What did you eat?"}}"#,
    )
    .await;
    let ai = conn.recv_type("ai_response").await.unwrap();
    assert_eq!(ai["data"]["intentResponse"]["nextPrompt"], "What did you eat?");

    // No intent prompt at all: canned clarification.
    conn.send_json(r#"{"type":"user_message","data":"just some words"}"#).await;
    let ai = conn.recv_type("ai_response").await.unwrap();
    assert_eq!(
        ai["data"]["intentResponse"]["nextPrompt"],
        "Could you please clarify or provide more details?"
    );
}

// ---- Send-early/persist-late ordering ----

#[tokio::test]
async fn ai_response_precedes_tts_response() {
    let harness = TestHarness::builder()
        .with_intent_responses(vec![named_intent_response()])
        .build()
        .await
        .unwrap();
    let mut conn = harness.connect("s-order", "ord@ex.com").await.unwrap();

    conn.send_json(r#"{"type":"user_message","data":{"prompt":"Intent ID:\n3221","intentId":3221}}"#)
        .await;

    let first = conn.recv().await.unwrap();
    assert_eq!(first["type"], "ai_response");
    let tts = conn.recv_type("tts_response").await.unwrap();
    assert!(first["timestamp"].as_i64().unwrap() <= tts["timestamp"].as_i64().unwrap());
    assert_eq!(tts["data"]["duration"], 1000);
    // Audio is base64 of the mock bytes.
    assert_eq!(tts["data"]["audio"], "bW9jay1hdWRpbw==");
}

// ---- Standalone TTS ----

#[tokio::test]
async fn tts_request_synthesizes_standalone() {
    let harness = TestHarness::builder().build().await.unwrap();
    let mut conn = harness.connect("s-tts", "tts@ex.com").await.unwrap();

    conn.send_json(r#"{"type":"tts_request","data":{"text":"Say this aloud"}}"#).await;
    let tts = conn.recv_type("tts_response").await.unwrap();
    assert_eq!(tts["data"]["text"], "Say this aloud");

    harness.settle().await;
    let spoken = harness.speech.synthesized.lock().await;
    assert_eq!(spoken.as_slice(), ["Say this aloud"]);
}

// ---- Realtime credential issuing ----

#[tokio::test]
async fn realtime_request_errors_when_disabled() {
    let harness = TestHarness::builder().build().await.unwrap();
    let mut conn = harness.connect("s-rt", "rt@ex.com").await.unwrap();

    conn.send_json(r#"{"type":"realtime_session_request","data":{"userEmail":"rt@ex.com"}}"#)
        .await;
    let err = conn.recv().await.unwrap();
    assert_eq!(err["type"], "error");
    assert!(err["data"]["message"].as_str().unwrap().contains("not configured"));
}

#[tokio::test]
async fn realtime_request_mints_credential_when_enabled() {
    let harness = TestHarness::builder().with_realtime_enabled().build().await.unwrap();
    let mut conn = harness.connect("s-rt2", "rt2@ex.com").await.unwrap();

    conn.send_json(r#"{"type":"realtime_session_request","data":{"userEmail":"rt2@ex.com"}}"#)
        .await;
    let response = conn.recv_type("realtime_session_response").await.unwrap();
    assert_eq!(response["data"]["client_secret"]["value"], "mock-secret-s-rt2");
    assert!(response["data"]["client_secret"]["expires_at"].as_i64().unwrap() > 0);
}

// ---- Finalization ----

#[tokio::test]
async fn conversation_completed_finalizes_session() {
    let harness = TestHarness::builder().build().await.unwrap();
    let mut conn = harness.connect("s-done", "done@ex.com").await.unwrap();

    conn.send_json(
        r#"{
            "type": "conversation_completed",
            "data": {
                "completedFields": {"mealType": "dinner", "name": "Johnny"},
                "conversationHistory": [],
                "agentId": "A"
            }
        }"#,
    )
    .await;
    let status = conn.recv_type("status").await.unwrap();
    assert!(status["data"]["message"].as_str().unwrap().contains("completed"));

    let session = harness.storage.get_session("s-done").await.unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Completed);
    assert!(session.ended_at.is_some());
    assert_eq!(session.context.last_meal_type, Some(MealType::Dinner));
    let completion = session.context.completion.unwrap();
    assert_eq!(completion["name"], "Johnny");
}

// ---- Idle eviction (invariant 6) ----

#[tokio::test]
async fn idle_sessions_are_evicted_and_marked_completed() {
    let harness = TestHarness::builder()
        .with_idle_timeout(Duration::from_millis(50))
        .build()
        .await
        .unwrap();
    let _conn = harness.connect("s-idle", "idle@ex.com").await.unwrap();

    let shutdown = tokio_util::sync::CancellationToken::new();
    let sweeper = harness.registry.clone().spawn_sweeper(
        harness.storage.clone(),
        Duration::from_millis(30),
        shutdown.clone(),
    );

    // Give the sweeper a few ticks past the idle timeout.
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(harness.registry.get("s-idle").is_none(), "entry must be evicted");
    let session = harness.storage.get_session("s-idle").await.unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Completed);

    shutdown.cancel();
    let _ = sweeper.await;
}

// ---- Test echo ----

#[tokio::test]
async fn test_frame_echoes_for_diagnostics() {
    let harness = TestHarness::builder().build().await.unwrap();
    let mut conn = harness.connect("s-echo", "echo@ex.com").await.unwrap();

    conn.send_json(r#"{"type":"test","data":{"ping":1}}"#).await;
    let status = conn.recv_type("status").await.unwrap();
    assert!(status["data"]["message"].as_str().unwrap().contains("echo"));
}

// ---- Performance mode skips turn TTS ----

#[tokio::test]
async fn performance_mode_skips_speech_for_turns() {
    let harness = TestHarness::builder()
        .with_intent_responses(vec![named_intent_response()])
        .with_performance_mode()
        .build()
        .await
        .unwrap();
    let mut conn = harness.connect("s-perf", "perf@ex.com").await.unwrap();

    conn.send_json(r#"{"type":"user_message","data":{"prompt":"Intent ID:\n3221","intentId":3221}}"#)
        .await;
    conn.recv_type("ai_response").await.unwrap();
    harness.settle().await;

    assert!(harness.speech.synthesized.lock().await.is_empty());
}
