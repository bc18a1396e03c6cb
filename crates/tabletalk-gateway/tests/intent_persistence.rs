// SPDX-FileCopyrightText: 2026 TableTalk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the intent-response persistence path: effective id
//! selection, conversation-ref keying, and field accumulation across turns.

use std::collections::BTreeMap;

use tabletalk_core::StorageAdapter;
use tabletalk_core::types::IntentResponse;
use tabletalk_test_utils::TestHarness;

fn response(id: &str, completed: bool, fields: &[(&str, &str)]) -> IntentResponse {
    IntentResponse {
        id: id.into(),
        is_completed: completed,
        fields: fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        next_prompt: "And then?".into(),
    }
}

#[tokio::test]
async fn conversation_id_preferred_over_agent_id_as_key() {
    let harness = TestHarness::builder()
        .with_intent_responses(vec![response("3221", true, &[("name", "Johnny")])])
        .build()
        .await
        .unwrap();
    let mut conn = harness.connect("key-1", "k1@ex.com").await.unwrap();

    conn.send_json(
        r#"{"type":"user_message","data":{
            "prompt":"x","intentId":3221,
            "conversationId":"conv-77","agentId":"A"
        }}"#,
    )
    .await;
    conn.recv_type("ai_response").await.unwrap();
    harness.settle().await;

    // Keyed on the conversation id, not the agent id.
    assert!(harness
        .storage
        .get_intent_response("key-1", "conv-77", None, "3221")
        .await
        .unwrap()
        .is_some());
    assert!(harness
        .storage
        .get_intent_response("key-1", "A", None, "3221")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn llm_id_used_when_metadata_id_missing() {
    let harness = TestHarness::builder()
        .with_intent_responses(vec![response("9005", true, &[("mood", "great")])])
        .build()
        .await
        .unwrap();
    let mut conn = harness.connect("key-2", "k2@ex.com").await.unwrap();

    conn.send_json(r#"{"type":"user_message","data":{"prompt":"no header","agentId":"A"}}"#)
        .await;
    conn.recv_type("ai_response").await.unwrap();
    harness.settle().await;

    let record = harness
        .storage
        .get_intent_response("key-2", "A", None, "9005")
        .await
        .unwrap()
        .expect("record keyed by LLM-returned id");
    assert_eq!(record.fields.get("mood").map(String::as_str), Some("great"));
}

#[tokio::test]
async fn prompt_header_id_is_last_resort() {
    let harness = TestHarness::builder()
        .with_intent_responses(vec![response("", true, &[("name", "Ana")])])
        .build()
        .await
        .unwrap();
    let mut conn = harness.connect("key-3", "k3@ex.com").await.unwrap();

    conn.send_json(
        r#"{"type":"user_message","data":{"prompt":"Intent ID:\n5150\nUser: hi","agentId":"A"}}"#,
    )
    .await;
    conn.recv_type("ai_response").await.unwrap();
    harness.settle().await;

    assert!(harness
        .storage
        .get_intent_response("key-3", "A", None, "5150")
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn empty_extraction_persists_nothing() {
    // No effective id at all, and no fields: nothing to store.
    let harness = TestHarness::builder().build().await.unwrap();
    let mut conn = harness.connect("key-4", "k4@ex.com").await.unwrap();

    conn.send_json(r#"{"type":"user_message","data":"hello there"}"#).await;
    conn.recv_type("ai_response").await.unwrap();
    harness.settle().await;

    assert!(harness
        .storage
        .list_intent_responses("key-4")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn fields_accumulate_across_turns_into_superset() {
    let harness = TestHarness::builder()
        .with_intent_responses(vec![
            response("3221", false, &[("name", "Johnny")]),
            response("3221", true, &[("age", "30")]),
        ])
        .build()
        .await
        .unwrap();
    let mut conn = harness.connect("key-5", "k5@ex.com").await.unwrap();

    for transcript in ["I'm Johnny", "I'm 30"] {
        let frame = serde_json::json!({
            "type": "user_message",
            "data": {
                "prompt": "x",
                "userTranscript": transcript,
                "intentId": 3221,
                "agentId": "A"
            }
        });
        conn.send_json(&frame.to_string()).await;
        conn.recv_type("ai_response").await.unwrap();
        harness.settle().await;
    }

    let record = harness
        .storage
        .get_intent_response("key-5", "A", None, "3221")
        .await
        .unwrap()
        .unwrap();
    let expected: BTreeMap<String, String> = [
        ("name".to_string(), "Johnny".to_string()),
        ("age".to_string(), "30".to_string()),
    ]
    .into();
    assert_eq!(record.fields, expected);
    assert!(record.is_completed);
    // Latest transcript wins on the record.
    assert_eq!(record.transcript.as_deref(), Some("I'm 30"));
}
