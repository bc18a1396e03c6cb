// SPDX-FileCopyrightText: 2026 TableTalk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket frame types.
//!
//! Every frame is a JSON object with a `type` discriminator plus optional
//! `sessionId`, `data`, and `timestamp`. Client frames are a tagged union
//! with per-variant payload structs; unknown types decode to
//! [`ClientFrame::Unknown`] and are logged, not rejected.

use serde::{Deserialize, Serialize};

use tabletalk_core::types::{CompiledAgent, EphemeralCredential, IntentResponse, UserInfo};
use tabletalk_session::HistoryEntry;

// --- Client -> Server ---

/// Inbound frame union, discriminated on `type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    RealtimeSessionRequest {
        #[serde(default)]
        data: Option<RealtimeSessionRequestData>,
    },
    ClientReadyRequest {
        #[serde(default)]
        data: Option<ClientReadyData>,
    },
    UserMessage {
        #[serde(default)]
        data: Option<UserMessagePayload>,
    },
    TtsRequest {
        #[serde(default)]
        data: Option<TtsPayload>,
    },
    ConversationSummaryRequest {
        #[serde(default)]
        data: Option<SummaryRequestData>,
    },
    ConversationCompleted {
        #[serde(default)]
        data: Option<CompletedData>,
    },
    Test {
        #[serde(default)]
        data: serde_json::Value,
    },
    /// Any unrecognized `type`; ignored after logging.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RealtimeSessionRequestData {
    pub user_email: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientReadyData {
    pub agent_id: Option<String>,
    pub user_email: Option<String>,
}

/// `user_message` data arrives either as a bare string or as the structured
/// turn object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UserMessagePayload {
    Text(String),
    Structured(Box<UserMessageData>),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserMessageData {
    pub prompt: String,
    pub user_transcript: Option<String>,
    pub conversation_id: Option<String>,
    pub agent_id: Option<String>,
    pub section_id: Option<String>,
    /// Arrives as a number or a string depending on the client path.
    pub intent_id: Option<serde_json::Value>,
    pub intent_prompt: Option<String>,
    pub stt_confidence: Option<f64>,
    pub stt_alternatives: Option<Vec<String>>,
}

impl UserMessageData {
    /// Intent id flattened to its string form, if present and non-empty.
    pub fn intent_id_str(&self) -> Option<String> {
        match self.intent_id.as_ref()? {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// `tts_request` payload: `{text}`, `{data: text}`, or a bare string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TtsPayload {
    Object { text: String },
    Nested { data: String },
    Raw(String),
}

impl TtsPayload {
    pub fn text(&self) -> &str {
        match self {
            TtsPayload::Object { text } => text,
            TtsPayload::Nested { data } => data,
            TtsPayload::Raw(text) => text,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SummaryRequestData {
    pub conversation_history: Vec<HistoryEntry>,
    pub agent_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompletedData {
    pub completed_fields: serde_json::Map<String, serde_json::Value>,
    pub conversation_history: Vec<HistoryEntry>,
    pub agent_id: Option<String>,
}

// --- Server -> Client ---

/// Outbound frame envelope.
#[derive(Debug, Clone, Serialize)]
pub struct ServerFrame {
    #[serde(rename = "type")]
    pub frame_type: &'static str,
    pub data: serde_json::Value,
    pub timestamp: i64,
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl ServerFrame {
    fn new(frame_type: &'static str, data: serde_json::Value) -> Self {
        Self {
            frame_type,
            data,
            timestamp: now_millis(),
        }
    }

    pub fn status(message: impl Into<String>) -> Self {
        Self::new("status", serde_json::json!({ "message": message.into() }))
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new("error", serde_json::json!({ "message": message.into() }))
    }

    pub fn ai_response(intent_response: &IntentResponse) -> Self {
        Self::new(
            "ai_response",
            serde_json::json!({ "intentResponse": intent_response }),
        )
    }

    pub fn tts_response(text: &str, audio_base64: &str, duration_ms: u64) -> Self {
        Self::new(
            "tts_response",
            serde_json::json!({ "text": text, "audio": audio_base64, "duration": duration_ms }),
        )
    }

    pub fn client_ready_response(agent: &CompiledAgent, user_info: &UserInfo) -> Self {
        Self::new(
            "client_ready_response",
            serde_json::json!({ "agent": agent, "userInfo": user_info }),
        )
    }

    pub fn realtime_session_response(credential: &EphemeralCredential) -> Self {
        Self::new(
            "realtime_session_response",
            serde_json::to_value(credential).unwrap_or_default(),
        )
    }

    pub fn conversation_summary_response(summary: &str) -> Self {
        Self::new(
            "conversation_summary_response",
            serde_json::json!({ "summary": summary }),
        )
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"type":"error","data":{"message":"frame serialization failed"}}"#.to_string()
        })
    }
}
