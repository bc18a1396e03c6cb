// SPDX-FileCopyrightText: 2026 TableTalk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across adapter traits and the TableTalk framework.
//!
//! Wire-facing structs (compiled agents, intent responses, user info) keep the
//! camelCase field names the browser client expects; storage rows stay
//! snake_case.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Unique identifier for a conversation session (client-supplied).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

/// Unique identifier for a user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the type of adapter in the orchestrator's collaborator set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
pub enum AdapterType {
    Completion,
    Speech,
    Realtime,
    Storage,
}

// --- Users ---

/// Per-user preferences captured over time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserPreferences {
    pub greeting_style: Option<String>,
    pub timezone: Option<String>,
    pub dietary_restrictions: Vec<String>,
    pub goals: Vec<String>,
}

/// Aggregate activity counters for a user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserStats {
    pub total_sessions: i64,
    pub total_meals: i64,
    pub streak_days: i64,
    pub last_active: Option<String>,
}

/// A registered user, unique by lowercased email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub preferences: UserPreferences,
    pub stats: UserStats,
    pub created_at: String,
    pub updated_at: String,
}

// --- Sessions ---

/// Lifecycle status of a persisted session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
    Abandoned,
}

/// User mood inferred for a session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Positive,
    Neutral,
    Negative,
}

/// The four recognized meal types.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

/// Free-form per-session context carried on the session row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionContext {
    pub last_meal_type: Option<MealType>,
    pub last_meal_date: Option<String>,
    /// Engagement score 0-10.
    pub engagement: Option<u8>,
    pub mood: Option<Mood>,
    /// Opaque completion payload supplied by the client at finalization.
    pub completion: Option<serde_json::Value>,
}

/// A persisted conversation session, unique by `session_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub session_id: String,
    pub user_id: String,
    pub user_email: String,
    pub status: SessionStatus,
    pub context: SessionContext,
    pub started_at: String,
    pub ended_at: Option<String>,
}

// --- Conversations ---

/// Whether a message came from the user or the AI.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    User,
    Ai,
}

/// Completion status of a conversation's meal summary.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum CompletionStatus {
    Incomplete,
    Complete,
    Abandoned,
}

/// Per-message metadata captured alongside the content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageMetadata {
    pub meal_context: Option<String>,
    pub sentiment: Option<String>,
    pub confidence: Option<f64>,
    pub processing_time_ms: Option<i64>,
}

/// One entry in a conversation's ordered message log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    /// Storage-assigned sequence id; `None` before insertion.
    pub id: Option<i64>,
    pub message_type: MessageType,
    pub content: String,
    pub timestamp: String,
    #[serde(default)]
    pub metadata: MessageMetadata,
}

/// Rolling meal summary carried on the conversation document.
///
/// Invariant: `completion_status == Complete` implies `is_complete_meal`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub meal_type: Option<MealType>,
    #[serde(default)]
    pub foods_logged: Vec<String>,
    pub total_calories: Option<f64>,
    pub completion_status: CompletionStatus,
    #[serde(default)]
    pub is_complete_meal: bool,
}

impl Default for ConversationSummary {
    fn default() -> Self {
        Self {
            meal_type: None,
            foods_logged: Vec::new(),
            total_calories: None,
            completion_status: CompletionStatus::Incomplete,
            is_complete_meal: false,
        }
    }
}

/// A persisted conversation, 1:1 with a session via `session_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub session_id: String,
    pub user_id: String,
    pub summary: ConversationSummary,
    pub created_at: String,
    pub updated_at: String,
}

// --- Food entries ---

/// A single food item within a meal ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FoodItem {
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fat: Option<f64>,
}

impl Default for FoodItem {
    fn default() -> Self {
        Self {
            name: String::new(),
            quantity: 1.0,
            unit: String::new(),
            calories: None,
            protein: None,
            carbs: None,
            fat: None,
        }
    }
}

impl FoodItem {
    /// Normalizes a bare food name into a structured item.
    pub fn from_name(name: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            ..Self::default()
        }
    }
}

/// A row in the per-user meal ledger, derived from completed intents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodEntry {
    pub id: String,
    pub user_id: String,
    pub meal_type: MealType,
    pub foods: Vec<FoodItem>,
    pub total_calories: Option<f64>,
    pub total_protein: Option<f64>,
    pub total_carbs: Option<f64>,
    pub total_fat: Option<f64>,
    /// Calendar date (YYYY-MM-DD) of the meal.
    pub entry_date: String,
    pub created_at: String,
}

/// Input for creating a food entry; the gateway normalizes bare strings
/// from `foodsLogged` into [`FoodItem`]s when structured data is absent.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFoodEntry {
    pub user_id: String,
    pub meal_type: MealType,
    pub foods: Vec<FoodItem>,
    pub total_calories: Option<f64>,
    pub total_protein: Option<f64>,
    pub total_carbs: Option<f64>,
    pub total_fat: Option<f64>,
    pub entry_date: String,
}

// --- Agents (compiled view) ---

/// One named field the LLM should extract for an intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<String>,
}

impl FieldSpec {
    /// A field spec carrying only a name (legacy comma-list form).
    pub fn named(name: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            field_type: None,
            description: None,
            example: None,
            validation: None,
        }
    }
}

/// A single conversational objective within a section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Intent {
    /// Numeric id, unique within the section, globally referenceable.
    pub id: i64,
    /// The prompt text driving this intent.
    pub intent: String,
    #[serde(default)]
    pub is_mandatory: bool,
    #[serde(default)]
    pub retry_limit: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields_to_extract: Option<Vec<FieldSpec>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// A named grouping of intents with an optional introduction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledSection {
    pub id: String,
    pub name: String,
    pub about: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guidelines: Option<String>,
    #[serde(default)]
    pub introduction: Vec<Intent>,
    #[serde(default)]
    pub intents: Vec<Intent>,
}

/// The denormalized, traversable agent document assembled from the
/// agents/sections/intents collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledAgent {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub about: String,
    #[serde(default)]
    pub mode: Vec<String>,
    #[serde(default)]
    pub sections: Vec<CompiledSection>,
}

// --- Agent source rows (pre-compilation) ---

/// Raw agent header row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRow {
    pub id: String,
    pub name: String,
    pub about: String,
    #[serde(default)]
    pub mode: Vec<String>,
}

/// Raw section row, ordered by `ord` within its agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionRow {
    pub id: String,
    pub agent_id: String,
    pub name: String,
    pub about: String,
    pub guidelines: Option<String>,
    pub ord: i64,
}

/// Raw intent row. `fields_to_extract` is stored opaquely; legacy data holds
/// either a JSON array or a comma list, normalized at compile time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentRow {
    pub section_id: String,
    pub intent_id: i64,
    pub intent: String,
    pub is_mandatory: bool,
    pub retry_limit: u32,
    pub fields_to_extract: Option<String>,
    pub context: Option<String>,
    pub ord: i64,
}

// --- Intent responses ---

/// The strict JSON contract every LLM intent completion must satisfy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    #[serde(default)]
    pub next_prompt: String,
}

impl Default for IntentResponse {
    fn default() -> Self {
        Self {
            id: String::new(),
            is_completed: false,
            fields: BTreeMap::new(),
            next_prompt: String::new(),
        }
    }
}

/// Input for creating-or-merging an intent response record.
#[derive(Debug, Clone, PartialEq)]
pub struct IntentResponseUpsert {
    pub user_id: String,
    pub session_id: String,
    /// Conversation id when the client supplies one, else the agent id.
    pub conversation_ref: String,
    pub section_id: Option<String>,
    pub intent_id: String,
    pub transcript: Option<String>,
    pub intent_prompt: Option<String>,
    pub fields: BTreeMap<String, String>,
    pub is_completed: bool,
}

/// A persisted intent response, keyed by
/// `(session_id, conversation_ref, section_id, intent_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentResponseRecord {
    pub id: String,
    pub user_id: String,
    pub session_id: String,
    pub conversation_ref: String,
    pub section_id: Option<String>,
    pub intent_id: String,
    pub transcript: Option<String>,
    pub intent_prompt: Option<String>,
    pub fields: BTreeMap<String, String>,
    pub is_completed: bool,
    pub created_at: String,
    pub updated_at: String,
}

// --- Speech ---

/// Synthesized speech plus its estimated play time.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechResult {
    pub audio: Vec<u8>,
    pub duration_ms: u64,
}

// --- Realtime credentials ---

/// The short-lived secret embedded in an ephemeral credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSecret {
    pub value: String,
    pub expires_at: i64,
}

/// A short-lived credential for the browser to connect directly to the
/// upstream realtime voice API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EphemeralCredential {
    pub client_secret: ClientSecret,
    pub model: String,
    pub voice: String,
}

// --- User activity snapshot ---

/// Compact user-history snapshot returned with `client_ready_response`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub has_interacted_before: bool,
    pub total_conversations: i64,
    pub total_sessions: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_interaction_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_session_date: Option<String>,
    pub average_engagement: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_meal_type: Option<MealType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_meal_date: Option<String>,
    pub user_stats: UserStatsBrief,
}

/// The stats sub-object of [`UserInfo`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatsBrief {
    pub total_meals: i64,
    pub total_sessions: i64,
}

/// Derives a display first name from an email's local part.
///
/// `john.doe@ex.com` -> `John`; falls back to the whole local part when it
/// has no separator.
pub fn first_name_from_email(email: &str) -> String {
    let local = email.split('@').next().unwrap_or(email);
    let head = local
        .split(['.', '_', '-', '+'])
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(local);
    let mut chars = head.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
