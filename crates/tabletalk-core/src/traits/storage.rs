// SPDX-FileCopyrightText: 2026 TableTalk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage gateway trait for persistence backends.

use async_trait::async_trait;

use crate::error::TableTalkError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    AgentRow, Conversation, ConversationMessage, ConversationSummary, FoodEntry, IntentRow,
    IntentResponseRecord, IntentResponseUpsert, NewFoodEntry, SectionRow, Session,
    SessionContext, SessionStatus, User,
};

/// Typed persistence gateway for users, sessions, conversations, agents,
/// intent responses, and food entries.
///
/// Find-or-create operations converge under concurrent races: a uniqueness
/// violation is never surfaced, the existing record is read back instead.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, connection, PRAGMAs).
    async fn initialize(&self) -> Result<(), TableTalkError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), TableTalkError>;

    // --- Users ---

    /// Finds a user by lowercased email, creating one (with a first name
    /// derived from the email local part) if absent.
    async fn find_or_create_user(&self, email: &str) -> Result<User, TableTalkError>;

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, TableTalkError>;

    /// Adds the given deltas to the user's aggregate counters and stamps
    /// `last_active`.
    async fn bump_user_stats(
        &self,
        user_id: &str,
        sessions_delta: i64,
        meals_delta: i64,
    ) -> Result<(), TableTalkError>;

    // --- Sessions ---

    /// Finds or creates the session for the given client-supplied id.
    ///
    /// Contract: never errors on a duplicate `session_id`; concurrent
    /// creations converge on a single row.
    async fn find_or_create_session(
        &self,
        session_id: &str,
        user_id: &str,
        user_email: &str,
        context: &SessionContext,
    ) -> Result<Session, TableTalkError>;

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, TableTalkError>;

    async fn update_session_status(
        &self,
        session_id: &str,
        status: SessionStatus,
    ) -> Result<(), TableTalkError>;

    async fn update_session_context(
        &self,
        session_id: &str,
        context: &SessionContext,
    ) -> Result<(), TableTalkError>;

    /// Most recent sessions for a user, newest first.
    async fn list_recent_sessions(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<Session>, TableTalkError>;

    // --- Conversations ---

    /// Appends a message to the session's conversation, creating the
    /// conversation document if absent. Returns `true` when a new
    /// conversation row was created.
    async fn append_message(
        &self,
        session_id: &str,
        user_id: &str,
        message: &ConversationMessage,
    ) -> Result<bool, TableTalkError>;

    async fn get_conversation(
        &self,
        session_id: &str,
    ) -> Result<Option<Conversation>, TableTalkError>;

    /// Messages for a session's conversation in insertion order.
    async fn get_messages(
        &self,
        session_id: &str,
    ) -> Result<Vec<ConversationMessage>, TableTalkError>;

    async fn update_conversation_summary(
        &self,
        session_id: &str,
        summary: &ConversationSummary,
    ) -> Result<(), TableTalkError>;

    async fn count_conversations(&self, user_id: &str) -> Result<i64, TableTalkError>;

    // --- Intent responses ---

    /// Creates or merges an intent response. Idempotent per
    /// `(session_id, conversation_ref, section_id, intent_id)`: fields merge
    /// last-write-wins per name, `is_completed` only transitions false→true.
    async fn upsert_intent_response(
        &self,
        upsert: &IntentResponseUpsert,
    ) -> Result<(), TableTalkError>;

    async fn get_intent_response(
        &self,
        session_id: &str,
        conversation_ref: &str,
        section_id: Option<&str>,
        intent_id: &str,
    ) -> Result<Option<IntentResponseRecord>, TableTalkError>;

    async fn list_intent_responses(
        &self,
        session_id: &str,
    ) -> Result<Vec<IntentResponseRecord>, TableTalkError>;

    // --- Food entries ---

    /// Persists a meal ledger row. Callers validate the meal type and food
    /// list before reaching storage.
    async fn create_food_entry(&self, entry: &NewFoodEntry)
        -> Result<FoodEntry, TableTalkError>;

    /// Entries for a user, newest date first.
    async fn list_food_entries(&self, user_id: &str) -> Result<Vec<FoodEntry>, TableTalkError>;

    // --- Agent graph (source collections) ---

    async fn get_agent(&self, agent_id: &str) -> Result<Option<AgentRow>, TableTalkError>;

    /// Sections for an agent, sorted by `ord`.
    async fn list_sections(&self, agent_id: &str) -> Result<Vec<SectionRow>, TableTalkError>;

    /// Intents for a section, sorted by `(ord, intent_id)`.
    async fn list_intents(&self, section_id: &str) -> Result<Vec<IntentRow>, TableTalkError>;

    async fn insert_agent(&self, agent: &AgentRow) -> Result<(), TableTalkError>;

    async fn insert_section(&self, section: &SectionRow) -> Result<(), TableTalkError>;

    async fn insert_intent(&self, intent: &IntentRow) -> Result<(), TableTalkError>;
}
