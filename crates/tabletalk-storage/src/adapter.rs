// SPDX-FileCopyrightText: 2026 TableTalk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter trait.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use tabletalk_config::model::StorageConfig;
use tabletalk_core::types::{
    AgentRow, Conversation, ConversationMessage, ConversationSummary, FoodEntry, IntentRow,
    IntentResponseRecord, IntentResponseUpsert, NewFoodEntry, SectionRow, Session,
    SessionContext, SessionStatus, User,
};
use tabletalk_core::{AdapterType, HealthStatus, PluginAdapter, StorageAdapter, TableTalkError};

use crate::database::Database;
use crate::queries;

/// SQLite-backed storage gateway.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules. The database is lazily initialized on the first
/// call to [`StorageAdapter::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage with the given configuration.
    ///
    /// The database connection is not opened until `initialize` is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Returns a reference to the underlying Database, or an error if not initialized.
    fn db(&self) -> Result<&Database, TableTalkError> {
        self.db.get().ok_or_else(|| TableTalkError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, TableTalkError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), TableTalkError> {
        if let Some(db) = self.db.get() {
            db.close().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), TableTalkError> {
        let path = self.config.database_path.clone();
        let db = Database::open(&path).await?;

        // Apply configured knobs on top of the open defaults.
        let busy_timeout_ms = (self.config.op_timeout_secs * 1000) as i64;
        let journal_mode = if self.config.wal_mode { "WAL" } else { "DELETE" };
        db.connection()
            .call(move |conn| {
                conn.pragma_update(None, "busy_timeout", busy_timeout_ms)?;
                conn.pragma_update(None, "journal_mode", journal_mode)?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;

        self.db.set(db).map_err(|_| TableTalkError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), TableTalkError> {
        self.db()?.close().await
    }

    // --- Users ---

    async fn find_or_create_user(&self, email: &str) -> Result<User, TableTalkError> {
        queries::users::find_or_create_user(self.db()?, email).await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, TableTalkError> {
        queries::users::get_user_by_email(self.db()?, email).await
    }

    async fn bump_user_stats(
        &self,
        user_id: &str,
        sessions_delta: i64,
        meals_delta: i64,
    ) -> Result<(), TableTalkError> {
        queries::users::bump_user_stats(self.db()?, user_id, sessions_delta, meals_delta).await
    }

    // --- Sessions ---

    async fn find_or_create_session(
        &self,
        session_id: &str,
        user_id: &str,
        user_email: &str,
        context: &SessionContext,
    ) -> Result<Session, TableTalkError> {
        queries::sessions::find_or_create_session(
            self.db()?,
            session_id,
            user_id,
            user_email,
            context,
        )
        .await
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, TableTalkError> {
        queries::sessions::get_session(self.db()?, session_id).await
    }

    async fn update_session_status(
        &self,
        session_id: &str,
        status: SessionStatus,
    ) -> Result<(), TableTalkError> {
        queries::sessions::update_session_status(self.db()?, session_id, status).await
    }

    async fn update_session_context(
        &self,
        session_id: &str,
        context: &SessionContext,
    ) -> Result<(), TableTalkError> {
        queries::sessions::update_session_context(self.db()?, session_id, context).await
    }

    async fn list_recent_sessions(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<Session>, TableTalkError> {
        queries::sessions::list_recent_sessions(self.db()?, user_id, limit).await
    }

    // --- Conversations ---

    async fn append_message(
        &self,
        session_id: &str,
        user_id: &str,
        message: &ConversationMessage,
    ) -> Result<bool, TableTalkError> {
        queries::conversations::append_message(self.db()?, session_id, user_id, message).await
    }

    async fn get_conversation(
        &self,
        session_id: &str,
    ) -> Result<Option<Conversation>, TableTalkError> {
        queries::conversations::get_conversation(self.db()?, session_id).await
    }

    async fn get_messages(
        &self,
        session_id: &str,
    ) -> Result<Vec<ConversationMessage>, TableTalkError> {
        queries::conversations::get_messages(self.db()?, session_id).await
    }

    async fn update_conversation_summary(
        &self,
        session_id: &str,
        summary: &ConversationSummary,
    ) -> Result<(), TableTalkError> {
        queries::conversations::update_conversation_summary(self.db()?, session_id, summary)
            .await
    }

    async fn count_conversations(&self, user_id: &str) -> Result<i64, TableTalkError> {
        queries::conversations::count_conversations(self.db()?, user_id).await
    }

    // --- Intent responses ---

    async fn upsert_intent_response(
        &self,
        upsert: &IntentResponseUpsert,
    ) -> Result<(), TableTalkError> {
        queries::intent_responses::upsert_intent_response(self.db()?, upsert).await
    }

    async fn get_intent_response(
        &self,
        session_id: &str,
        conversation_ref: &str,
        section_id: Option<&str>,
        intent_id: &str,
    ) -> Result<Option<IntentResponseRecord>, TableTalkError> {
        queries::intent_responses::get_intent_response(
            self.db()?,
            session_id,
            conversation_ref,
            section_id,
            intent_id,
        )
        .await
    }

    async fn list_intent_responses(
        &self,
        session_id: &str,
    ) -> Result<Vec<IntentResponseRecord>, TableTalkError> {
        queries::intent_responses::list_intent_responses(self.db()?, session_id).await
    }

    // --- Food entries ---

    async fn create_food_entry(
        &self,
        entry: &NewFoodEntry,
    ) -> Result<FoodEntry, TableTalkError> {
        queries::food_entries::create_food_entry(self.db()?, entry).await
    }

    async fn list_food_entries(&self, user_id: &str) -> Result<Vec<FoodEntry>, TableTalkError> {
        queries::food_entries::list_food_entries(self.db()?, user_id).await
    }

    // --- Agent graph ---

    async fn get_agent(&self, agent_id: &str) -> Result<Option<AgentRow>, TableTalkError> {
        queries::agents::get_agent(self.db()?, agent_id).await
    }

    async fn list_sections(&self, agent_id: &str) -> Result<Vec<SectionRow>, TableTalkError> {
        queries::agents::list_sections(self.db()?, agent_id).await
    }

    async fn list_intents(&self, section_id: &str) -> Result<Vec<IntentRow>, TableTalkError> {
        queries::agents::list_intents(self.db()?, section_id).await
    }

    async fn insert_agent(&self, agent: &AgentRow) -> Result<(), TableTalkError> {
        queries::agents::insert_agent(self.db()?, agent).await
    }

    async fn insert_section(&self, section: &SectionRow) -> Result<(), TableTalkError> {
        queries::agents::insert_section(self.db()?, section).await
    }

    async fn insert_intent(&self, intent: &IntentRow) -> Result<(), TableTalkError> {
        queries::agents::insert_intent(self.db()?, intent).await
    }
}
