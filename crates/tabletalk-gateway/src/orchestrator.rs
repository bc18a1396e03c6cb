// SPDX-FileCopyrightText: 2026 TableTalk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The session orchestrator: routes typed frames, enforces the session
//! lifecycle, and fans work out to storage, the LLM, speech synthesis, and
//! the credential issuer.
//!
//! Latency discipline is send-early/persist-late: the textual `ai_response`
//! for a turn is enqueued before any storage or synthesis side effect runs.
//! Background tasks carry the connection's cancellation token and never
//! block the reader.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use tabletalk_catalog::AgentCatalog;
use tabletalk_core::types::{
    CompletionStatus, ConversationMessage, ConversationSummary, FoodItem, IntentResponse,
    IntentResponseUpsert, MealType, MessageMetadata, MessageType, NewFoodEntry, SessionContext,
    SessionStatus, User,
};
use tabletalk_core::{
    CompletionAdapter, RealtimeAdapter, SpeechAdapter, StorageAdapter, TableTalkError,
};
use tabletalk_session::registry::Lifecycle;
use tabletalk_session::{SessionEntry, SessionRegistry, snapshot, summarizer};
use tabletalk_speech::strip_ssml_tags;

use crate::frames::{
    ClientFrame, ClientReadyData, CompletedData, RealtimeSessionRequestData, ServerFrame,
    SummaryRequestData, TtsPayload, UserMessageData, UserMessagePayload,
};

/// The `user_message` text command requesting a spoken greeting.
const GREETING_COMMAND: &str = "!request_greeting";

/// Canned follow-up when neither the LLM nor the intent prompt yields one.
const CLARIFY_FALLBACK: &str = "Could you please clarify or provide more details?";

/// Canned greeting when the LLM is unreachable.
const GREETING_FALLBACK: &str = "Welcome back! Ready to log a meal?";

/// The output-schema contract for intent turns. The surrounding style guide
/// is configurable; the four-key JSON shape is the invariant.
const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a warm, efficient voice assistant guiding a user through a scripted conversation \
about their meals. Each turn you receive the current intent, the fields to extract, and the \
user's transcript.\n\n\
Respond with STRICTLY a single JSON object and nothing else -- no markdown, no prose around \
it -- with exactly these keys:\n\
  \"id\": the intent id you were given, as a string\n\
  \"isCompleted\": true when every required field was extracted, else false\n\
  \"fields\": an object of extracted field names to string values (empty object when none)\n\
  \"nextPrompt\": what to say to the user next\n\n\
When isCompleted is false, phrase nextPrompt as a short follow-up question for the missing \
fields. When isCompleted is true, phrase it as a warm transition to the next topic.";

/// System prompt for the greeting command path.
const GREETING_SYSTEM_PROMPT: &str = "\
You are a friendly voice assistant for meal logging. Produce one short spoken greeting \
(1-2 sentences) for the user described below. Plain text only, no JSON, no quotes.";

/// Shared collaborators and policy for every connection.
pub struct Orchestrator {
    storage: Arc<dyn StorageAdapter + Send + Sync>,
    completion: Arc<dyn CompletionAdapter + Send + Sync>,
    speech: Arc<dyn SpeechAdapter + Send + Sync>,
    realtime: Arc<dyn RealtimeAdapter + Send + Sync>,
    catalog: Arc<AgentCatalog>,
    registry: Arc<SessionRegistry>,
    tasks: TaskTracker,
    performance_mode: bool,
    system_prompt: Option<String>,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        storage: Arc<dyn StorageAdapter + Send + Sync>,
        completion: Arc<dyn CompletionAdapter + Send + Sync>,
        speech: Arc<dyn SpeechAdapter + Send + Sync>,
        realtime: Arc<dyn RealtimeAdapter + Send + Sync>,
        catalog: Arc<AgentCatalog>,
        registry: Arc<SessionRegistry>,
        performance_mode: bool,
        system_prompt: Option<String>,
    ) -> Self {
        Self {
            storage,
            completion,
            speech,
            realtime,
            catalog,
            registry,
            tasks: TaskTracker::new(),
            performance_mode,
            system_prompt,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Graceful shutdown: wait for in-flight background tasks.
    pub async fn drain(&self) {
        self.tasks.close();
        self.tasks.wait().await;
    }

    /// Wait for currently scheduled background tasks, then accept more.
    /// Lets tests assert on persistence effects deterministically.
    pub async fn settle(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }

    /// Session establishment for a new connection.
    ///
    /// Resolves the user, computes the recent-activity snapshot, converges
    /// on exactly one persisted session row and one registry entry per
    /// `session_id`, and never greets on its own.
    pub async fn connect(
        &self,
        session_id: &str,
        user_email: &str,
    ) -> Result<Arc<SessionEntry>, TableTalkError> {
        let user = self.storage.find_or_create_user(user_email).await?;
        let user_snapshot = snapshot::user_info(self.storage.as_ref(), &user).await?;

        // Registry first, persisted store second; both find-or-create.
        let (entry, created) = self.registry.attach(session_id, &user.id, &user.email);
        let session = self
            .storage
            .find_or_create_session(session_id, &user.id, &user.email, &SessionContext::default())
            .await?;

        if created {
            self.storage.bump_user_stats(&user.id, 1, 0).await?;
        }

        {
            let mut state = entry.state().lock().await;
            if let Err(e) = state.advance_to(Lifecycle::Authenticated) {
                debug!(session_id, error = %e, "lifecycle already past authentication");
            }
            state.snapshot = Some(user_snapshot);
            state.last_activity = Instant::now();
        }

        info!(
            session_id,
            user_id = %user.id,
            created_entry = created,
            status = %session.status,
            "session attached"
        );
        Ok(entry)
    }

    /// Tear down a dead session: remove the registry entry (cancelling its
    /// background work) and mark the persisted row completed, matching idle
    /// eviction. Used by the transport when a client stops answering pings.
    pub async fn evict_session(&self, session_id: &str) {
        let Some(entry) = self.registry.remove(session_id) else {
            return;
        };
        {
            let mut state = entry.state().lock().await;
            let _ = state.advance_to(Lifecycle::Abandoned);
        }
        if let Err(e) = self
            .storage
            .update_session_status(session_id, SessionStatus::Completed)
            .await
        {
            warn!(session_id, error = %e, "failed to mark evicted session completed");
        }
    }

    /// Route one inbound frame. Per-message failures answer with an `error`
    /// frame; the connection stays up.
    pub async fn dispatch(
        &self,
        entry: &Arc<SessionEntry>,
        frame: ClientFrame,
        tx: &mpsc::Sender<ServerFrame>,
        conn_token: &CancellationToken,
    ) {
        entry.touch().await;
        match frame {
            ClientFrame::Test { data } => {
                send(tx, ServerFrame::status(format!("echo: {data}"))).await;
            }
            ClientFrame::RealtimeSessionRequest { data } => {
                self.handle_realtime_request(entry, data, tx).await;
            }
            ClientFrame::ClientReadyRequest { data } => {
                self.handle_client_ready(entry, data.unwrap_or_default(), tx).await;
            }
            ClientFrame::UserMessage { data } => {
                self.handle_user_message(entry, data, tx, conn_token).await;
            }
            ClientFrame::TtsRequest { data } => {
                self.handle_tts_request(data, tx, conn_token);
            }
            ClientFrame::ConversationSummaryRequest { data } => {
                self.handle_summary_request(data.unwrap_or_default(), tx).await;
            }
            ClientFrame::ConversationCompleted { data } => {
                self.handle_conversation_completed(entry, data.unwrap_or_default(), tx)
                    .await;
            }
            ClientFrame::Unknown => {
                debug!(session_id = %entry.session_id, "ignoring unknown frame type");
            }
        }
    }

    // --- realtime_session_request ---

    async fn handle_realtime_request(
        &self,
        entry: &Arc<SessionEntry>,
        data: Option<RealtimeSessionRequestData>,
        tx: &mpsc::Sender<ServerFrame>,
    ) {
        let email = data
            .and_then(|d| d.user_email)
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| entry.user_email.clone());
        if email.trim().is_empty() || !email.contains('@') {
            send(tx, ServerFrame::error("a valid userEmail is required")).await;
            return;
        }
        if !self.realtime.is_enabled() {
            send(tx, ServerFrame::error("realtime voice is not configured")).await;
            return;
        }

        match self
            .realtime
            .mint_ephemeral(&entry.session_id, &entry.user_id, &email)
            .await
        {
            // The issuer's exhaustion default carries an empty secret; the
            // user gets the fallback error frame, never a dead credential.
            Ok(credential) if credential.client_secret.value.is_empty() => {
                warn!(session_id = %entry.session_id, "mint exhausted retries");
                send(tx, ServerFrame::error("failed to create realtime session")).await;
            }
            Ok(credential) => {
                send(tx, ServerFrame::realtime_session_response(&credential)).await;
            }
            Err(e) => {
                warn!(session_id = %entry.session_id, error = %e, "ephemeral mint failed");
                send(tx, ServerFrame::error("failed to create realtime session")).await;
            }
        }
    }

    // --- client_ready_request ---

    async fn handle_client_ready(
        &self,
        entry: &Arc<SessionEntry>,
        data: ClientReadyData,
        tx: &mpsc::Sender<ServerFrame>,
    ) {
        let Some(agent_id) = data.agent_id.filter(|id| !id.trim().is_empty()) else {
            send(tx, ServerFrame::error("client_ready_request requires agentId")).await;
            return;
        };

        let mut state = entry.state().lock().await;
        if let Err(e) = state.advance_to(Lifecycle::AwaitingAgent) {
            debug!(session_id = %entry.session_id, error = %e, "client_ready in unexpected state");
        }

        let compiled = match self.catalog.get_compiled_agent(&agent_id).await {
            Ok(Some(agent)) => agent,
            Ok(None) => {
                send(tx, ServerFrame::error(format!("agent `{agent_id}` not found"))).await;
                return;
            }
            Err(e) => {
                warn!(agent_id, error = %e, "agent compile failed");
                send(tx, ServerFrame::error("failed to load agent")).await;
                return;
            }
        };

        let user_info = match state.snapshot.clone() {
            Some(snapshot) => snapshot,
            None => match self.resolve_user(&entry.user_email).await {
                Ok(user) => snapshot::user_info(self.storage.as_ref(), &user)
                    .await
                    .unwrap_or_default(),
                Err(_) => Default::default(),
            },
        };

        state.agent_id = Some(agent_id.clone());
        if let Err(e) = state.advance_to(Lifecycle::InIntent) {
            debug!(session_id = %entry.session_id, error = %e, "lifecycle transition skipped");
        }
        drop(state);

        send(tx, ServerFrame::client_ready_response(&compiled, &user_info)).await;
        info!(session_id = %entry.session_id, agent_id, "client ready");
    }

    // --- user_message ---

    async fn handle_user_message(
        &self,
        entry: &Arc<SessionEntry>,
        payload: Option<UserMessagePayload>,
        tx: &mpsc::Sender<ServerFrame>,
        conn_token: &CancellationToken,
    ) {
        let (bare_text, data) = match payload {
            Some(UserMessagePayload::Text(text)) => (Some(text), UserMessageData::default()),
            Some(UserMessagePayload::Structured(data)) => (None, *data),
            None => (None, UserMessageData::default()),
        };

        let transcript = data
            .user_transcript
            .clone()
            .or_else(|| bare_text.clone())
            .unwrap_or_default();

        if transcript.trim().starts_with(GREETING_COMMAND)
            || data.prompt.trim().starts_with(GREETING_COMMAND)
        {
            self.handle_greeting(entry, tx, conn_token).await;
            return;
        }

        // Serialize turn processing per session; concurrent sockets on the
        // same session queue here.
        let mut state = entry.state().lock().await;
        state.is_processing = true;
        if let Err(e) = state.advance_to(Lifecycle::InIntent) {
            debug!(session_id = %entry.session_id, error = %e, "user_message in unexpected state");
        }

        let system_prompt = self
            .system_prompt
            .as_deref()
            .unwrap_or(DEFAULT_SYSTEM_PROMPT)
            .to_string();
        let user_prompt = if data.prompt.trim().is_empty() {
            transcript.clone()
        } else {
            data.prompt.clone()
        };

        let started = Instant::now();
        let mut intent_response = match self
            .completion
            .complete_intent(&system_prompt, &user_prompt)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(session_id = %entry.session_id, error = %e, "intent completion failed");
                IntentResponse::default()
            }
        };
        if intent_response.next_prompt.trim().is_empty() {
            intent_response.next_prompt = derive_fallback_prompt(data.intent_prompt.as_deref());
        }
        let processing_ms = started.elapsed().as_millis() as i64;

        // Send-early: the textual reply precedes every side effect.
        send(tx, ServerFrame::ai_response(&intent_response)).await;

        // Cursor bookkeeping under the same lock.
        if intent_response.is_completed {
            state.cursor.record_fields(&intent_response.fields);
            if let Some(agent_id) = state.agent_id.clone() {
                if let Ok(Some(agent)) = self.catalog.get_compiled_agent(&agent_id).await {
                    state.cursor.advance(&agent);
                }
            }
        } else {
            state.cursor.note_retry();
        }
        state.is_processing = false;
        drop(state);

        // Persist-late: independent, cancellable, non-blocking.
        if !self.performance_mode {
            self.spawn_tts(intent_response.next_prompt.clone(), tx.clone(), conn_token.clone());
        }
        self.spawn_persist_turn(
            entry,
            transcript.clone(),
            intent_response.clone(),
            data.stt_confidence,
            processing_ms,
            conn_token.clone(),
        );
        self.spawn_persist_intent_response(entry, &data, &transcript, &intent_response, conn_token);
        self.spawn_meal_aggregation(entry, &intent_response, conn_token);
    }

    // --- greeting command ---

    async fn handle_greeting(
        &self,
        entry: &Arc<SessionEntry>,
        tx: &mpsc::Sender<ServerFrame>,
        conn_token: &CancellationToken,
    ) {
        if let Err(remaining) = self.registry.check_greeting(&entry.user_email) {
            let wait_secs = remaining.as_secs().max(1);
            send(
                tx,
                ServerFrame::error(format!(
                    "please wait {wait_secs}s before requesting another greeting"
                )),
            )
            .await;
            return;
        }

        let greeting = match self.resolve_user(&entry.user_email).await {
            Ok(user) => {
                let style = user
                    .preferences
                    .greeting_style
                    .as_deref()
                    .unwrap_or("friendly")
                    .to_string();
                let context = format!(
                    "User first name: {}. Greeting style: {}. Total meals logged: {}.",
                    user.first_name, style, user.stats.total_meals
                );
                self.completion
                    .complete_text(GREETING_SYSTEM_PROMPT, &context)
                    .await
                    .ok()
                    .filter(|g| !g.trim().is_empty())
                    .unwrap_or_else(|| format!("Hi {}! {GREETING_FALLBACK}", user.first_name))
            }
            Err(_) => GREETING_FALLBACK.to_string(),
        };

        let response = IntentResponse {
            next_prompt: greeting.clone(),
            ..IntentResponse::default()
        };
        send(tx, ServerFrame::ai_response(&response)).await;
        if !self.performance_mode {
            self.spawn_tts(greeting, tx.clone(), conn_token.clone());
        }
    }

    // --- tts_request ---

    fn handle_tts_request(
        &self,
        payload: Option<TtsPayload>,
        tx: &mpsc::Sender<ServerFrame>,
        conn_token: &CancellationToken,
    ) {
        let Some(text) = payload.map(|p| p.text().to_string()).filter(|t| !t.trim().is_empty())
        else {
            let tx = tx.clone();
            self.tasks.spawn(async move {
                send(&tx, ServerFrame::error("tts_request requires text")).await;
            });
            return;
        };
        self.spawn_tts(text, tx.clone(), conn_token.clone());
    }

    /// Synthesize in the background and deliver a `tts_response`.
    ///
    /// The display text is always SSML-stripped; the spoken text may carry
    /// SSML when the provider supports it.
    fn spawn_tts(&self, text: String, tx: mpsc::Sender<ServerFrame>, token: CancellationToken) {
        let speech = self.speech.clone();
        self.spawn_bg(token, async move {
            let display = strip_ssml_tags(&text);
            match speech.synthesize(&text).await {
                Ok(result) => {
                    let audio = BASE64.encode(&result.audio);
                    send(&tx, ServerFrame::tts_response(&display, &audio, result.duration_ms))
                        .await;
                }
                Err(e) => {
                    warn!(error = %e, "speech synthesis failed");
                    send(&tx, ServerFrame::error("speech synthesis failed")).await;
                }
            }
        });
    }

    // --- conversation_summary_request ---

    async fn handle_summary_request(
        &self,
        data: SummaryRequestData,
        tx: &mpsc::Sender<ServerFrame>,
    ) {
        if data.conversation_history.is_empty() {
            send(tx, ServerFrame::error("conversation history is empty")).await;
            return;
        }
        match summarizer::summarize_history(self.completion.as_ref(), &data.conversation_history)
            .await
        {
            Ok(summary) => {
                send(tx, ServerFrame::conversation_summary_response(&summary)).await;
            }
            Err(e) => {
                warn!(error = %e, "summary generation failed");
                send(tx, ServerFrame::error("failed to generate summary")).await;
            }
        }
    }

    // --- conversation_completed ---

    async fn handle_conversation_completed(
        &self,
        entry: &Arc<SessionEntry>,
        data: CompletedData,
        tx: &mpsc::Sender<ServerFrame>,
    ) {
        {
            let mut state = entry.state().lock().await;
            if let Err(e) = state.advance_to(Lifecycle::Completed) {
                debug!(session_id = %entry.session_id, error = %e, "completion in unexpected state");
            }
        }

        let session_id = entry.session_id.clone();
        let completed_fields = serde_json::Value::Object(data.completed_fields.clone());

        // Carry the opaque completion payload on the session context.
        let mut context = match self.storage.get_session(&session_id).await {
            Ok(Some(session)) => session.context,
            _ => SessionContext::default(),
        };
        context.completion = Some(completed_fields);
        if let Some(meal) = meal_from_completed(&data.completed_fields) {
            context.last_meal_type = Some(meal);
            context.last_meal_date = Some(today());
        }

        let result: Result<(), TableTalkError> = async {
            self.storage.update_session_context(&session_id, &context).await?;
            self.storage
                .update_session_status(&session_id, SessionStatus::Completed)
                .await?;
            Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                info!(session_id = %entry.session_id, "conversation completed");
                send(tx, ServerFrame::status("conversation completed")).await;
            }
            Err(e) => {
                warn!(session_id = %entry.session_id, error = %e, "finalization failed");
                send(tx, ServerFrame::error("failed to finalize conversation")).await;
            }
        }
    }

    // --- background persistence ---

    /// Append the user and ai messages for one turn.
    fn spawn_persist_turn(
        &self,
        entry: &Arc<SessionEntry>,
        transcript: String,
        intent_response: IntentResponse,
        stt_confidence: Option<f64>,
        processing_ms: i64,
        token: CancellationToken,
    ) {
        let storage = self.storage.clone();
        let session_id = entry.session_id.clone();
        let user_id = entry.user_id.clone();
        self.spawn_bg(token, async move {
            if !transcript.trim().is_empty() {
                let user_msg = ConversationMessage {
                    id: None,
                    message_type: MessageType::User,
                    content: transcript,
                    timestamp: chrono::Utc::now().to_rfc3339(),
                    metadata: MessageMetadata {
                        confidence: stt_confidence,
                        ..MessageMetadata::default()
                    },
                };
                if let Err(e) = storage.append_message(&session_id, &user_id, &user_msg).await {
                    warn!(session_id, error = %e, "failed to persist user message");
                    return;
                }
            }
            let ai_msg = ConversationMessage {
                id: None,
                message_type: MessageType::Ai,
                content: intent_response.next_prompt,
                timestamp: chrono::Utc::now().to_rfc3339(),
                metadata: MessageMetadata {
                    processing_time_ms: Some(processing_ms),
                    ..MessageMetadata::default()
                },
            };
            if let Err(e) = storage.append_message(&session_id, &user_id, &ai_msg).await {
                warn!(session_id, error = %e, "failed to persist ai message");
            }
        });
    }

    /// Persist the structured extraction when the turn carries an effective
    /// intent id and something worth storing.
    fn spawn_persist_intent_response(
        &self,
        entry: &Arc<SessionEntry>,
        data: &UserMessageData,
        transcript: &str,
        intent_response: &IntentResponse,
        conn_token: &CancellationToken,
    ) {
        let Some(effective_id) =
            effective_intent_id(data.intent_id_str(), &intent_response.id, &data.prompt)
        else {
            return;
        };
        if intent_response.fields.is_empty() && !intent_response.is_completed {
            return;
        }

        let conversation_ref = data
            .conversation_id
            .clone()
            .or_else(|| data.agent_id.clone())
            .unwrap_or_else(|| entry.session_id.clone());
        let upsert = IntentResponseUpsert {
            user_id: entry.user_id.clone(),
            session_id: entry.session_id.clone(),
            conversation_ref,
            section_id: data.section_id.clone(),
            intent_id: effective_id,
            transcript: Some(transcript.to_string()).filter(|t| !t.trim().is_empty()),
            intent_prompt: data.intent_prompt.clone(),
            fields: intent_response.fields.clone(),
            is_completed: intent_response.is_completed,
        };

        let storage = self.storage.clone();
        let session_id = entry.session_id.clone();
        self.spawn_bg(conn_token.clone(), async move {
            if let Err(e) = storage.upsert_intent_response(&upsert).await {
                warn!(session_id, error = %e, "failed to persist intent response");
            }
        });
    }

    /// When a completed intent carries a valid meal, emit the food entry,
    /// update the conversation summary, and bump the user's meal counter.
    fn spawn_meal_aggregation(
        &self,
        entry: &Arc<SessionEntry>,
        intent_response: &IntentResponse,
        conn_token: &CancellationToken,
    ) {
        if !intent_response.is_completed {
            return;
        }
        let Some(meal) = parse_meal_fields(&intent_response.fields) else {
            // Invalid meal type or no foods: suppress silently per policy.
            return;
        };

        let storage = self.storage.clone();
        let session_id = entry.session_id.clone();
        let user_id = entry.user_id.clone();
        self.spawn_bg(conn_token.clone(), async move {
            let entry_row = NewFoodEntry {
                user_id: user_id.clone(),
                meal_type: meal.meal_type,
                foods: meal.foods.clone(),
                total_calories: meal.total_calories,
                total_protein: meal.total_protein,
                total_carbs: meal.total_carbs,
                total_fat: meal.total_fat,
                entry_date: today(),
            };
            if let Err(e) = storage.create_food_entry(&entry_row).await {
                warn!(session_id, error = %e, "failed to create food entry");
                return;
            }

            let summary = ConversationSummary {
                meal_type: Some(meal.meal_type),
                foods_logged: meal.foods.iter().map(|f| f.name.clone()).collect(),
                total_calories: meal.total_calories,
                completion_status: CompletionStatus::Complete,
                is_complete_meal: true,
            };
            if let Err(e) = storage.update_conversation_summary(&session_id, &summary).await {
                warn!(session_id, error = %e, "failed to update conversation summary");
            }
            if let Err(e) = storage.bump_user_stats(&user_id, 0, 1).await {
                warn!(session_id, error = %e, "failed to bump meal stats");
            }
            info!(session_id, meal = %meal.meal_type, foods = meal.foods.len(), "meal logged");
        });
    }

    async fn resolve_user(&self, email: &str) -> Result<User, TableTalkError> {
        self.storage
            .get_user_by_email(email)
            .await?
            .ok_or_else(|| TableTalkError::Session(format!("unknown user {email}")))
    }

    /// Run a background task bound to the connection's cancellation token.
    fn spawn_bg<F>(&self, token: CancellationToken, fut: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.tasks.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = fut => {}
            }
        });
    }
}

async fn send(tx: &mpsc::Sender<ServerFrame>, frame: ServerFrame) {
    if tx.send(frame).await.is_err() {
        debug!("outbound channel closed, dropping frame");
    }
}

/// Fallback `nextPrompt` derivation: the intent prompt verbatim when it
/// already asks a question, the prompt with a `?` appended when it does not,
/// and a canned clarification otherwise.
pub(crate) fn derive_fallback_prompt(intent_prompt: Option<&str>) -> String {
    match intent_prompt.map(str::trim).filter(|p| !p.is_empty()) {
        Some(prompt) if prompt.ends_with('?') => prompt.to_string(),
        Some(prompt) => format!("{prompt}?"),
        None => CLARIFY_FALLBACK.to_string(),
    }
}

/// First non-empty of: structured metadata id, LLM-returned id, id parsed
/// from the prompt's `"Intent ID:"` header.
pub(crate) fn effective_intent_id(
    metadata_id: Option<String>,
    llm_id: &str,
    prompt: &str,
) -> Option<String> {
    metadata_id
        .filter(|id| !id.trim().is_empty())
        .or_else(|| {
            let id = llm_id.trim();
            (!id.is_empty()).then(|| id.to_string())
        })
        .or_else(|| parse_intent_id_from_prompt(prompt))
}

/// Parse the `"Intent ID:\n<id>"` header the client embeds in structured
/// prompts.
pub(crate) fn parse_intent_id_from_prompt(prompt: &str) -> Option<String> {
    let (_, after) = prompt.split_once("Intent ID:")?;
    let id: String = after
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    (!id.is_empty()).then_some(id)
}

/// Meal data distilled from a completed intent's fields.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MealFields {
    pub meal_type: MealType,
    pub foods: Vec<FoodItem>,
    pub total_calories: Option<f64>,
    pub total_protein: Option<f64>,
    pub total_carbs: Option<f64>,
    pub total_fat: Option<f64>,
}

/// Validate and normalize meal fields. Returns `None` (suppressing the food
/// entry without failing the turn) when the meal type is invalid or no foods
/// were logged.
pub(crate) fn parse_meal_fields(fields: &BTreeMap<String, String>) -> Option<MealFields> {
    let meal_type = MealType::from_str(fields.get("mealType")?.trim()).ok()?;
    let foods = parse_foods(fields.get("foodsLogged").map(String::as_str).unwrap_or(""));
    if foods.is_empty() {
        return None;
    }
    Some(MealFields {
        meal_type,
        foods,
        total_calories: parse_number(fields.get("totalCalories")),
        total_protein: parse_number(fields.get("totalProtein")),
        total_carbs: parse_number(fields.get("totalCarbs")),
        total_fat: parse_number(fields.get("totalFat")),
    })
}

/// Normalize a foods value: a JSON array of items or names, else a comma
/// list. Bare strings become `{name, quantity: 1, unit: ""}`.
pub(crate) fn parse_foods(raw: &str) -> Vec<FoodItem> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Vec::new();
    }
    if raw.starts_with('[') {
        if let Ok(items) = serde_json::from_str::<Vec<FoodItem>>(raw) {
            return items.into_iter().filter(|f| !f.name.trim().is_empty()).collect();
        }
        if let Ok(names) = serde_json::from_str::<Vec<String>>(raw) {
            return names
                .iter()
                .map(|n| n.trim())
                .filter(|n| !n.is_empty())
                .map(FoodItem::from_name)
                .collect();
        }
    }
    raw.split(',')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(FoodItem::from_name)
        .collect()
}

fn parse_number(raw: Option<&String>) -> Option<f64> {
    raw?.trim().parse::<f64>().ok()
}

fn meal_from_completed(fields: &serde_json::Map<String, serde_json::Value>) -> Option<MealType> {
    MealType::from_str(fields.get("mealType")?.as_str()?.trim()).ok()
}

fn today() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}
