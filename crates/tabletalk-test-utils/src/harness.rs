// SPDX-FileCopyrightText: 2026 TableTalk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles the complete orchestrator stack with mock
//! adapters and a temp SQLite database, and hands out [`TestConnection`]s
//! that drive the frame dispatch path exactly like a WebSocket reader would.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use tabletalk_catalog::AgentCatalog;
use tabletalk_config::model::StorageConfig;
use tabletalk_core::types::{AgentRow, IntentResponse, IntentRow, SectionRow};
use tabletalk_core::{StorageAdapter, TableTalkError};
use tabletalk_gateway::frames::{ClientFrame, ServerFrame};
use tabletalk_gateway::orchestrator::Orchestrator;
use tabletalk_session::{SessionEntry, SessionRegistry};
use tabletalk_storage::SqliteStorage;

use crate::mock_completion::MockCompletion;
use crate::mock_realtime::MockRealtime;
use crate::mock_speech::MockSpeech;

/// How long `recv` waits for the next outbound frame.
const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// Builder for configuring the test environment.
pub struct TestHarnessBuilder {
    intent_responses: Vec<IntentResponse>,
    realtime_enabled: bool,
    performance_mode: bool,
    greeting_interval: Duration,
    idle_timeout: Duration,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            intent_responses: Vec::new(),
            realtime_enabled: false,
            performance_mode: false,
            greeting_interval: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(300),
        }
    }

    /// Queue scripted intent responses on the mock completion provider.
    pub fn with_intent_responses(mut self, responses: Vec<IntentResponse>) -> Self {
        self.intent_responses = responses;
        self
    }

    pub fn with_realtime_enabled(mut self) -> Self {
        self.realtime_enabled = true;
        self
    }

    pub fn with_performance_mode(mut self) -> Self {
        self.performance_mode = true;
        self
    }

    pub fn with_greeting_interval(mut self, interval: Duration) -> Self {
        self.greeting_interval = interval;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Build the harness: temp SQLite, mock adapters, orchestrator.
    pub async fn build(self) -> Result<TestHarness, TableTalkError> {
        let temp_dir = tempfile::TempDir::new().map_err(|e| TableTalkError::Storage {
            source: e.into(),
        })?;
        let db_path = temp_dir.path().join("harness.db");

        let storage = SqliteStorage::new(StorageConfig {
            database_path: db_path.to_string_lossy().to_string(),
            wal_mode: true,
            op_timeout_secs: 5,
        });
        storage.initialize().await?;
        let storage: Arc<dyn StorageAdapter + Send + Sync> = Arc::new(storage);

        let completion = Arc::new(MockCompletion::with_intent_responses(self.intent_responses));
        let speech = Arc::new(MockSpeech::new());
        let realtime = Arc::new(if self.realtime_enabled {
            MockRealtime::enabled()
        } else {
            MockRealtime::disabled()
        });
        let catalog = Arc::new(AgentCatalog::new(storage.clone()));
        let registry = Arc::new(SessionRegistry::new(self.idle_timeout, self.greeting_interval));

        let orchestrator = Arc::new(Orchestrator::new(
            storage.clone(),
            completion.clone(),
            speech.clone(),
            realtime,
            catalog.clone(),
            registry.clone(),
            self.performance_mode,
            None,
        ));

        Ok(TestHarness {
            storage,
            completion,
            speech,
            catalog,
            registry,
            orchestrator,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with mock adapters and temp storage.
pub struct TestHarness {
    pub storage: Arc<dyn StorageAdapter + Send + Sync>,
    pub completion: Arc<MockCompletion>,
    pub speech: Arc<MockSpeech>,
    pub catalog: Arc<AgentCatalog>,
    pub registry: Arc<SessionRegistry>,
    pub orchestrator: Arc<Orchestrator>,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Seed a one-section demo agent: intro intent 3201, name intent 3221,
    /// meal intent 4001.
    pub async fn seed_demo_agent(&self, agent_id: &str) -> Result<(), TableTalkError> {
        self.storage
            .insert_agent(&AgentRow {
                id: agent_id.to_string(),
                name: "Meal Coach".into(),
                about: "guides meal logging".into(),
                mode: vec!["voice".into()],
            })
            .await?;
        let section_id = format!("{agent_id}-sec-1");
        self.storage
            .insert_section(&SectionRow {
                id: section_id.clone(),
                agent_id: agent_id.to_string(),
                name: "Meals".into(),
                about: "what the user ate today".into(),
                guidelines: None,
                ord: 1,
            })
            .await?;
        for (intent_id, prompt, fields, ord) in [
            (3201, "Introduction: greet the user", None, 1),
            (3221, "Get user's name", Some(r#"[{"name":"name"}]"#), 2),
            (
                4001,
                "Ask what the user ate",
                Some(r#"[{"name":"mealType"},{"name":"foodsLogged"},{"name":"totalCalories"}]"#),
                3,
            ),
        ] {
            self.storage
                .insert_intent(&IntentRow {
                    section_id: section_id.clone(),
                    intent_id,
                    intent: prompt.into(),
                    is_mandatory: true,
                    retry_limit: 2,
                    fields_to_extract: fields.map(String::from),
                    context: None,
                    ord,
                })
                .await?;
        }
        Ok(())
    }

    /// Open a logical connection: runs the orchestrator's connect path and
    /// returns a driver for the dispatch loop.
    pub async fn connect(
        &self,
        session_id: &str,
        user_email: &str,
    ) -> Result<TestConnection, TableTalkError> {
        let entry = self.orchestrator.connect(session_id, user_email).await?;
        let conn_token = entry.cancel.child_token();
        let (tx, rx) = mpsc::channel::<ServerFrame>(64);
        Ok(TestConnection {
            orchestrator: self.orchestrator.clone(),
            entry,
            tx,
            rx,
            conn_token,
        })
    }

    /// Wait for all currently scheduled background tasks (TTS, persistence)
    /// to finish.
    pub async fn settle(&self) {
        self.orchestrator.settle().await;
    }
}

/// Drives frames through the orchestrator like one WebSocket connection.
pub struct TestConnection {
    orchestrator: Arc<Orchestrator>,
    pub entry: Arc<SessionEntry>,
    tx: mpsc::Sender<ServerFrame>,
    rx: mpsc::Receiver<ServerFrame>,
    pub conn_token: CancellationToken,
}

impl TestConnection {
    /// Dispatch a raw JSON frame, as if it arrived on the socket.
    pub async fn send_json(&mut self, raw: &str) {
        let frame: ClientFrame = serde_json::from_str(raw).expect("test frame must parse");
        self.orchestrator
            .dispatch(&self.entry, frame, &self.tx, &self.conn_token)
            .await;
    }

    /// Receive the next outbound frame as JSON, or `None` on timeout.
    pub async fn recv(&mut self) -> Option<serde_json::Value> {
        let frame = tokio::time::timeout(RECV_TIMEOUT, self.rx.recv())
            .await
            .ok()??;
        serde_json::from_str(&frame.to_json()).ok()
    }

    /// Receive frames until one with the given `type` arrives.
    pub async fn recv_type(&mut self, frame_type: &str) -> Option<serde_json::Value> {
        for _ in 0..16 {
            let frame = self.recv().await?;
            if frame["type"] == frame_type {
                return Some(frame);
            }
        }
        None
    }

    /// Close the connection, cancelling its background tasks.
    pub fn close(&self) {
        self.conn_token.cancel();
    }
}
