// SPDX-FileCopyrightText: 2026 TableTalk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock LLM completion adapter for deterministic testing.
//!
//! Responses are popped from FIFO queues, one for intent turns and one for
//! free-form text. Empty queues fall back to defaults: the empty
//! [`IntentResponse`] (exercising the orchestrator's fallback prompt) and a
//! fixed text string.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use tabletalk_core::types::{AdapterType, HealthStatus, IntentResponse};
use tabletalk_core::{CompletionAdapter, PluginAdapter, TableTalkError};

/// A mock completion provider with pre-configured responses.
pub struct MockCompletion {
    intent_responses: Arc<Mutex<VecDeque<IntentResponse>>>,
    text_responses: Arc<Mutex<VecDeque<String>>>,
    /// Prompts seen by `complete_intent`, for assertions.
    pub seen_intent_prompts: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockCompletion {
    pub fn new() -> Self {
        Self {
            intent_responses: Arc::new(Mutex::new(VecDeque::new())),
            text_responses: Arc::new(Mutex::new(VecDeque::new())),
            seen_intent_prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_intent_responses(responses: Vec<IntentResponse>) -> Self {
        let mock = Self::new();
        {
            let queue = mock.intent_responses.clone();
            let mut guard = queue.try_lock().expect("fresh mock is uncontended");
            guard.extend(responses);
        }
        mock
    }

    pub async fn push_intent_response(&self, response: IntentResponse) {
        self.intent_responses.lock().await.push_back(response);
    }

    pub async fn push_text_response(&self, text: impl Into<String>) {
        self.text_responses.lock().await.push_back(text.into());
    }
}

impl Default for MockCompletion {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockCompletion {
    fn name(&self) -> &str {
        "mock-completion"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Completion
    }

    async fn health_check(&self) -> Result<HealthStatus, TableTalkError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), TableTalkError> {
        Ok(())
    }
}

#[async_trait]
impl CompletionAdapter for MockCompletion {
    async fn complete_intent(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<IntentResponse, TableTalkError> {
        self.seen_intent_prompts
            .lock()
            .await
            .push((system_prompt.to_string(), user_prompt.to_string()));
        Ok(self
            .intent_responses
            .lock()
            .await
            .pop_front()
            .unwrap_or_default())
    }

    async fn complete_text(
        &self,
        _system_prompt: &str,
        _user_prompt: &str,
    ) -> Result<String, TableTalkError> {
        Ok(self
            .text_responses
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| "mock text response".to_string()))
    }
}
