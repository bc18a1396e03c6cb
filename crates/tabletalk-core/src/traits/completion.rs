// SPDX-FileCopyrightText: 2026 TableTalk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Completion adapter trait for LLM provider integrations.

use async_trait::async_trait;

use crate::error::TableTalkError;
use crate::traits::adapter::PluginAdapter;
use crate::types::IntentResponse;

/// Adapter for LLM completion providers.
///
/// Two entry points: [`complete_intent`](CompletionAdapter::complete_intent)
/// enforces the strict four-key JSON contract used by the intent loop, while
/// [`complete_text`](CompletionAdapter::complete_text) returns raw text for
/// free-form prompts (greetings, conversation summaries).
#[async_trait]
pub trait CompletionAdapter: PluginAdapter {
    /// Sends an intent turn and returns the parsed structured response.
    ///
    /// Implementations retry transient failures internally; when every
    /// attempt fails they return [`IntentResponse::default`] so the caller
    /// can supply a user-facing fallback, never an error.
    async fn complete_intent(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<IntentResponse, TableTalkError>;

    /// Sends a free-form prompt and returns the raw completion text.
    async fn complete_text(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, TableTalkError>;
}
