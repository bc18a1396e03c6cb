// SPDX-FileCopyrightText: 2026 TableTalk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Speech adapter trait for text-to-speech provider integrations.

use async_trait::async_trait;

use crate::error::TableTalkError;
use crate::traits::adapter::PluginAdapter;
use crate::types::SpeechResult;

/// Adapter for text-to-speech synthesis.
///
/// Input may be plain text or SSML. Providers that do not accept SSML must
/// strip the tags before synthesis; the orchestrator always sends the client
/// plain display text regardless of what was spoken.
#[async_trait]
pub trait SpeechAdapter: PluginAdapter {
    /// Whether this provider accepts SSML input directly.
    fn supports_ssml(&self) -> bool;

    /// Synthesizes the given text (or SSML) into audio bytes plus a
    /// duration estimate in milliseconds.
    async fn synthesize(&self, text: &str) -> Result<SpeechResult, TableTalkError>;
}
