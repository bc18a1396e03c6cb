// SPDX-FileCopyrightText: 2026 TableTalk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock speech adapter: fixed audio bytes, captured inputs.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use tabletalk_core::types::{AdapterType, HealthStatus, SpeechResult};
use tabletalk_core::{PluginAdapter, SpeechAdapter, TableTalkError};

/// Deterministic speech adapter recording every synthesized text.
pub struct MockSpeech {
    /// Texts passed to `synthesize`, for assertions.
    pub synthesized: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

impl MockSpeech {
    pub fn new() -> Self {
        Self {
            synthesized: Arc::new(Mutex::new(Vec::new())),
            fail: false,
        }
    }

    /// A mock that always fails, for error-path tests.
    pub fn failing() -> Self {
        Self {
            synthesized: Arc::new(Mutex::new(Vec::new())),
            fail: true,
        }
    }
}

impl Default for MockSpeech {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockSpeech {
    fn name(&self) -> &str {
        "mock-speech"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Speech
    }

    async fn health_check(&self) -> Result<HealthStatus, TableTalkError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), TableTalkError> {
        Ok(())
    }
}

#[async_trait]
impl SpeechAdapter for MockSpeech {
    fn supports_ssml(&self) -> bool {
        false
    }

    async fn synthesize(&self, text: &str) -> Result<SpeechResult, TableTalkError> {
        if self.fail {
            return Err(TableTalkError::speech("mock synthesis failure"));
        }
        self.synthesized.lock().await.push(text.to_string());
        Ok(SpeechResult {
            audio: b"mock-audio".to_vec(),
            duration_ms: 1000,
        })
    }
}
