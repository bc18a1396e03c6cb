// SPDX-FileCopyrightText: 2026 TableTalk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Text-to-speech adapters for the TableTalk dialogue orchestrator.
//!
//! Provider-selectable: Google Cloud TTS (primary, accepts SSML) and
//! ElevenLabs (secondary, tags stripped before synthesis).

pub mod elevenlabs;
pub mod google;
mod retry;
pub mod ssml;

use std::sync::Arc;

use tabletalk_config::model::SpeechConfig;
use tabletalk_core::{SpeechAdapter, TableTalkError};

pub use elevenlabs::ElevenLabsSpeech;
pub use google::GoogleSpeech;
pub use ssml::{estimate_duration_ms, strip_ssml_tags};

/// Build the configured speech provider.
pub fn build_speech_adapter(
    config: &SpeechConfig,
) -> Result<Arc<dyn SpeechAdapter + Send + Sync>, TableTalkError> {
    match config.provider.as_str() {
        "google" => Ok(Arc::new(GoogleSpeech::new(config)?)),
        "elevenlabs" => Ok(Arc::new(ElevenLabsSpeech::new(config)?)),
        other => Err(TableTalkError::Config(format!(
            "unknown speech provider `{other}`"
        ))),
    }
}
