// SPDX-FileCopyrightText: 2026 TableTalk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Google Cloud Text-to-Speech provider.
//!
//! Accepts SSML directly; audio comes back base64-encoded in the JSON body.
//! Transient upstream failures retry with exponential backoff; when every
//! attempt fails the adapter returns the silent default result so the turn
//! still completes with text.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use tracing::{debug, warn};

use tabletalk_config::model::SpeechConfig;
use tabletalk_core::types::SpeechResult;
use tabletalk_core::{AdapterType, HealthStatus, PluginAdapter, SpeechAdapter, TableTalkError};

use crate::retry::{AttemptError, backoff_delay, is_transient_status};
use crate::ssml;

const API_BASE_URL: &str = "https://texttospeech.googleapis.com/v1/text:synthesize";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_content: String,
}

/// Google Cloud TTS client.
#[derive(Debug, Clone)]
pub struct GoogleSpeech {
    client: reqwest::Client,
    api_key: String,
    voice: String,
    timeout: Duration,
    max_retries: u32,
    backoff_base_ms: u64,
    backoff_cap_ms: u64,
    base_url: String,
}

impl GoogleSpeech {
    pub fn new(config: &SpeechConfig) -> Result<Self, TableTalkError> {
        let api_key = config
            .google_api_key
            .clone()
            .ok_or_else(|| TableTalkError::Config("speech.google_api_key is required".into()))?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| TableTalkError::Speech {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            client,
            api_key,
            voice: config.voice.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            max_retries: config.max_retries,
            backoff_base_ms: config.backoff_base_ms,
            backoff_cap_ms: config.backoff_cap_ms,
            base_url: API_BASE_URL.to_string(),
        })
    }

    /// Overrides the base URL (for testing with wiremock).
    #[cfg(test)]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    /// Language code derived from the voice name, e.g. `en-US-Neural2-F` ->
    /// `en-US`.
    fn language_code(&self) -> String {
        self.voice
            .splitn(3, '-')
            .take(2)
            .collect::<Vec<_>>()
            .join("-")
    }

    /// One synthesis attempt, bounded by the per-attempt timeout.
    async fn attempt(&self, text: &str) -> Result<Vec<u8>, AttemptError> {
        let input = if ssml::is_ssml(text) {
            serde_json::json!({ "ssml": text })
        } else {
            serde_json::json!({ "text": text })
        };
        let body = serde_json::json!({
            "input": input,
            "voice": { "languageCode": self.language_code(), "name": self.voice },
            "audioConfig": { "audioEncoding": "MP3" },
        });

        let url = format!("{}?key={}", self.base_url, self.api_key);
        let send = self.client.post(&url).json(&body).send();
        let response = tokio::time::timeout(self.timeout, send)
            .await
            .map_err(|_| {
                AttemptError::transient(TableTalkError::Timeout {
                    duration: self.timeout,
                })
            })?
            .map_err(|e| {
                AttemptError::transient(TableTalkError::Speech {
                    message: format!("HTTP request failed: {e}"),
                    source: Some(Box::new(e)),
                })
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error =
                TableTalkError::speech(format!("Google TTS returned {status}: {body}"));
            return Err(if is_transient_status(status) {
                AttemptError::transient(error)
            } else {
                AttemptError::fatal(error)
            });
        }

        let parsed: SynthesizeResponse = response.json().await.map_err(|e| {
            AttemptError::fatal(TableTalkError::Speech {
                message: format!("failed to parse synthesis response: {e}"),
                source: Some(Box::new(e)),
            })
        })?;
        BASE64
            .decode(parsed.audio_content.as_bytes())
            .map_err(|e| {
                AttemptError::fatal(TableTalkError::Speech {
                    message: format!("invalid base64 audio content: {e}"),
                    source: Some(Box::new(e)),
                })
            })
    }
}

#[async_trait]
impl PluginAdapter for GoogleSpeech {
    fn name(&self) -> &str {
        "google-tts"
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
impl SpeechAdapter for GoogleSpeech {
    fn supports_ssml(&self) -> bool {
        true
    }

    async fn synthesize(&self, text: &str) -> Result<SpeechResult, TableTalkError> {
        let display = ssml::strip_ssml_tags(text);

        let mut last_error = None;
        for attempt in 0..self.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(attempt, self.backoff_base_ms, self.backoff_cap_ms);
                warn!(attempt, delay_ms = delay.as_millis() as u64, "retrying synthesis");
                tokio::time::sleep(delay).await;
            }

            match self.attempt(text).await {
                Ok(audio) => {
                    let duration_ms = ssml::estimate_duration_ms(&display);
                    debug!(bytes = audio.len(), duration_ms, "speech synthesized");
                    return Ok(SpeechResult { audio, duration_ms });
                }
                Err(AttemptError { transient: true, error }) => {
                    warn!(attempt, error = %error, "transient synthesis failure");
                    last_error = Some(error);
                }
                Err(AttemptError { error, .. }) => {
                    last_error = Some(error);
                    break;
                }
            }
        }

        // Adapter default: silent, zero-length audio; the caller still
        // delivers the text.
        if let Some(error) = last_error {
            warn!(error = %error, "synthesis failed, returning silent result");
        }
        Ok(SpeechResult {
            audio: Vec::new(),
            duration_ms: 0,
        })
    }
}
