// SPDX-FileCopyrightText: 2026 TableTalk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! ElevenLabs text-to-speech provider.
//!
//! Does not accept SSML; tags are stripped before synthesis. Audio comes
//! back as raw bytes. Transient upstream failures retry with exponential
//! backoff; exhaustion yields the silent default result.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use tabletalk_config::model::SpeechConfig;
use tabletalk_core::types::SpeechResult;
use tabletalk_core::{AdapterType, HealthStatus, PluginAdapter, SpeechAdapter, TableTalkError};

use crate::retry::{AttemptError, backoff_delay, is_transient_status};
use crate::ssml;

const API_BASE_URL: &str = "https://api.elevenlabs.io";

/// ElevenLabs TTS client.
#[derive(Debug, Clone)]
pub struct ElevenLabsSpeech {
    client: reqwest::Client,
    api_key: String,
    voice_id: String,
    timeout: Duration,
    max_retries: u32,
    backoff_base_ms: u64,
    backoff_cap_ms: u64,
    base_url: String,
}

impl ElevenLabsSpeech {
    pub fn new(config: &SpeechConfig) -> Result<Self, TableTalkError> {
        let api_key = config.elevenlabs_api_key.clone().ok_or_else(|| {
            TableTalkError::Config("speech.elevenlabs_api_key is required".into())
        })?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| TableTalkError::Speech {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            client,
            api_key,
            voice_id: config.elevenlabs_voice_id.clone(),
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

    /// One synthesis attempt, bounded by the per-attempt timeout.
    async fn attempt(&self, spoken: &str) -> Result<Vec<u8>, AttemptError> {
        let url = format!("{}/v1/text-to-speech/{}", self.base_url, self.voice_id);
        let body = serde_json::json!({
            "text": spoken,
            "model_id": "eleven_monolingual_v1",
        });

        let send = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .json(&body)
            .send();
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
                TableTalkError::speech(format!("ElevenLabs returned {status}: {body}"));
            return Err(if is_transient_status(status) {
                AttemptError::transient(error)
            } else {
                AttemptError::fatal(error)
            });
        }

        Ok(response
            .bytes()
            .await
            .map_err(|e| {
                AttemptError::transient(TableTalkError::Speech {
                    message: format!("failed to read audio body: {e}"),
                    source: Some(Box::new(e)),
                })
            })?
            .to_vec())
    }
}

#[async_trait]
impl PluginAdapter for ElevenLabsSpeech {
    fn name(&self) -> &str {
        "elevenlabs-tts"
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
impl SpeechAdapter for ElevenLabsSpeech {
    fn supports_ssml(&self) -> bool {
        false
    }

    async fn synthesize(&self, text: &str) -> Result<SpeechResult, TableTalkError> {
        // SSML is not supported upstream; speak the stripped text.
        let spoken = ssml::strip_ssml_tags(text);

        let mut last_error = None;
        for attempt in 0..self.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(attempt, self.backoff_base_ms, self.backoff_cap_ms);
                warn!(attempt, delay_ms = delay.as_millis() as u64, "retrying synthesis");
                tokio::time::sleep(delay).await;
            }

            match self.attempt(&spoken).await {
                Ok(audio) => {
                    let duration_ms = ssml::estimate_duration_ms(&spoken);
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

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config() -> SpeechConfig {
        SpeechConfig {
            provider: "elevenlabs".into(),
            elevenlabs_api_key: Some("el-key".into()),
            elevenlabs_voice_id: "voice-1".into(),
            timeout_secs: 2,
            max_retries: 3,
            backoff_base_ms: 10,
            backoff_cap_ms: 30,
            ..SpeechConfig::default()
        }
    }

    #[tokio::test]
    async fn synthesize_strips_ssml_before_sending() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/text-to-speech/voice-1"))
            .and(header("xi-api-key", "el-key"))
            .and(body_partial_json(serde_json::json!({
                "text": "Hello Johnny!"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"audio-bytes".to_vec()))
            .mount(&server)
            .await;

        let speech = ElevenLabsSpeech::new(&test_config())
            .unwrap()
            .with_base_url(server.uri());
        let result = speech
            .synthesize("<speak>Hello <emphasis>Johnny</emphasis>!</speak>")
            .await
            .unwrap();
        assert_eq!(result.audio, b"audio-bytes");
        assert_eq!(result.duration_ms, 1000);
    }

    #[tokio::test]
    async fn retries_transient_errors_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/text-to-speech/voice-1"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/text-to-speech/voice-1"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"retried".to_vec()))
            .mount(&server)
            .await;

        let speech = ElevenLabsSpeech::new(&test_config())
            .unwrap()
            .with_base_url(server.uri());
        let result = speech.synthesize("try again").await.unwrap();
        assert_eq!(result.audio, b"retried");
    }

    #[tokio::test]
    async fn exhausted_retries_return_silent_default() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/text-to-speech/voice-1"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let speech = ElevenLabsSpeech::new(&test_config())
            .unwrap()
            .with_base_url(server.uri());
        let result = speech.synthesize("hi").await.unwrap();
        assert!(result.audio.is_empty());
        assert_eq!(result.duration_ms, 0);
    }

    #[tokio::test]
    async fn fatal_upstream_error_skips_retries_and_returns_silent_default() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/text-to-speech/voice-1"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let speech = ElevenLabsSpeech::new(&test_config())
            .unwrap()
            .with_base_url(server.uri());
        let result = speech.synthesize("hi").await.unwrap();
        assert!(result.audio.is_empty());
    }
}
