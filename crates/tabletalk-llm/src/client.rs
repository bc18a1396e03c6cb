// SPDX-FileCopyrightText: 2026 TableTalk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for an OpenAI-style chat completions API.
//!
//! Provides [`CompletionClient`] which handles request construction,
//! authentication, per-attempt timeouts, and transient error retry with
//! exponential backoff (base 1 s, cap 3 s by default).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use tabletalk_config::model::LlmConfig;
use tabletalk_core::types::IntentResponse;
use tabletalk_core::{
    AdapterType, CompletionAdapter, HealthStatus, PluginAdapter, TableTalkError,
};

use crate::extract;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(rename = "type", default)]
    type_: String,
    #[serde(default)]
    message: String,
}

/// HTTP client for LLM chat completions.
///
/// Manages authentication headers, connection pooling, and retry logic for
/// transient errors (timeouts, 429, 5xx).
#[derive(Debug, Clone)]
pub struct CompletionClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl CompletionClient {
    /// Creates a new completion client from configuration.
    pub fn new(config: LlmConfig) -> Result<Self, TableTalkError> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &config.api_key {
            let bearer = format!("Bearer {api_key}");
            headers.insert(
                "authorization",
                HeaderValue::from_str(&bearer).map_err(|e| {
                    TableTalkError::Config(format!("invalid API key header value: {e}"))
                })?,
            );
        }
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| TableTalkError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self { client, config })
    }

    /// One completion attempt, bounded by the per-attempt timeout.
    async fn attempt(&self, system_prompt: &str, user_prompt: &str) -> Result<String, AttemptError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature: 0.4,
        };

        let timeout = Duration::from_secs(self.config.timeout_secs);
        let send = self.client.post(&self.config.endpoint).json(&request).send();
        let response = tokio::time::timeout(timeout, send)
            .await
            .map_err(|_| AttemptError::transient(TableTalkError::Timeout { duration: timeout }))?
            .map_err(|e| {
                // Connection-level failures are worth retrying.
                AttemptError::transient(TableTalkError::Provider {
                    message: format!("HTTP request failed: {e}"),
                    source: Some(Box::new(e)),
                })
            })?;

        let status = response.status();
        debug!(status = %status, "completion response received");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = if let Ok(api_err) = serde_json::from_str::<ApiErrorResponse>(&body) {
                format!(
                    "completion API error ({}): {}",
                    api_err.error.type_, api_err.error.message
                )
            } else {
                format!("API returned {status}: {body}")
            };
            let error = TableTalkError::provider(message);
            // Rate limits and server errors retry; contract errors do not.
            return Err(if status.as_u16() == 429 || status.is_server_error() {
                AttemptError::transient(error)
            } else {
                AttemptError::fatal(error)
            });
        }

        let body = response.text().await.map_err(|e| {
            AttemptError::transient(TableTalkError::Provider {
                message: format!("failed to read response body: {e}"),
                source: Some(Box::new(e)),
            })
        })?;
        let chat: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            AttemptError::fatal(TableTalkError::Provider {
                message: format!("failed to parse API response: {e}"),
                source: Some(Box::new(e)),
            })
        })?;

        Ok(chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }

    /// Run attempts with exponential backoff until success, a non-transient
    /// error, or exhaustion.
    async fn complete_with_retry(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, TableTalkError> {
        let mut last_error = None;

        for attempt in 0..self.config.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(
                    attempt,
                    self.config.backoff_base_ms,
                    self.config.backoff_cap_ms,
                );
                warn!(attempt, delay_ms = delay.as_millis() as u64, "retrying completion");
                tokio::time::sleep(delay).await;
            }

            match self.attempt(system_prompt, user_prompt).await {
                Ok(text) => return Ok(text),
                Err(AttemptError { transient: true, error }) => {
                    warn!(attempt, error = %error, "transient completion failure");
                    last_error = Some(error);
                }
                Err(AttemptError { error, .. }) => return Err(error),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            TableTalkError::provider("completion failed with no attempts made")
        }))
    }
}

/// A failed attempt plus whether it is worth retrying.
struct AttemptError {
    transient: bool,
    error: TableTalkError,
}

impl AttemptError {
    fn transient(error: TableTalkError) -> Self {
        Self {
            transient: true,
            error,
        }
    }

    fn fatal(error: TableTalkError) -> Self {
        Self {
            transient: false,
            error,
        }
    }
}

/// Delay before the given retry attempt: `base * 2^(attempt-1)`, capped.
fn backoff_delay(attempt: u32, base_ms: u64, cap_ms: u64) -> Duration {
    let exp = base_ms.saturating_mul(1u64 << (attempt - 1).min(16));
    Duration::from_millis(exp.min(cap_ms))
}

#[async_trait]
impl PluginAdapter for CompletionClient {
    fn name(&self) -> &str {
        "completion-http"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Completion
    }

    async fn health_check(&self) -> Result<HealthStatus, TableTalkError> {
        if self.config.api_key.is_none() {
            return Ok(HealthStatus::Degraded("no API key configured".into()));
        }
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), TableTalkError> {
        Ok(())
    }
}

#[async_trait]
impl CompletionAdapter for CompletionClient {
    async fn complete_intent(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<IntentResponse, TableTalkError> {
        match self.complete_with_retry(system_prompt, user_prompt).await {
            Ok(text) => Ok(extract::parse_intent_response(&text)),
            Err(e) => {
                // The intent loop never surfaces provider failures to the
                // user; the orchestrator substitutes a fallback prompt.
                warn!(error = %e, "intent completion exhausted retries, returning default");
                Ok(IntentResponse::default())
            }
        }
    }

    async fn complete_text(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, TableTalkError> {
        self.complete_with_retry(system_prompt, user_prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(endpoint: &str) -> LlmConfig {
        LlmConfig {
            api_key: Some("test-key".into()),
            endpoint: format!("{endpoint}/v1/chat/completions"),
            model: "gpt-4o-mini".into(),
            timeout_secs: 2,
            max_retries: 3,
            backoff_base_ms: 10,
            backoff_cap_ms: 30,
            ..LlmConfig::default()
        }
    }

    fn chat_body(content: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "chatcmpl-test",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
        })
    }

    #[tokio::test]
    async fn complete_text_returns_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("hello there")))
            .mount(&server)
            .await;

        let client = CompletionClient::new(test_config(&server.uri())).unwrap();
        let text = client.complete_text("sys", "user").await.unwrap();
        assert_eq!(text, "hello there");
    }

    #[tokio::test]
    async fn complete_intent_parses_contract() {
        let server = MockServer::start().await;
        let content =
            r#"{"id":"3221","isCompleted":true,"fields":{"name":"Johnny"},"nextPrompt":"Nice, Johnny!"}"#;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body(content)))
            .mount(&server)
            .await;

        let client = CompletionClient::new(test_config(&server.uri())).unwrap();
        let resp = client.complete_intent("sys", "user").await.unwrap();
        assert_eq!(resp.id, "3221");
        assert!(resp.is_completed);
        assert_eq!(resp.fields.get("name").map(String::as_str), Some("Johnny"));
    }

    #[tokio::test]
    async fn retries_on_429_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": {"type": "rate_limit_error", "message": "slow down"}
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("after retry")))
            .mount(&server)
            .await;

        let client = CompletionClient::new(test_config(&server.uri())).unwrap();
        let text = client.complete_text("sys", "user").await.unwrap();
        assert_eq!(text, "after retry");
    }

    #[tokio::test]
    async fn complete_intent_defaults_on_exhaustion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({
                "error": {"type": "overloaded_error", "message": "busy"}
            })))
            .expect(3)
            .mount(&server)
            .await;

        let client = CompletionClient::new(test_config(&server.uri())).unwrap();
        let resp = client.complete_intent("sys", "user").await.unwrap();
        assert_eq!(resp, IntentResponse::default());
    }

    #[tokio::test]
    async fn complete_text_fails_fast_on_400() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {"type": "invalid_request_error", "message": "bad model"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = CompletionClient::new(test_config(&server.uri())).unwrap();
        let err = client.complete_text("sys", "user").await.unwrap_err();
        assert!(err.to_string().contains("invalid_request_error"), "got: {err}");
    }

    #[test]
    fn backoff_grows_and_caps() {
        assert_eq!(backoff_delay(1, 1000, 3000), Duration::from_millis(1000));
        assert_eq!(backoff_delay(2, 1000, 3000), Duration::from_millis(2000));
        assert_eq!(backoff_delay(3, 1000, 3000), Duration::from_millis(3000));
        assert_eq!(backoff_delay(6, 1000, 3000), Duration::from_millis(3000));
    }
}
