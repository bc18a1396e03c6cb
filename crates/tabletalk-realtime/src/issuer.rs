// SPDX-FileCopyrightText: 2026 TableTalk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client that mints ephemeral realtime credentials.
//!
//! Transient upstream failures retry with exponential backoff. When every
//! attempt fails the issuer returns the adapter-default credential (an
//! empty client secret); the orchestrator detects it and surfaces the
//! fallback error frame to the user.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use tabletalk_config::model::RealtimeConfig;
use tabletalk_core::types::{ClientSecret, EphemeralCredential};
use tabletalk_core::{AdapterType, HealthStatus, PluginAdapter, RealtimeAdapter, TableTalkError};

#[derive(Debug, Deserialize)]
struct MintResponse {
    client_secret: MintSecret,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    voice: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MintSecret {
    value: String,
    expires_at: i64,
}

/// A failed mint attempt plus whether it is worth retrying.
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

/// Issues short-lived credentials scoped to (session, user, email).
///
/// When realtime is not configured the issuer stays constructible but
/// disabled; the orchestrator answers credential requests with an error
/// frame instead.
#[derive(Debug, Clone)]
pub struct RealtimeIssuer {
    client: reqwest::Client,
    config: RealtimeConfig,
}

impl RealtimeIssuer {
    pub fn new(config: RealtimeConfig) -> Result<Self, TableTalkError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| TableTalkError::Realtime {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self { client, config })
    }

    /// The adapter-default credential handed back on exhaustion: an empty
    /// secret the orchestrator treats as "mint failed".
    fn default_credential(&self) -> EphemeralCredential {
        EphemeralCredential {
            client_secret: ClientSecret {
                value: String::new(),
                expires_at: 0,
            },
            model: self.config.model.clone(),
            voice: self.config.voice.clone(),
        }
    }

    /// One mint attempt, bounded by the per-attempt timeout.
    async fn attempt(
        &self,
        api_key: &str,
        session_id: &str,
        user_id: &str,
        email: &str,
    ) -> Result<EphemeralCredential, AttemptError> {
        let body = serde_json::json!({
            "model": self.config.model,
            "voice": self.config.voice,
            "metadata": {
                "session_id": session_id,
                "user_id": user_id,
                "email": email,
            },
        });

        let timeout = Duration::from_secs(self.config.timeout_secs);
        let send = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send();
        let response = tokio::time::timeout(timeout, send)
            .await
            .map_err(|_| {
                AttemptError::transient(TableTalkError::Timeout { duration: timeout })
            })?
            .map_err(|e| {
                AttemptError::transient(TableTalkError::Realtime {
                    message: format!("HTTP request failed: {e}"),
                    source: Some(Box::new(e)),
                })
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error =
                TableTalkError::realtime(format!("realtime API returned {status}: {body}"));
            return Err(if status.as_u16() == 429 || status.is_server_error() {
                AttemptError::transient(error)
            } else {
                AttemptError::fatal(error)
            });
        }

        let minted: MintResponse = response.json().await.map_err(|e| {
            AttemptError::fatal(TableTalkError::Realtime {
                message: format!("failed to parse mint response: {e}"),
                source: Some(Box::new(e)),
            })
        })?;

        debug!(
            session_id,
            expires_at = minted.client_secret.expires_at,
            "ephemeral credential minted"
        );

        Ok(EphemeralCredential {
            client_secret: ClientSecret {
                value: minted.client_secret.value,
                expires_at: minted.client_secret.expires_at,
            },
            model: minted.model.unwrap_or_else(|| self.config.model.clone()),
            voice: minted.voice.unwrap_or_else(|| self.config.voice.clone()),
        })
    }
}

#[async_trait]
impl PluginAdapter for RealtimeIssuer {
    fn name(&self) -> &str {
        "realtime-issuer"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Realtime
    }

    async fn health_check(&self) -> Result<HealthStatus, TableTalkError> {
        if self.is_enabled() {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Degraded("realtime not configured".into()))
        }
    }

    async fn shutdown(&self) -> Result<(), TableTalkError> {
        Ok(())
    }
}

#[async_trait]
impl RealtimeAdapter for RealtimeIssuer {
    fn is_enabled(&self) -> bool {
        self.config.enabled && self.config.api_key.is_some()
    }

    async fn mint_ephemeral(
        &self,
        session_id: &str,
        user_id: &str,
        email: &str,
    ) -> Result<EphemeralCredential, TableTalkError> {
        let Some(api_key) = self
            .config
            .api_key
            .clone()
            .filter(|_| self.config.enabled)
        else {
            return Err(TableTalkError::realtime("realtime voice is not configured"));
        };

        let mut last_error = None;
        for attempt in 0..self.config.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(
                    attempt,
                    self.config.backoff_base_ms,
                    self.config.backoff_cap_ms,
                );
                warn!(attempt, delay_ms = delay.as_millis() as u64, "retrying credential mint");
                tokio::time::sleep(delay).await;
            }

            match self.attempt(&api_key, session_id, user_id, email).await {
                Ok(credential) => return Ok(credential),
                Err(AttemptError { transient: true, error }) => {
                    warn!(attempt, error = %error, "transient mint failure");
                    last_error = Some(error);
                }
                Err(AttemptError { error, .. }) => {
                    last_error = Some(error);
                    break;
                }
            }
        }

        if let Some(error) = last_error {
            warn!(session_id, error = %error, "mint failed, returning default credential");
        }
        Ok(self.default_credential())
    }
}
