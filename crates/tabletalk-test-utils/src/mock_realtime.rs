// SPDX-FileCopyrightText: 2026 TableTalk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock realtime credential issuer.

use async_trait::async_trait;

use tabletalk_core::types::{
    AdapterType, ClientSecret, EphemeralCredential, HealthStatus,
};
use tabletalk_core::{PluginAdapter, RealtimeAdapter, TableTalkError};

/// Issues canned credentials when enabled; disabled by default.
pub struct MockRealtime {
    enabled: bool,
}

impl MockRealtime {
    pub fn disabled() -> Self {
        Self { enabled: false }
    }

    pub fn enabled() -> Self {
        Self { enabled: true }
    }
}

#[async_trait]
impl PluginAdapter for MockRealtime {
    fn name(&self) -> &str {
        "mock-realtime"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Realtime
    }

    async fn health_check(&self) -> Result<HealthStatus, TableTalkError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), TableTalkError> {
        Ok(())
    }
}

#[async_trait]
impl RealtimeAdapter for MockRealtime {
    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn mint_ephemeral(
        &self,
        session_id: &str,
        _user_id: &str,
        _email: &str,
    ) -> Result<EphemeralCredential, TableTalkError> {
        if !self.enabled {
            return Err(TableTalkError::realtime("realtime voice is not configured"));
        }
        Ok(EphemeralCredential {
            client_secret: ClientSecret {
                value: format!("mock-secret-{session_id}"),
                expires_at: chrono::Utc::now().timestamp() + 3600,
            },
            model: "mock-realtime-model".to_string(),
            voice: "mock-voice".to_string(),
        })
    }
}
