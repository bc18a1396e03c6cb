// SPDX-FileCopyrightText: 2026 TableTalk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Realtime credential issuer trait.

use async_trait::async_trait;

use crate::error::TableTalkError;
use crate::traits::adapter::PluginAdapter;
use crate::types::EphemeralCredential;

/// Mints short-lived credentials for the browser to connect directly to an
/// upstream realtime voice API. The server never proxies the realtime audio
/// stream; it only issues the credential.
#[async_trait]
pub trait RealtimeAdapter: PluginAdapter {
    /// Whether realtime voice is configured for this deployment.
    fn is_enabled(&self) -> bool;

    /// Obtains a short-lived credential tagged with session metadata.
    async fn mint_ephemeral(
        &self,
        session_id: &str,
        user_id: &str,
        email: &str,
    ) -> Result<EphemeralCredential, TableTalkError>;
}
