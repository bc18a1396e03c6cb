// SPDX-FileCopyrightText: 2026 TableTalk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./tabletalk.toml` > `~/.config/tabletalk/tabletalk.toml`
//! > `/etc/tabletalk/tabletalk.toml` with environment variable overrides via
//! `TABLETALK_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::TableTalkConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/tabletalk/tabletalk.toml` (system-wide)
/// 3. `~/.config/tabletalk/tabletalk.toml` (user XDG config)
/// 4. `./tabletalk.toml` (local directory)
/// 5. `TABLETALK_*` environment variables
pub fn load_config() -> Result<TableTalkConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<TableTalkConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TableTalkConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<TableTalkConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TableTalkConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading (exposed for
/// diagnostic use).
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(TableTalkConfig::default()))
        .merge(Toml::file("/etc/tabletalk/tabletalk.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("tabletalk/tabletalk.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("tabletalk.toml"))
        .merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `TABLETALK_LLM_API_KEY` must map to
/// `llm.api_key`, not `llm.api.key`.
fn env_provider() -> Env {
    Env::prefixed("TABLETALK_").map(|key| {
        // `key` is the lowercased env var name with prefix stripped.
        // Example: TABLETALK_LLM_API_KEY -> "llm_api_key"
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("agent_", "agent.", 1)
            .replacen("server_", "server.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("llm_", "llm.", 1)
            .replacen("speech_", "speech.", 1)
            .replacen("realtime_", "realtime.", 1)
            .replacen("session_", "session.", 1);
        mapped.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_yields_defaults() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.agent.name, "tabletalk");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.llm.timeout_secs, 8);
    }

    #[test]
    fn toml_overrides_defaults() {
        let config = load_config_from_str(
            r#"
            [server]
            port = 9090

            [llm]
            model = "gpt-4o"
            max_retries = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.llm.max_retries, 5);
        // Untouched sections keep defaults.
        assert_eq!(config.session.idle_timeout_secs, 300);
    }

    #[test]
    fn unknown_key_is_rejected() {
        let result = load_config_from_str(
            r#"
            [agent]
            naem = "oops"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn env_var_mapping_preserves_underscore_keys() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("TABLETALK_LLM_API_KEY", "sk-test");
            jail.set_env("TABLETALK_SESSION_IDLE_TIMEOUT_SECS", "120");
            let config: TableTalkConfig = Figment::new()
                .merge(Serialized::defaults(TableTalkConfig::default()))
                .merge(super::env_provider())
                .extract()?;
            assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
            assert_eq!(config.session.idle_timeout_secs, 120);
            Ok(())
        });
    }
}
