// SPDX-FileCopyrightText: 2026 TableTalk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as valid bind addresses, non-empty paths, and sane
//! retry/timeout values.

use crate::diagnostic::ConfigError;
use crate::model::TableTalkConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &TableTalkConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let host = config.server.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::Validation {
            message: "server.host must not be empty".to_string(),
        });
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::Validation {
                message: format!("server.host `{host}` is not a valid IP address or hostname"),
            });
        }
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    // The three upstream adapters share the same retry/backoff contract.
    let retry_sections = [
        (
            "llm",
            config.llm.max_retries,
            config.llm.timeout_secs,
            config.llm.backoff_base_ms,
            config.llm.backoff_cap_ms,
        ),
        (
            "speech",
            config.speech.max_retries,
            config.speech.timeout_secs,
            config.speech.backoff_base_ms,
            config.speech.backoff_cap_ms,
        ),
        (
            "realtime",
            config.realtime.max_retries,
            config.realtime.timeout_secs,
            config.realtime.backoff_base_ms,
            config.realtime.backoff_cap_ms,
        ),
    ];
    for (section, max_retries, timeout_secs, backoff_base_ms, backoff_cap_ms) in retry_sections {
        if max_retries == 0 {
            errors.push(ConfigError::Validation {
                message: format!("{section}.max_retries must be at least 1"),
            });
        }
        if timeout_secs == 0 {
            errors.push(ConfigError::Validation {
                message: format!("{section}.timeout_secs must be positive"),
            });
        }
        if backoff_cap_ms < backoff_base_ms {
            errors.push(ConfigError::Validation {
                message: format!(
                    "{section}.backoff_cap_ms ({backoff_cap_ms}) must not be below \
                     {section}.backoff_base_ms ({backoff_base_ms})"
                ),
            });
        }
    }

    match config.speech.provider.as_str() {
        "google" | "elevenlabs" => {}
        other => errors.push(ConfigError::Validation {
            message: format!(
                "speech.provider must be `google` or `elevenlabs`, got `{other}`"
            ),
        }),
    }

    if config.realtime.enabled && config.realtime.api_key.is_none() {
        errors.push(ConfigError::Validation {
            message: "realtime.enabled requires realtime.api_key".to_string(),
        });
    }

    if config.session.sweep_interval_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "session.sweep_interval_secs must be positive".to_string(),
        });
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
