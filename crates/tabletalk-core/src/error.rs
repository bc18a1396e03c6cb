// SPDX-FileCopyrightText: 2026 TableTalk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the TableTalk dialogue orchestrator.

use thiserror::Error;

/// The primary error type used across all TableTalk adapter traits and core operations.
#[derive(Debug, Error)]
pub enum TableTalkError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// LLM completion provider errors (API failure, unparseable output, model not found).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Speech synthesis errors (API failure, unsupported input).
    #[error("speech error: {message}")]
    Speech {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Realtime credential issuer errors (API failure, feature disabled).
    #[error("realtime error: {message}")]
    Realtime {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Session lifecycle violations (unknown session, invalid transition, rate limit).
    #[error("session error: {0}")]
    Session(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl TableTalkError {
    /// Shorthand for a provider error without an underlying source.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a speech error without an underlying source.
    pub fn speech(message: impl Into<String>) -> Self {
        Self::Speech {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a realtime error without an underlying source.
    pub fn realtime(message: impl Into<String>) -> Self {
        Self::Realtime {
            message: message.into(),
            source: None,
        }
    }
}
