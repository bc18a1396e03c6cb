// SPDX-FileCopyrightText: 2026 TableTalk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the TableTalk dialogue orchestrator.
//!
//! This crate provides the foundational trait definitions, error types, and
//! common types used throughout the TableTalk workspace. All adapters
//! implement traits defined here.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::TableTalkError;
pub use types::{AdapterType, HealthStatus, SessionId, UserId};

// Re-export all adapter traits at crate root.
pub use traits::{
    CompletionAdapter, PluginAdapter, RealtimeAdapter, SpeechAdapter, StorageAdapter,
};
