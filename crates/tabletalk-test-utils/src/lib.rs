// SPDX-FileCopyrightText: 2026 TableTalk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for TableTalk integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic, CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`MockCompletion`] - Mock LLM provider with scripted intent responses
//! - [`MockSpeech`] - Mock TTS capturing synthesized texts
//! - [`MockRealtime`] - Mock credential issuer
//! - [`TestHarness`] - Full orchestrator stack over temp SQLite

pub mod harness;
pub mod mock_completion;
pub mod mock_realtime;
pub mod mock_speech;

pub use harness::{TestConnection, TestHarness};
pub use mock_completion::MockCompletion;
pub use mock_realtime::MockRealtime;
pub use mock_speech::MockSpeech;
