// SPDX-FileCopyrightText: 2026 TableTalk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! LLM completion adapter for the TableTalk dialogue orchestrator.
//!
//! One concern: given a system prompt and a user/context prompt, return a
//! strict `{id, isCompleted, fields, nextPrompt}` object, surviving fenced
//! output, surrounding prose, timeouts, and transient upstream failures.

pub mod client;
pub mod extract;

pub use client::CompletionClient;
pub use extract::parse_intent_response;
