// SPDX-FileCopyrightText: 2026 TableTalk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket session orchestrator for the TableTalk dialogue server.
//!
//! Routes typed frames, enforces the session lifecycle, mediates LLM calls
//! under the strict intent contract, and schedules speech synthesis and
//! persistence as cancellable background tasks with send-early/persist-late
//! ordering.

pub mod frames;
pub mod orchestrator;
pub mod server;
pub mod ws;

pub use frames::{ClientFrame, ServerFrame};
pub use orchestrator::Orchestrator;
pub use server::{GatewayState, start_server};
