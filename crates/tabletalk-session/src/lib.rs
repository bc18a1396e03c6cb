// SPDX-FileCopyrightText: 2026 TableTalk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session-level building blocks for the TableTalk orchestrator: the live
//! session registry with its eviction and rate-limit policies, the per-session
//! intent cursor and lifecycle state machine, the conversation summarizer,
//! and the user-activity snapshot.

pub mod cursor;
pub mod registry;
pub mod snapshot;
pub mod summarizer;

pub use cursor::IntentCursor;
pub use registry::{Lifecycle, SessionEntry, SessionRegistry, SessionState};
pub use summarizer::{HistoryEntry, summarize_history};
