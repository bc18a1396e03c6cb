// SPDX-FileCopyrightText: 2026 TableTalk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain model types for storage entities.
//!
//! The canonical types are defined in `tabletalk-core::types` for use across
//! adapter trait boundaries. This module re-exports them for convenience
//! within the storage crate.

pub use tabletalk_core::types::{
    AgentRow, Conversation, ConversationMessage, ConversationSummary, FoodEntry, FoodItem,
    IntentRow, IntentResponseRecord, IntentResponseUpsert, NewFoodEntry, SectionRow, Session,
    SessionContext, SessionStatus, User, UserPreferences, UserStats,
};
