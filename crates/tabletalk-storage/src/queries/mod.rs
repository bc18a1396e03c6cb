// SPDX-FileCopyrightText: 2026 TableTalk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules, one per collection.

pub mod agents;
pub mod conversations;
pub mod food_entries;
pub mod intent_responses;
pub mod sessions;
pub mod users;
