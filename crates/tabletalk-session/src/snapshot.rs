// SPDX-FileCopyrightText: 2026 TableTalk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recent-activity snapshot computed at `client_ready` time.

use tabletalk_core::types::{User, UserInfo, UserStatsBrief};
use tabletalk_core::{StorageAdapter, TableTalkError};

/// How many recent sessions feed the engagement average.
const RECENT_SESSION_WINDOW: i64 = 20;

/// Compose the [`UserInfo`] snapshot returned with `client_ready_response`.
pub async fn user_info(
    storage: &dyn StorageAdapter,
    user: &User,
) -> Result<UserInfo, TableTalkError> {
    let sessions = storage
        .list_recent_sessions(&user.id, RECENT_SESSION_WINDOW)
        .await?;
    let total_conversations = storage.count_conversations(&user.id).await?;
    let entries = storage.list_food_entries(&user.id).await?;

    let engagement_scores: Vec<f64> = sessions
        .iter()
        .filter_map(|s| s.context.engagement)
        .map(f64::from)
        .collect();
    let average_engagement = if engagement_scores.is_empty() {
        0.0
    } else {
        engagement_scores.iter().sum::<f64>() / engagement_scores.len() as f64
    };

    let last_session_date = sessions.first().map(|s| s.started_at.clone());
    let last_interaction_date = user
        .stats
        .last_active
        .clone()
        .or_else(|| last_session_date.clone());

    // The ledger is authoritative for meals; fall back to session context.
    let (last_meal_type, last_meal_date) = match entries.first() {
        Some(entry) => (Some(entry.meal_type), Some(entry.entry_date.clone())),
        None => sessions
            .iter()
            .find_map(|s| {
                s.context
                    .last_meal_type
                    .map(|m| (Some(m), s.context.last_meal_date.clone()))
            })
            .unwrap_or((None, None)),
    };

    Ok(UserInfo {
        has_interacted_before: user.stats.total_sessions > 0
            || total_conversations > 0
            || !sessions.is_empty(),
        total_conversations,
        total_sessions: user.stats.total_sessions.max(sessions.len() as i64),
        last_interaction_date,
        last_session_date,
        average_engagement,
        last_meal_type,
        last_meal_date,
        user_stats: UserStatsBrief {
            total_meals: user.stats.total_meals,
            total_sessions: user.stats.total_sessions,
        },
    })
}
