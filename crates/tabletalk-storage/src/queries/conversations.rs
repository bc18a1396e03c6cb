// SPDX-FileCopyrightText: 2026 TableTalk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation log operations.
//!
//! A conversation is 1:1 with a session; its document row carries the
//! rolling meal summary while the ordered message log lives in
//! `conversation_messages` (AUTOINCREMENT id = insertion order).

use std::str::FromStr;

use rusqlite::params;
use tabletalk_core::TableTalkError;
use tabletalk_core::types::{CompletionStatus, MealType, MessageType};

use crate::database::{Database, from_json_col, map_tr_err, now_rfc3339, to_json_col};
use crate::models::{Conversation, ConversationMessage, ConversationSummary};

fn row_to_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    let meal_type: Option<String> = row.get(3)?;
    let foods_logged: String = row.get(4)?;
    let completion_status: String = row.get(6)?;
    Ok(Conversation {
        id: row.get(0)?,
        session_id: row.get(1)?,
        user_id: row.get(2)?,
        summary: ConversationSummary {
            meal_type: meal_type.as_deref().and_then(|m| MealType::from_str(m).ok()),
            foods_logged: from_json_col::<Vec<String>>(&foods_logged),
            total_calories: row.get(5)?,
            completion_status: CompletionStatus::from_str(&completion_status)
                .unwrap_or(CompletionStatus::Incomplete),
            is_complete_meal: row.get::<_, i64>(7)? != 0,
        },
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

const CONVERSATION_COLUMNS: &str = "id, session_id, user_id, meal_type, foods_logged, \
     total_calories, completion_status, is_complete_meal, created_at, updated_at";

/// Append a message to the session's conversation, creating the conversation
/// document if absent. Returns `true` when a new conversation row was
/// created.
pub async fn append_message(
    db: &Database,
    session_id: &str,
    user_id: &str,
    message: &ConversationMessage,
) -> Result<bool, TableTalkError> {
    let session_id = session_id.to_string();
    let user_id = user_id.to_string();
    let message = message.clone();
    db.connection()
        .call(move |conn| {
            let existing: Option<String> = conn
                .query_row(
                    "SELECT id FROM conversations WHERE session_id = ?1",
                    params![session_id],
                    |row| row.get(0),
                )
                .map(Some)
                .or_else(none_on_no_rows)?;

            let (conversation_id, created) = match existing {
                Some(id) => (id, false),
                None => {
                    let id = uuid::Uuid::new_v4().to_string();
                    let now = now_rfc3339();
                    conn.execute(
                        "INSERT INTO conversations (id, session_id, user_id, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        params![id, session_id, user_id, now, now],
                    )?;
                    (id, true)
                }
            };

            conn.execute(
                "INSERT INTO conversation_messages (conversation_id, message_type, content, timestamp, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    conversation_id,
                    message.message_type.to_string(),
                    message.content,
                    message.timestamp,
                    to_json_col(&message.metadata),
                ],
            )?;
            conn.execute(
                "UPDATE conversations SET updated_at = ?1 WHERE id = ?2",
                params![now_rfc3339(), conversation_id],
            )?;
            Ok(created)
        })
        .await
        .map_err(map_tr_err)
}

/// Get the conversation document for a session.
pub async fn get_conversation(
    db: &Database,
    session_id: &str,
) -> Result<Option<Conversation>, TableTalkError> {
    let session_id = session_id.to_string();
    db.connection()
        .call(move |conn| {
            let select =
                format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE session_id = ?1");
            conn.query_row(&select, params![session_id], row_to_conversation)
                .map(Some)
                .or_else(none_on_no_rows)
                .map_err(Into::into)
        })
        .await
        .map_err(map_tr_err)
}

/// Messages for a session's conversation in insertion order.
pub async fn get_messages(
    db: &Database,
    session_id: &str,
) -> Result<Vec<ConversationMessage>, TableTalkError> {
    let session_id = session_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.message_type, m.content, m.timestamp, m.metadata
                 FROM conversation_messages m
                 JOIN conversations c ON c.id = m.conversation_id
                 WHERE c.session_id = ?1
                 ORDER BY m.id ASC",
            )?;
            let rows = stmt.query_map(params![session_id], |row| {
                let message_type: String = row.get(1)?;
                let metadata: String = row.get(4)?;
                Ok(ConversationMessage {
                    id: Some(row.get(0)?),
                    message_type: MessageType::from_str(&message_type)
                        .unwrap_or(MessageType::User),
                    content: row.get(2)?,
                    timestamp: row.get(3)?,
                    metadata: from_json_col(&metadata),
                })
            })?;
            let mut messages = Vec::new();
            for row in rows {
                messages.push(row?);
            }
            Ok(messages)
        })
        .await
        .map_err(map_tr_err)
}

/// Replace the conversation's rolling meal summary, creating the
/// conversation document if absent (side-effect tasks may run in any order).
///
/// Invariant: `completion_status = complete` forces `is_complete_meal`.
pub async fn update_conversation_summary(
    db: &Database,
    session_id: &str,
    summary: &ConversationSummary,
) -> Result<(), TableTalkError> {
    let session_id = session_id.to_string();
    let mut summary = summary.clone();
    if summary.completion_status == CompletionStatus::Complete {
        summary.is_complete_meal = true;
    }
    db.connection()
        .call(move |conn| {
            let existing: Option<String> = conn
                .query_row(
                    "SELECT id FROM conversations WHERE session_id = ?1",
                    params![session_id],
                    |row| row.get(0),
                )
                .map(Some)
                .or_else(none_on_no_rows)?;
            if existing.is_none() {
                // The owning session always exists by the time a summary is
                // written; bail quietly when it does not.
                let user_id: Option<String> = conn
                    .query_row(
                        "SELECT user_id FROM sessions WHERE session_id = ?1",
                        params![session_id],
                        |row| row.get(0),
                    )
                    .map(Some)
                    .or_else(none_on_no_rows)?;
                let Some(user_id) = user_id else {
                    return Ok(());
                };
                let now = now_rfc3339();
                conn.execute(
                    "INSERT INTO conversations (id, session_id, user_id, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![uuid::Uuid::new_v4().to_string(), session_id, user_id, now, now],
                )?;
            }
            conn.execute(
                "UPDATE conversations
                 SET meal_type = ?1, foods_logged = ?2, total_calories = ?3,
                     completion_status = ?4, is_complete_meal = ?5, updated_at = ?6
                 WHERE session_id = ?7",
                params![
                    summary.meal_type.map(|m| m.to_string()),
                    to_json_col(&summary.foods_logged),
                    summary.total_calories,
                    summary.completion_status.to_string(),
                    summary.is_complete_meal as i64,
                    now_rfc3339(),
                    session_id,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Count conversations owned by a user.
pub async fn count_conversations(db: &Database, user_id: &str) -> Result<i64, TableTalkError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM conversations WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )?)
        })
        .await
        .map_err(map_tr_err)
}

fn none_on_no_rows<T>(e: rusqlite::Error) -> Result<Option<T>, rusqlite::Error> {
    match e {
        rusqlite::Error::QueryReturnedNoRows => Ok(None),
        other => Err(other),
    }
}
