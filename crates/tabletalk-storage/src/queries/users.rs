// SPDX-FileCopyrightText: 2026 TableTalk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User CRUD operations.

use rusqlite::params;
use tabletalk_core::TableTalkError;
use tabletalk_core::types::first_name_from_email;

use crate::database::{
    Database, from_json_col, is_unique_violation, map_tr_err, now_rfc3339, to_json_col,
};
use crate::models::{User, UserPreferences, UserStats};

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let preferences: String = row.get(4)?;
    let stats: String = row.get(5)?;
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        preferences: from_json_col::<UserPreferences>(&preferences),
        stats: from_json_col::<UserStats>(&stats),
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

const USER_COLUMNS: &str =
    "id, email, first_name, last_name, preferences, stats, created_at, updated_at";

/// Find a user by lowercased email, creating one if absent.
///
/// The first name is derived from the email local part on creation. A
/// concurrent insert racing on the unique email index is read back instead
/// of surfaced as an error.
pub async fn find_or_create_user(db: &Database, email: &str) -> Result<User, TableTalkError> {
    let email = email.trim().to_lowercase();
    db.connection()
        .call(move |conn| {
            let select = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1");
            if let Some(user) = conn
                .query_row(&select, params![email], row_to_user)
                .map(Some)
                .or_else(none_on_no_rows)?
            {
                return Ok(user);
            }

            let now = now_rfc3339();
            let user = User {
                id: uuid::Uuid::new_v4().to_string(),
                email: email.clone(),
                first_name: first_name_from_email(&email),
                last_name: None,
                preferences: UserPreferences::default(),
                stats: UserStats::default(),
                created_at: now.clone(),
                updated_at: now,
            };
            let inserted = conn.execute(
                "INSERT INTO users (id, email, first_name, last_name, preferences, stats, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    user.id,
                    user.email,
                    user.first_name,
                    user.last_name,
                    to_json_col(&user.preferences),
                    to_json_col(&user.stats),
                    user.created_at,
                    user.updated_at,
                ],
            );
            match inserted {
                Ok(_) => Ok(user),
                // Lost the race on the unique email index; read the winner back.
                Err(e) if is_unique_violation(&e) => {
                    Ok(conn.query_row(&select, params![email], row_to_user)?)
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Get a user by lowercased email.
pub async fn get_user_by_email(
    db: &Database,
    email: &str,
) -> Result<Option<User>, TableTalkError> {
    let email = email.trim().to_lowercase();
    db.connection()
        .call(move |conn| {
            let select = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1");
            conn.query_row(&select, params![email], row_to_user)
                .map(Some)
                .or_else(none_on_no_rows)
                .map_err(Into::into)
        })
        .await
        .map_err(map_tr_err)
}

/// Add deltas to a user's aggregate counters and stamp `last_active`.
pub async fn bump_user_stats(
    db: &Database,
    user_id: &str,
    sessions_delta: i64,
    meals_delta: i64,
) -> Result<(), TableTalkError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            let raw: String = conn.query_row(
                "SELECT stats FROM users WHERE id = ?1",
                params![user_id],
                |row| row.get(0),
            )?;
            let mut stats: UserStats = from_json_col(&raw);
            stats.total_sessions += sessions_delta;
            stats.total_meals += meals_delta;
            stats.last_active = Some(now_rfc3339());
            conn.execute(
                "UPDATE users SET stats = ?1, updated_at = ?2 WHERE id = ?3",
                params![to_json_col(&stats), now_rfc3339(), user_id],
            )?;
            Ok(())
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
