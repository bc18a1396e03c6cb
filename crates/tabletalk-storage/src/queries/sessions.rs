// SPDX-FileCopyrightText: 2026 TableTalk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session CRUD operations.
//!
//! `find_or_create_session` is the single entry point for session creation:
//! concurrent connects racing on the unique `session_id` index converge on
//! one row, never an error.

use std::str::FromStr;

use rusqlite::params;
use tabletalk_core::TableTalkError;

use crate::database::{
    Database, from_json_col, is_unique_violation, map_tr_err, now_rfc3339, to_json_col,
};
use crate::models::{Session, SessionContext, SessionStatus};

const SESSION_COLUMNS: &str =
    "id, session_id, user_id, user_email, status, context, started_at, ended_at";

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    let status: String = row.get(4)?;
    let context: String = row.get(5)?;
    Ok(Session {
        id: row.get(0)?,
        session_id: row.get(1)?,
        user_id: row.get(2)?,
        user_email: row.get(3)?,
        status: SessionStatus::from_str(&status).unwrap_or(SessionStatus::Active),
        context: from_json_col::<SessionContext>(&context),
        started_at: row.get(6)?,
        ended_at: row.get(7)?,
    })
}

/// Find or create the session for the given client-supplied id.
///
/// Contract: never raises on a duplicate `session_id`; the loser of a
/// concurrent insert race reads the winner's row back.
pub async fn find_or_create_session(
    db: &Database,
    session_id: &str,
    user_id: &str,
    user_email: &str,
    context: &SessionContext,
) -> Result<Session, TableTalkError> {
    let session_id = session_id.to_string();
    let user_id = user_id.to_string();
    let user_email = user_email.to_string();
    let context = context.clone();
    db.connection()
        .call(move |conn| {
            let select = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE session_id = ?1");
            if let Some(session) = conn
                .query_row(&select, params![session_id], row_to_session)
                .map(Some)
                .or_else(none_on_no_rows)?
            {
                return Ok(session);
            }

            let session = Session {
                id: uuid::Uuid::new_v4().to_string(),
                session_id: session_id.clone(),
                user_id,
                user_email,
                status: SessionStatus::Active,
                context,
                started_at: now_rfc3339(),
                ended_at: None,
            };
            let inserted = conn.execute(
                "INSERT INTO sessions (id, session_id, user_id, user_email, status, context, started_at, ended_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    session.id,
                    session.session_id,
                    session.user_id,
                    session.user_email,
                    session.status.to_string(),
                    to_json_col(&session.context),
                    session.started_at,
                    session.ended_at,
                ],
            );
            match inserted {
                Ok(_) => Ok(session),
                // Concurrent peer won the insert; read its row back.
                Err(e) if is_unique_violation(&e) => {
                    Ok(conn.query_row(&select, params![session_id], row_to_session)?)
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Get a session by its client-supplied id.
pub async fn get_session(
    db: &Database,
    session_id: &str,
) -> Result<Option<Session>, TableTalkError> {
    let session_id = session_id.to_string();
    db.connection()
        .call(move |conn| {
            let select = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE session_id = ?1");
            conn.query_row(&select, params![session_id], row_to_session)
                .map(Some)
                .or_else(none_on_no_rows)
                .map_err(Into::into)
        })
        .await
        .map_err(map_tr_err)
}

/// Update a session's status; terminal statuses also stamp `ended_at`.
pub async fn update_session_status(
    db: &Database,
    session_id: &str,
    status: SessionStatus,
) -> Result<(), TableTalkError> {
    let session_id = session_id.to_string();
    db.connection()
        .call(move |conn| {
            let ended_at = match status {
                SessionStatus::Active => None,
                SessionStatus::Completed | SessionStatus::Abandoned => Some(now_rfc3339()),
            };
            conn.execute(
                "UPDATE sessions SET status = ?1, ended_at = COALESCE(?2, ended_at)
                 WHERE session_id = ?3",
                params![status.to_string(), ended_at, session_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Replace a session's context document.
pub async fn update_session_context(
    db: &Database,
    session_id: &str,
    context: &SessionContext,
) -> Result<(), TableTalkError> {
    let session_id = session_id.to_string();
    let context = context.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE sessions SET context = ?1 WHERE session_id = ?2",
                params![to_json_col(&context), session_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Most recent sessions for a user, newest first.
pub async fn list_recent_sessions(
    db: &Database,
    user_id: &str,
    limit: i64,
) -> Result<Vec<Session>, TableTalkError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            let select = format!(
                "SELECT {SESSION_COLUMNS} FROM sessions WHERE user_id = ?1
                 ORDER BY started_at DESC LIMIT ?2"
            );
            let mut stmt = conn.prepare(&select)?;
            let rows = stmt.query_map(params![user_id, limit], row_to_session)?;
            let mut sessions = Vec::new();
            for row in rows {
                sessions.push(row?);
            }
            Ok(sessions)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::users::find_or_create_user;
    use tempfile::tempdir;

    async fn setup() -> (Database, String, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        let user = find_or_create_user(&db, "sess@ex.com").await.unwrap();
        (db, user.id, dir)
    }

    #[tokio::test]
    async fn find_or_create_returns_same_row() {
        let (db, user_id, _dir) = setup().await;
        let ctx = SessionContext::default();

        let first = find_or_create_session(&db, "s1", &user_id, "sess@ex.com", &ctx)
            .await
            .unwrap();
        let second = find_or_create_session(&db, "s1", &user_id, "sess@ex.com", &ctx)
            .await
            .unwrap();
        assert_eq!(first.id, second.id);

        let count: i64 = db
            .connection()
            .call(|conn| Ok::<i64, rusqlite::Error>(conn.query_row("SELECT COUNT(*) FROM sessions", [], |r| r.get(0))?))
            .await
            .unwrap();
        assert_eq!(count, 1);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_find_or_create_converges() {
        let (db, user_id, _dir) = setup().await;
        let db = std::sync::Arc::new(db);
        let ctx = SessionContext::default();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let db = db.clone();
            let user_id = user_id.clone();
            let ctx = ctx.clone();
            handles.push(tokio::spawn(async move {
                find_or_create_session(&db, "racy", &user_id, "sess@ex.com", &ctx).await
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().id);
        }
        ids.dedup();
        assert_eq!(ids.len(), 1, "all racers must observe the same row");

        let count: i64 = db
            .connection()
            .call(|conn| {
                Ok::<i64, rusqlite::Error>(conn.query_row(
                    "SELECT COUNT(*) FROM sessions WHERE session_id = 'racy'",
                    [],
                    |r| r.get(0),
                )?)
            })
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn status_update_stamps_ended_at() {
        let (db, user_id, _dir) = setup().await;
        let ctx = SessionContext::default();
        find_or_create_session(&db, "s-done", &user_id, "sess@ex.com", &ctx)
            .await
            .unwrap();

        update_session_status(&db, "s-done", SessionStatus::Completed)
            .await
            .unwrap();

        let session = get_session(&db, "s-done").await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert!(session.ended_at.is_some());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn recent_sessions_ordered_newest_first() {
        let (db, user_id, _dir) = setup().await;
        let ctx = SessionContext::default();
        for i in 0..3 {
            find_or_create_session(&db, &format!("s{i}"), &user_id, "sess@ex.com", &ctx)
                .await
                .unwrap();
            // started_at has millisecond precision; keep insertions apart.
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        let recent = list_recent_sessions(&db, &user_id, 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].session_id, "s2");
        assert_eq!(recent[1].session_id, "s1");
        db.close().await.unwrap();
    }
}
