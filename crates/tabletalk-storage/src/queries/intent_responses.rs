// SPDX-FileCopyrightText: 2026 TableTalk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Intent response append-log operations.
//!
//! One logical record per `(session_id, conversation_ref, section_id,
//! intent_id)`. Repeated upserts merge extracted fields last-write-wins per
//! field name; older non-null values are preserved, and `is_completed` only
//! ever transitions false -> true.

use std::collections::BTreeMap;

use rusqlite::params;
use tabletalk_core::TableTalkError;

use crate::database::{Database, from_json_col, map_tr_err, now_rfc3339, to_json_col};
use crate::models::{IntentResponseRecord, IntentResponseUpsert};

const RESPONSE_COLUMNS: &str = "id, user_id, session_id, conversation_ref, section_id, \
     intent_id, transcript, intent_prompt, fields, is_completed, created_at, updated_at";

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<IntentResponseRecord> {
    let section_id: String = row.get(4)?;
    let fields: String = row.get(8)?;
    Ok(IntentResponseRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        session_id: row.get(2)?,
        conversation_ref: row.get(3)?,
        section_id: if section_id.is_empty() { None } else { Some(section_id) },
        intent_id: row.get(5)?,
        transcript: row.get(6)?,
        intent_prompt: row.get(7)?,
        fields: from_json_col::<BTreeMap<String, String>>(&fields),
        is_completed: row.get::<_, i64>(9)? != 0,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

/// Create or merge an intent response record.
pub async fn upsert_intent_response(
    db: &Database,
    upsert: &IntentResponseUpsert,
) -> Result<(), TableTalkError> {
    let upsert = upsert.clone();
    db.connection()
        .call(move |conn| {
            let section_key = upsert.section_id.clone().unwrap_or_default();
            let select = format!(
                "SELECT {RESPONSE_COLUMNS} FROM intent_responses
                 WHERE session_id = ?1 AND conversation_ref = ?2
                   AND section_id = ?3 AND intent_id = ?4"
            );
            let existing = conn
                .query_row(
                    &select,
                    params![upsert.session_id, upsert.conversation_ref, section_key, upsert.intent_id],
                    row_to_record,
                )
                .map(Some)
                .or_else(none_on_no_rows)?;

            let now = now_rfc3339();
            match existing {
                None => {
                    conn.execute(
                        "INSERT INTO intent_responses
                         (id, user_id, session_id, conversation_ref, section_id, intent_id,
                          transcript, intent_prompt, fields, is_completed, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                        params![
                            uuid::Uuid::new_v4().to_string(),
                            upsert.user_id,
                            upsert.session_id,
                            upsert.conversation_ref,
                            section_key,
                            upsert.intent_id,
                            upsert.transcript,
                            upsert.intent_prompt,
                            to_json_col(&upsert.fields),
                            upsert.is_completed as i64,
                            now,
                            now,
                        ],
                    )?;
                }
                Some(mut record) => {
                    // Newer extractions overwrite per field; untouched fields survive.
                    for (name, value) in upsert.fields {
                        record.fields.insert(name, value);
                    }
                    let is_completed = record.is_completed || upsert.is_completed;
                    let transcript = upsert.transcript.or(record.transcript);
                    let intent_prompt = upsert.intent_prompt.or(record.intent_prompt);
                    conn.execute(
                        "UPDATE intent_responses
                         SET transcript = ?1, intent_prompt = ?2, fields = ?3,
                             is_completed = ?4, updated_at = ?5
                         WHERE id = ?6",
                        params![
                            transcript,
                            intent_prompt,
                            to_json_col(&record.fields),
                            is_completed as i64,
                            now,
                            record.id,
                        ],
                    )?;
                }
            }
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch one record by its composite key.
pub async fn get_intent_response(
    db: &Database,
    session_id: &str,
    conversation_ref: &str,
    section_id: Option<&str>,
    intent_id: &str,
) -> Result<Option<IntentResponseRecord>, TableTalkError> {
    let session_id = session_id.to_string();
    let conversation_ref = conversation_ref.to_string();
    let section_key = section_id.unwrap_or_default().to_string();
    let intent_id = intent_id.to_string();
    db.connection()
        .call(move |conn| {
            let select = format!(
                "SELECT {RESPONSE_COLUMNS} FROM intent_responses
                 WHERE session_id = ?1 AND conversation_ref = ?2
                   AND section_id = ?3 AND intent_id = ?4"
            );
            conn.query_row(
                &select,
                params![session_id, conversation_ref, section_key, intent_id],
                row_to_record,
            )
            .map(Some)
            .or_else(none_on_no_rows)
            .map_err(Into::into)
        })
        .await
        .map_err(map_tr_err)
}

/// All records for a session, oldest first.
pub async fn list_intent_responses(
    db: &Database,
    session_id: &str,
) -> Result<Vec<IntentResponseRecord>, TableTalkError> {
    let session_id = session_id.to_string();
    db.connection()
        .call(move |conn| {
            let select = format!(
                "SELECT {RESPONSE_COLUMNS} FROM intent_responses
                 WHERE session_id = ?1 ORDER BY created_at ASC"
            );
            let mut stmt = conn.prepare(&select)?;
            let rows = stmt.query_map(params![session_id], row_to_record)?;
            let mut records = Vec::new();
            for row in rows {
                records.push(row?);
            }
            Ok(records)
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
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn upsert(fields: &[(&str, &str)], is_completed: bool) -> IntentResponseUpsert {
        IntentResponseUpsert {
            user_id: "u1".into(),
            session_id: "s1".into(),
            conversation_ref: "conv-1".into(),
            section_id: Some("sec-1".into()),
            intent_id: "3221".into(),
            transcript: Some("Call me Johnny".into()),
            intent_prompt: Some("Get user's name".into()),
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            is_completed,
        }
    }

    #[tokio::test]
    async fn upsert_creates_then_merges() {
        let (db, _dir) = setup_db().await;

        upsert_intent_response(&db, &upsert(&[("name", "Johnny")], false))
            .await
            .unwrap();
        upsert_intent_response(&db, &upsert(&[("age", "30")], true))
            .await
            .unwrap();

        let record = get_intent_response(&db, "s1", "conv-1", Some("sec-1"), "3221")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.fields.get("name").map(String::as_str), Some("Johnny"));
        assert_eq!(record.fields.get("age").map(String::as_str), Some("30"));
        assert!(record.is_completed);

        // Still one row for the composite key.
        let all = list_intent_responses(&db, "s1").await.unwrap();
        assert_eq!(all.len(), 1);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn newer_value_overwrites_per_field() {
        let (db, _dir) = setup_db().await;
        upsert_intent_response(&db, &upsert(&[("name", "Johnny"), ("city", "Rome")], false))
            .await
            .unwrap();
        upsert_intent_response(&db, &upsert(&[("name", "John")], false))
            .await
            .unwrap();

        let record = get_intent_response(&db, "s1", "conv-1", Some("sec-1"), "3221")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.fields.get("name").map(String::as_str), Some("John"));
        assert_eq!(record.fields.get("city").map(String::as_str), Some("Rome"));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn is_completed_is_monotonic() {
        let (db, _dir) = setup_db().await;
        upsert_intent_response(&db, &upsert(&[("name", "Johnny")], true))
            .await
            .unwrap();
        // A later incomplete write must not clear completion.
        upsert_intent_response(&db, &upsert(&[("name", "Johnny")], false))
            .await
            .unwrap();

        let record = get_intent_response(&db, "s1", "conv-1", Some("sec-1"), "3221")
            .await
            .unwrap()
            .unwrap();
        assert!(record.is_completed);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn distinct_intents_get_distinct_rows() {
        let (db, _dir) = setup_db().await;
        let mut a = upsert(&[("name", "Johnny")], false);
        let mut b = upsert(&[("meal", "lunch")], false);
        b.intent_id = "4001".into();
        a.section_id = None;
        upsert_intent_response(&db, &a).await.unwrap();
        upsert_intent_response(&db, &b).await.unwrap();

        let all = list_intent_responses(&db, "s1").await.unwrap();
        assert_eq!(all.len(), 2);
        // section_id round-trips as None for the '' sentinel.
        assert!(all.iter().any(|r| r.section_id.is_none()));
        db.close().await.unwrap();
    }
}
