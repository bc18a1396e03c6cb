// SPDX-FileCopyrightText: 2026 TableTalk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent graph source collections: agents, sections, intents.
//!
//! These rows are the raw material the catalog compiles into the traversable
//! agent document. Intents are unique on `(section_id, intent_id)` and read
//! back ordered by `(ord, intent_id)`.

use rusqlite::params;
use tabletalk_core::TableTalkError;

use crate::database::{Database, from_json_col, map_tr_err, to_json_col};
use crate::models::{AgentRow, IntentRow, SectionRow};

/// Get an agent header by id.
pub async fn get_agent(db: &Database, agent_id: &str) -> Result<Option<AgentRow>, TableTalkError> {
    let agent_id = agent_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT id, name, about, mode FROM agents WHERE id = ?1",
                params![agent_id],
                |row| {
                    let mode: String = row.get(3)?;
                    Ok(AgentRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        about: row.get(2)?,
                        mode: from_json_col::<Vec<String>>(&mode),
                    })
                },
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })
            .map_err(Into::into)
        })
        .await
        .map_err(map_tr_err)
}

/// Sections for an agent, sorted by `ord`.
pub async fn list_sections(
    db: &Database,
    agent_id: &str,
) -> Result<Vec<SectionRow>, TableTalkError> {
    let agent_id = agent_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, agent_id, name, about, guidelines, ord
                 FROM sections WHERE agent_id = ?1 ORDER BY ord ASC, id ASC",
            )?;
            let rows = stmt.query_map(params![agent_id], |row| {
                Ok(SectionRow {
                    id: row.get(0)?,
                    agent_id: row.get(1)?,
                    name: row.get(2)?,
                    about: row.get(3)?,
                    guidelines: row.get(4)?,
                    ord: row.get(5)?,
                })
            })?;
            let mut sections = Vec::new();
            for row in rows {
                sections.push(row?);
            }
            Ok(sections)
        })
        .await
        .map_err(map_tr_err)
}

/// Intents for a section, sorted by `(ord, intent_id)`.
pub async fn list_intents(
    db: &Database,
    section_id: &str,
) -> Result<Vec<IntentRow>, TableTalkError> {
    let section_id = section_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT section_id, intent_id, intent, is_mandatory, retry_limit,
                        fields_to_extract, context, ord
                 FROM intents WHERE section_id = ?1 ORDER BY ord ASC, intent_id ASC",
            )?;
            let rows = stmt.query_map(params![section_id], |row| {
                Ok(IntentRow {
                    section_id: row.get(0)?,
                    intent_id: row.get(1)?,
                    intent: row.get(2)?,
                    is_mandatory: row.get::<_, i64>(3)? != 0,
                    retry_limit: row.get::<_, i64>(4)? as u32,
                    fields_to_extract: row.get(5)?,
                    context: row.get(6)?,
                    ord: row.get(7)?,
                })
            })?;
            let mut intents = Vec::new();
            for row in rows {
                intents.push(row?);
            }
            Ok(intents)
        })
        .await
        .map_err(map_tr_err)
}

/// Insert an agent header row.
pub async fn insert_agent(db: &Database, agent: &AgentRow) -> Result<(), TableTalkError> {
    let agent = agent.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO agents (id, name, about, mode) VALUES (?1, ?2, ?3, ?4)",
                params![agent.id, agent.name, agent.about, to_json_col(&agent.mode)],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Insert a section row.
pub async fn insert_section(db: &Database, section: &SectionRow) -> Result<(), TableTalkError> {
    let section = section.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO sections (id, agent_id, name, about, guidelines, ord)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    section.id,
                    section.agent_id,
                    section.name,
                    section.about,
                    section.guidelines,
                    section.ord,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Insert an intent row. The `(section_id, intent_id)` pair is unique.
pub async fn insert_intent(db: &Database, intent: &IntentRow) -> Result<(), TableTalkError> {
    let intent = intent.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO intents
                 (section_id, intent_id, intent, is_mandatory, retry_limit,
                  fields_to_extract, context, ord)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    intent.section_id,
                    intent.intent_id,
                    intent.intent,
                    intent.is_mandatory as i64,
                    intent.retry_limit as i64,
                    intent.fields_to_extract,
                    intent.context,
                    intent.ord,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
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

    fn intent(section_id: &str, intent_id: i64, ord: i64) -> IntentRow {
        IntentRow {
            section_id: section_id.to_string(),
            intent_id,
            intent: format!("intent {intent_id}"),
            is_mandatory: true,
            retry_limit: 2,
            fields_to_extract: None,
            context: None,
            ord,
        }
    }

    #[tokio::test]
    async fn agent_graph_round_trips_in_order() {
        let (db, _dir) = setup_db().await;

        insert_agent(
            &db,
            &AgentRow {
                id: "A".into(),
                name: "Meals".into(),
                about: "meal logging".into(),
                mode: vec!["voice".into()],
            },
        )
        .await
        .unwrap();

        for (id, ord) in [("sec-2", 2), ("sec-1", 1)] {
            insert_section(
                &db,
                &SectionRow {
                    id: id.into(),
                    agent_id: "A".into(),
                    name: id.into(),
                    about: "".into(),
                    guidelines: None,
                    ord,
                },
            )
            .await
            .unwrap();
        }

        // Inserted out of order; read back sorted by (ord, intent_id).
        insert_intent(&db, &intent("sec-1", 103, 3)).await.unwrap();
        insert_intent(&db, &intent("sec-1", 101, 1)).await.unwrap();
        insert_intent(&db, &intent("sec-1", 102, 2)).await.unwrap();

        let agent = get_agent(&db, "A").await.unwrap().unwrap();
        assert_eq!(agent.mode, vec!["voice"]);

        let sections = list_sections(&db, "A").await.unwrap();
        assert_eq!(sections[0].id, "sec-1");
        assert_eq!(sections[1].id, "sec-2");

        let intents = list_intents(&db, "sec-1").await.unwrap();
        let ids: Vec<_> = intents.iter().map(|i| i.intent_id).collect();
        assert_eq!(ids, vec![101, 102, 103]);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_intent_id_within_section_is_rejected() {
        let (db, _dir) = setup_db().await;
        insert_agent(
            &db,
            &AgentRow {
                id: "A".into(),
                name: "Meals".into(),
                about: "".into(),
                mode: vec![],
            },
        )
        .await
        .unwrap();
        insert_section(
            &db,
            &SectionRow {
                id: "sec-1".into(),
                agent_id: "A".into(),
                name: "s".into(),
                about: "".into(),
                guidelines: None,
                ord: 1,
            },
        )
        .await
        .unwrap();

        insert_intent(&db, &intent("sec-1", 101, 1)).await.unwrap();
        assert!(insert_intent(&db, &intent("sec-1", 101, 2)).await.is_err());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn missing_agent_returns_none() {
        let (db, _dir) = setup_db().await;
        assert!(get_agent(&db, "nope").await.unwrap().is_none());
        db.close().await.unwrap();
    }
}
