// SPDX-FileCopyrightText: 2026 TableTalk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Food entry ledger operations.

use std::str::FromStr;

use rusqlite::params;
use tabletalk_core::TableTalkError;
use tabletalk_core::types::MealType;

use crate::database::{Database, from_json_col, map_tr_err, now_rfc3339, to_json_col};
use crate::models::{FoodEntry, FoodItem, NewFoodEntry};

const ENTRY_COLUMNS: &str = "id, user_id, meal_type, foods, total_calories, total_protein, \
     total_carbs, total_fat, entry_date, created_at";

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<FoodEntry> {
    let meal_type: String = row.get(2)?;
    let foods: String = row.get(3)?;
    Ok(FoodEntry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        meal_type: MealType::from_str(&meal_type).unwrap_or(MealType::Snack),
        foods: from_json_col::<Vec<FoodItem>>(&foods),
        total_calories: row.get(4)?,
        total_protein: row.get(5)?,
        total_carbs: row.get(6)?,
        total_fat: row.get(7)?,
        entry_date: row.get(8)?,
        created_at: row.get(9)?,
    })
}

/// Persist a meal ledger row.
pub async fn create_food_entry(
    db: &Database,
    entry: &NewFoodEntry,
) -> Result<FoodEntry, TableTalkError> {
    let entry = entry.clone();
    db.connection()
        .call(move |conn| {
            let created = FoodEntry {
                id: uuid::Uuid::new_v4().to_string(),
                user_id: entry.user_id,
                meal_type: entry.meal_type,
                foods: entry.foods,
                total_calories: entry.total_calories,
                total_protein: entry.total_protein,
                total_carbs: entry.total_carbs,
                total_fat: entry.total_fat,
                entry_date: entry.entry_date,
                created_at: now_rfc3339(),
            };
            conn.execute(
                "INSERT INTO food_entries
                 (id, user_id, meal_type, foods, total_calories, total_protein,
                  total_carbs, total_fat, entry_date, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    created.id,
                    created.user_id,
                    created.meal_type.to_string(),
                    to_json_col(&created.foods),
                    created.total_calories,
                    created.total_protein,
                    created.total_carbs,
                    created.total_fat,
                    created.entry_date,
                    created.created_at,
                ],
            )?;
            Ok(created)
        })
        .await
        .map_err(map_tr_err)
}

/// Entries for a user, newest date first.
pub async fn list_food_entries(
    db: &Database,
    user_id: &str,
) -> Result<Vec<FoodEntry>, TableTalkError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            let select = format!(
                "SELECT {ENTRY_COLUMNS} FROM food_entries
                 WHERE user_id = ?1 ORDER BY entry_date DESC, created_at DESC"
            );
            let mut stmt = conn.prepare(&select)?;
            let rows = stmt.query_map(params![user_id], row_to_entry)?;
            let mut entries = Vec::new();
            for row in rows {
                entries.push(row?);
            }
            Ok(entries)
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
        crate::queries::users::find_or_create_user(&db, "food@ex.com")
            .await
            .unwrap();
        (db, dir)
    }

    async fn user_id(db: &Database) -> String {
        crate::queries::users::get_user_by_email(db, "food@ex.com")
            .await
            .unwrap()
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn create_and_list_round_trips() {
        let (db, _dir) = setup_db().await;
        let uid = user_id(&db).await;

        let entry = NewFoodEntry {
            user_id: uid.clone(),
            meal_type: MealType::Breakfast,
            foods: vec![FoodItem::from_name("eggs"), FoodItem::from_name("toast")],
            total_calories: Some(300.0),
            total_protein: None,
            total_carbs: None,
            total_fat: None,
            entry_date: "2026-08-01".into(),
        };
        let created = create_food_entry(&db, &entry).await.unwrap();
        assert_eq!(created.meal_type, MealType::Breakfast);

        let entries = list_food_entries(&db, &uid).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].foods.len(), 2);
        assert_eq!(entries[0].foods[0].name, "eggs");
        assert_eq!(entries[0].foods[0].quantity, 1.0);
        assert_eq!(entries[0].foods[0].unit, "");
        assert_eq!(entries[0].total_calories, Some(300.0));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn entries_ordered_newest_date_first() {
        let (db, _dir) = setup_db().await;
        let uid = user_id(&db).await;

        for date in ["2026-07-30", "2026-08-01", "2026-07-31"] {
            let entry = NewFoodEntry {
                user_id: uid.clone(),
                meal_type: MealType::Lunch,
                foods: vec![FoodItem::from_name("soup")],
                total_calories: None,
                total_protein: None,
                total_carbs: None,
                total_fat: None,
                entry_date: date.into(),
            };
            create_food_entry(&db, &entry).await.unwrap();
        }

        let entries = list_food_entries(&db, &uid).await.unwrap();
        let dates: Vec<_> = entries.iter().map(|e| e.entry_date.as_str()).collect();
        assert_eq!(dates, vec!["2026-08-01", "2026-07-31", "2026-07-30"]);
        db.close().await.unwrap();
    }
}
