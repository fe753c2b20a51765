//! User-authored achievement definitions

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use meta_achiever_core::{AchievementDefinition, Condition, ConditionData, NewDefinition, Provenance};
use rusqlite::{params, Connection, OptionalExtension, Result, Row};

use super::{from_db_time, from_db_time_opt, to_db_time};

const COLUMNS: &str = "id, user_id, name, description, condition_type, condition_data, image,
                       created_at, imported_from_shared_id, original_creator, completed_at";

/// Decode a stored condition. A payload that is not valid JSON keeps the
/// row loadable as [`Condition::Unrecognized`], which never evaluates as met.
pub(crate) fn condition_from_columns(kind: &str, data: &str) -> Condition {
    match serde_json::from_str::<ConditionData>(data) {
        Ok(data) => Condition::from_parts(kind, data),
        Err(e) => {
            tracing::warn!(kind, error = %e, "Stored condition payload is not valid JSON");
            Condition::Unrecognized {
                kind: kind.to_string(),
                games: Vec::new(),
            }
        }
    }
}

pub(crate) fn condition_data_json(condition: &Condition) -> String {
    serde_json::to_string(&condition.data()).unwrap_or_else(|_| "{}".to_string())
}

fn definition_from_row(row: &Row) -> Result<AchievementDefinition> {
    let kind: String = row.get(4)?;
    let data: String = row.get(5)?;
    let created_at: String = row.get(7)?;
    let shared_id: Option<i64> = row.get(8)?;
    let original_creator: Option<String> = row.get(9)?;

    let provenance = match (shared_id, original_creator) {
        (None, None) => None,
        (shared_id, creator) => Some(Provenance {
            shared_id,
            original_creator: creator.unwrap_or_default(),
        }),
    };

    Ok(AchievementDefinition {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        condition: condition_from_columns(&kind, &data),
        image: row.get(6)?,
        created_at: from_db_time(&created_at),
        provenance,
        completed_at: from_db_time_opt(row.get(10)?),
    })
}

pub fn insert_definition(
    conn: &Connection,
    user_id: i64,
    new: &NewDefinition,
    provenance: Option<&Provenance>,
    now: DateTime<Utc>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO achievement_definitions
            (user_id, name, description, condition_type, condition_data, image,
             created_at, imported_from_shared_id, original_creator)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            user_id,
            &new.name,
            &new.description,
            new.condition.kind_tag(),
            condition_data_json(&new.condition),
            &new.image,
            to_db_time(now),
            provenance.and_then(|p| p.shared_id),
            provenance.map(|p| p.original_creator.as_str()),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_definition(conn: &Connection, definition_id: i64) -> Result<Option<AchievementDefinition>> {
    conn.query_row(
        &format!("SELECT {} FROM achievement_definitions WHERE id = ?1", COLUMNS),
        [definition_id],
        definition_from_row,
    )
    .optional()
}

/// A user's definitions, newest first
pub fn list_for_user(conn: &Connection, user_id: i64) -> Result<Vec<AchievementDefinition>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM achievement_definitions WHERE user_id = ?1 ORDER BY created_at DESC, id DESC",
        COLUMNS
    ))?;
    let definitions = stmt
        .query_map([user_id], definition_from_row)?
        .collect::<Result<Vec<_>>>()?;
    Ok(definitions)
}

pub fn delete_definition(conn: &Connection, user_id: i64, definition_id: i64) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM achievement_definitions WHERE id = ?1 AND user_id = ?2",
        params![definition_id, user_id],
    )?;
    Ok(deleted > 0)
}

/// True when the user already owns a definition with this exact name
pub fn name_exists(conn: &Connection, user_id: i64, name: &str) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM achievement_definitions WHERE user_id = ?1 AND name = ?2)",
        params![user_id, name],
        |row| row.get(0),
    )
}

/// The user's copy of a shared definition, if they imported it
pub fn find_import(conn: &Connection, user_id: i64, shared_id: i64) -> Result<Option<i64>> {
    conn.query_row(
        "SELECT id FROM achievement_definitions
         WHERE user_id = ?1 AND imported_from_shared_id = ?2
         ORDER BY id LIMIT 1",
        params![user_id, shared_id],
        |row| row.get(0),
    )
    .optional()
}

/// Shared ids the user has imported, with the time of the first import
pub fn imported_shared_ids(conn: &Connection, user_id: i64) -> Result<HashMap<i64, DateTime<Utc>>> {
    let mut stmt = conn.prepare(
        "SELECT imported_from_shared_id, MIN(created_at) FROM achievement_definitions
         WHERE user_id = ?1 AND imported_from_shared_id IS NOT NULL
         GROUP BY imported_from_shared_id",
    )?;
    let imports = stmt
        .query_map([user_id], |row| {
            let created_at: String = row.get(1)?;
            Ok((row.get::<_, i64>(0)?, from_db_time(&created_at)))
        })?
        .collect::<Result<HashMap<_, _>>>()?;
    Ok(imports)
}

/// Stamp the first completion. Returns false when it was already stamped.
pub fn mark_completed(conn: &Connection, definition_id: i64, now: DateTime<Utc>) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE achievement_definitions SET completed_at = ?1 WHERE id = ?2 AND completed_at IS NULL",
        params![to_db_time(now), definition_id],
    )?;
    Ok(updated > 0)
}
