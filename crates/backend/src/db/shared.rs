//! Community snapshots of achievement definitions

use chrono::{DateTime, Utc};
use meta_achiever_core::{AchievementDefinition, SharedDefinition};
use rusqlite::{params, Connection, OptionalExtension, Result, Row};

use super::definitions::{condition_data_json, condition_from_columns};
use super::{from_db_time, to_db_time};

const SELECT_SHARED: &str = "SELECT s.id, s.creator_id, u.username, s.original_definition_id, s.name,
            s.description, s.condition_type, s.condition_data, s.image,
            s.tries_count, s.completions_count, s.is_active, s.shared_at
     FROM shared_definitions s
     JOIN users u ON u.id = s.creator_id";

fn shared_from_row(row: &Row) -> Result<SharedDefinition> {
    let kind: String = row.get(6)?;
    let data: String = row.get(7)?;
    let shared_at: String = row.get(12)?;
    Ok(SharedDefinition {
        id: row.get(0)?,
        creator_id: row.get(1)?,
        creator_name: row.get(2)?,
        original_definition_id: row.get(3)?,
        name: row.get(4)?,
        description: row.get(5)?,
        condition: condition_from_columns(&kind, &data),
        image: row.get(8)?,
        tries_count: row.get(9)?,
        completions_count: row.get(10)?,
        is_active: row.get(11)?,
        shared_at: from_db_time(&shared_at),
    })
}

/// Snapshot a definition into a new active shared row with zero counters
pub fn insert_shared(conn: &Connection, definition: &AchievementDefinition, now: DateTime<Utc>) -> Result<i64> {
    conn.execute(
        "INSERT INTO shared_definitions
            (creator_id, original_definition_id, name, description, condition_type,
             condition_data, image, tries_count, completions_count, is_active, shared_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, 0, 1, ?8)",
        params![
            definition.user_id,
            definition.id,
            &definition.name,
            &definition.description,
            definition.condition.kind_tag(),
            condition_data_json(&definition.condition),
            &definition.image,
            to_db_time(now),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_shared(conn: &Connection, shared_id: i64) -> Result<Option<SharedDefinition>> {
    conn.query_row(&format!("{} WHERE s.id = ?1", SELECT_SHARED), [shared_id], shared_from_row)
        .optional()
}

pub fn find_active_by_name(conn: &Connection, creator_id: i64, name: &str) -> Result<Option<i64>> {
    conn.query_row(
        "SELECT id FROM shared_definitions
         WHERE creator_id = ?1 AND name = ?2 AND is_active = 1
         ORDER BY shared_at DESC, id DESC LIMIT 1",
        params![creator_id, name],
        |row| row.get(0),
    )
    .optional()
}

/// The creator's active shared copy of one of their definitions
pub fn find_by_original(conn: &Connection, creator_id: i64, definition_id: i64) -> Result<Option<i64>> {
    conn.query_row(
        "SELECT id FROM shared_definitions
         WHERE creator_id = ?1 AND original_definition_id = ?2 AND is_active = 1
         ORDER BY shared_at DESC, id DESC LIMIT 1",
        params![creator_id, definition_id],
        |row| row.get(0),
    )
    .optional()
}

pub fn delete_shared(conn: &Connection, shared_id: i64) -> Result<usize> {
    conn.execute("DELETE FROM shared_definitions WHERE id = ?1", [shared_id])
}

pub fn increment_tries(conn: &Connection, shared_id: i64) -> Result<usize> {
    conn.execute(
        "UPDATE shared_definitions SET tries_count = tries_count + 1 WHERE id = ?1",
        [shared_id],
    )
}

pub fn increment_completions(conn: &Connection, shared_id: i64) -> Result<usize> {
    conn.execute(
        "UPDATE shared_definitions SET completions_count = completions_count + 1 WHERE id = ?1",
        [shared_id],
    )
}

/// Every shared row regardless of state, oldest first
pub fn list_all(conn: &Connection) -> Result<Vec<SharedDefinition>> {
    let mut stmt = conn.prepare(&format!("{} ORDER BY s.shared_at, s.id", SELECT_SHARED))?;
    let rows = stmt.query_map([], shared_from_row)?.collect::<Result<Vec<_>>>()?;
    Ok(rows)
}

/// Active shared rows created by anyone but the viewer
pub fn list_active_excluding(conn: &Connection, viewer_id: i64) -> Result<Vec<SharedDefinition>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE s.is_active = 1 AND s.creator_id != ?1 ORDER BY s.shared_at DESC, s.id DESC",
        SELECT_SHARED
    ))?;
    let rows = stmt
        .query_map([viewer_id], shared_from_row)?
        .collect::<Result<Vec<_>>>()?;
    Ok(rows)
}

/// Names of collections with an item pointing at this shared row
pub fn referencing_collection_names(conn: &Connection, shared_id: i64) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT c.name FROM collection_items i
         JOIN collections c ON c.id = i.collection_id
         WHERE i.shared_definition_id = ?1
         ORDER BY c.name",
    )?;
    let names = stmt
        .query_map([shared_id], |row| row.get(0))?
        .collect::<Result<Vec<String>>>()?;
    Ok(names)
}

/// Move collection items and import provenance from `duplicate` to `keep`.
/// Items that would collide with an existing item for `keep` are dropped.
pub fn repoint_references(conn: &Connection, duplicate: i64, keep: i64) -> Result<()> {
    conn.execute(
        "UPDATE OR IGNORE collection_items SET shared_definition_id = ?2 WHERE shared_definition_id = ?1",
        params![duplicate, keep],
    )?;
    conn.execute(
        "DELETE FROM collection_items WHERE shared_definition_id = ?1",
        [duplicate],
    )?;
    conn.execute(
        "UPDATE achievement_definitions SET imported_from_shared_id = ?2 WHERE imported_from_shared_id = ?1",
        params![duplicate, keep],
    )?;
    conn.execute(
        "UPDATE activity_feed SET shared_definition_id = ?2 WHERE shared_definition_id = ?1",
        params![duplicate, keep],
    )?;
    Ok(())
}
