//! Collections, their items and cached per-user progress

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use meta_achiever_core::{
    Collection, CollectionItem, CollectionProgress, ItemProgress, NewCollection, ProgressStatus,
};
use rusqlite::{params, Connection, OptionalExtension, Result, Row};

use super::{from_db_time, from_db_time_opt, to_db_time};

const COLLECTION_COLUMNS: &str = "id, name, description, collection_type, difficulty, is_active,
    is_featured, start_date, end_date, participants_count, completions_count, created_by, created_at";

fn collection_from_row(row: &Row) -> Result<Collection> {
    let created_at: String = row.get(12)?;
    Ok(Collection {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        collection_type: row.get(3)?,
        difficulty: row.get(4)?,
        is_active: row.get(5)?,
        is_featured: row.get(6)?,
        start_date: from_db_time_opt(row.get(7)?),
        end_date: from_db_time_opt(row.get(8)?),
        participants_count: row.get(9)?,
        completions_count: row.get(10)?,
        created_by: row.get(11)?,
        created_at: from_db_time(&created_at),
    })
}

pub fn insert_collection(conn: &Connection, new: &NewCollection, now: DateTime<Utc>) -> Result<i64> {
    conn.execute(
        "INSERT INTO collections
            (name, description, collection_type, difficulty, is_active, is_featured,
             start_date, end_date, created_by, created_at)
         VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6, ?7, ?8, ?9)",
        params![
            &new.name,
            &new.description,
            &new.collection_type,
            &new.difficulty,
            new.is_featured,
            new.start_date.map(to_db_time),
            new.end_date.map(to_db_time),
            new.created_by,
            to_db_time(now),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_collection(conn: &Connection, collection_id: i64) -> Result<Option<Collection>> {
    conn.query_row(
        &format!("SELECT {} FROM collections WHERE id = ?1", COLLECTION_COLUMNS),
        [collection_id],
        collection_from_row,
    )
    .optional()
}

/// Featured collections first, then newest
pub fn list_collections(conn: &Connection) -> Result<Vec<Collection>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM collections ORDER BY is_featured DESC, created_at DESC, id DESC",
        COLLECTION_COLUMNS
    ))?;
    let rows = stmt.query_map([], collection_from_row)?.collect::<Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn set_active(conn: &Connection, collection_id: i64, active: bool) -> Result<usize> {
    conn.execute(
        "UPDATE collections SET is_active = ?1 WHERE id = ?2",
        params![active, collection_id],
    )
}

pub fn increment_participants(conn: &Connection, collection_id: i64) -> Result<usize> {
    conn.execute(
        "UPDATE collections SET participants_count = participants_count + 1 WHERE id = ?1",
        [collection_id],
    )
}

pub fn increment_completions(conn: &Connection, collection_id: i64) -> Result<usize> {
    conn.execute(
        "UPDATE collections SET completions_count = completions_count + 1 WHERE id = ?1",
        [collection_id],
    )
}

/// Fails with a constraint violation when the pair already exists
pub fn insert_item(
    conn: &Connection,
    collection_id: i64,
    shared_definition_id: i64,
    order_index: i32,
    is_required: bool,
    point_value: i64,
    now: DateTime<Utc>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO collection_items
            (collection_id, shared_definition_id, order_index, is_required, point_value, added_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            collection_id,
            shared_definition_id,
            order_index,
            is_required,
            point_value,
            to_db_time(now),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn items_for(conn: &Connection, collection_id: i64) -> Result<Vec<CollectionItem>> {
    let mut stmt = conn.prepare(
        "SELECT id, collection_id, shared_definition_id, order_index, is_required, point_value
         FROM collection_items
         WHERE collection_id = ?1
         ORDER BY order_index, id",
    )?;
    let items = stmt
        .query_map([collection_id], |row| {
            Ok(CollectionItem {
                id: row.get(0)?,
                collection_id: row.get(1)?,
                shared_definition_id: row.get(2)?,
                order_index: row.get(3)?,
                is_required: row.get(4)?,
                point_value: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>>>()?;
    Ok(items)
}

pub fn get_progress(conn: &Connection, user_id: i64, collection_id: i64) -> Result<Option<CollectionProgress>> {
    conn.query_row(
        "SELECT user_id, collection_id, achievements_completed, total_achievements,
                points_earned, total_points, status, started_at, completed_at,
                last_activity, progress_data
         FROM collection_progress
         WHERE user_id = ?1 AND collection_id = ?2",
        params![user_id, collection_id],
        |row| {
            let status: String = row.get(6)?;
            let started_at: String = row.get(7)?;
            let last_activity: String = row.get(9)?;
            let progress_data: String = row.get(10)?;
            let items: BTreeMap<i64, ItemProgress> =
                serde_json::from_str(&progress_data).unwrap_or_default();
            Ok(CollectionProgress {
                user_id: row.get(0)?,
                collection_id: row.get(1)?,
                achievements_completed: row.get(2)?,
                total_achievements: row.get(3)?,
                points_earned: row.get(4)?,
                total_points: row.get(5)?,
                status: ProgressStatus::parse(&status),
                started_at: from_db_time(&started_at),
                completed_at: from_db_time_opt(row.get(8)?),
                last_activity: from_db_time(&last_activity),
                items,
            })
        },
    )
    .optional()
}

pub fn save_progress(conn: &Connection, progress: &CollectionProgress) -> Result<()> {
    let progress_data = serde_json::to_string(&progress.items).unwrap_or_else(|_| "{}".to_string());
    conn.execute(
        "INSERT INTO collection_progress
            (user_id, collection_id, achievements_completed, total_achievements, points_earned,
             total_points, status, started_at, completed_at, last_activity, progress_data)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT(user_id, collection_id) DO UPDATE SET
            achievements_completed = excluded.achievements_completed,
            total_achievements = excluded.total_achievements,
            points_earned = excluded.points_earned,
            total_points = excluded.total_points,
            status = excluded.status,
            started_at = excluded.started_at,
            completed_at = excluded.completed_at,
            last_activity = excluded.last_activity,
            progress_data = excluded.progress_data",
        params![
            progress.user_id,
            progress.collection_id,
            progress.achievements_completed,
            progress.total_achievements,
            progress.points_earned,
            progress.total_points,
            progress.status.as_str(),
            to_db_time(progress.started_at),
            progress.completed_at.map(to_db_time),
            to_db_time(progress.last_activity),
            progress_data,
        ],
    )?;
    Ok(())
}

/// Collections in which the user has a progress row
pub fn joined_collection_ids(conn: &Connection, user_id: i64) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT collection_id FROM collection_progress WHERE user_id = ?1 ORDER BY collection_id",
    )?;
    let ids = stmt
        .query_map([user_id], |row| row.get(0))?
        .collect::<Result<Vec<i64>>>()?;
    Ok(ids)
}
