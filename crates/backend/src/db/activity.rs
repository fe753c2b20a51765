use chrono::{DateTime, Utc};
use meta_achiever_core::{ActivityEntry, ActivityKind, NewActivity};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Result};

use super::{from_db_time, to_db_time};

/// Filters for reading the feed
#[derive(Debug, Clone, Default)]
pub struct FeedFilter {
    pub user_id: Option<i64>,
    pub kind: Option<ActivityKind>,
    pub include_private: bool,
}

pub fn log_activity(conn: &Connection, activity: &NewActivity, now: DateTime<Utc>) -> Result<i64> {
    conn.execute(
        "INSERT INTO activity_feed
            (user_id, activity_type, title, description, definition_id,
             shared_definition_id, collection_id, metadata, is_public, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            activity.user_id,
            activity.kind.as_str(),
            &activity.title,
            &activity.description,
            activity.definition_id,
            activity.shared_definition_id,
            activity.collection_id,
            activity.metadata.to_string(),
            activity.is_public,
            to_db_time(now),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Most recent entries first. Rows with a kind this build does not know are skipped.
pub fn recent_activities(conn: &Connection, limit: usize, filter: &FeedFilter) -> Result<Vec<ActivityEntry>> {
    let mut sql = String::from(
        "SELECT a.id, a.user_id, u.username, a.activity_type, a.title, a.description,
                a.definition_id, a.shared_definition_id, a.collection_id, a.metadata,
                a.is_public, a.created_at
         FROM activity_feed a
         JOIN users u ON u.id = a.user_id
         WHERE 1 = 1",
    );
    let mut args: Vec<Value> = Vec::new();

    if !filter.include_private {
        sql.push_str(" AND a.is_public = 1");
    }
    if let Some(user_id) = filter.user_id {
        args.push(Value::Integer(user_id));
        sql.push_str(&format!(" AND a.user_id = ?{}", args.len()));
    }
    if let Some(kind) = filter.kind {
        args.push(Value::Text(kind.as_str().to_string()));
        sql.push_str(&format!(" AND a.activity_type = ?{}", args.len()));
    }
    args.push(Value::Integer(limit as i64));
    sql.push_str(&format!(" ORDER BY a.created_at DESC, a.id DESC LIMIT ?{}", args.len()));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(args), |row| {
            let kind: String = row.get(3)?;
            let metadata: String = row.get(9)?;
            let created_at: String = row.get(11)?;
            let Some(kind) = ActivityKind::parse(&kind) else {
                return Ok(None);
            };
            Ok(Some(ActivityEntry {
                id: row.get(0)?,
                user_id: row.get(1)?,
                username: row.get(2)?,
                kind,
                title: row.get(4)?,
                description: row.get(5)?,
                definition_id: row.get(6)?,
                shared_definition_id: row.get(7)?,
                collection_id: row.get(8)?,
                metadata: serde_json::from_str(&metadata).unwrap_or_default(),
                is_public: row.get(10)?,
                created_at: from_db_time(&created_at),
            }))
        })?
        .collect::<Result<Vec<_>>>()?;

    Ok(rows.into_iter().flatten().collect())
}
