//! Game catalog, library entries and achievement unlocks

use chrono::{DateTime, Utc};
use meta_achiever_core::{AchievementUnlock, Game, LibraryEntry, LibrarySnapshot};
use rusqlite::{params, Connection, OptionalExtension, Result};

use super::{from_db_time, from_db_time_opt, to_db_time};

/// Find a game by Steam app id, inserting it or refreshing its name.
/// The latest name seen wins.
pub fn resolve_game(conn: &Connection, app_id: &str, name: &str, now: DateTime<Utc>) -> Result<i64> {
    let existing: Option<(i64, String)> = conn
        .query_row(
            "SELECT id, name FROM games WHERE app_id = ?1",
            [app_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    match existing {
        Some((id, current)) if current == name => Ok(id),
        Some((id, _)) => {
            conn.execute(
                "UPDATE games SET name = ?1, last_updated = ?2 WHERE id = ?3",
                params![name, to_db_time(now), id],
            )?;
            Ok(id)
        }
        None => {
            conn.execute(
                "INSERT INTO games (app_id, name, last_updated) VALUES (?1, ?2, ?3)",
                params![app_id, name, to_db_time(now)],
            )?;
            Ok(conn.last_insert_rowid())
        }
    }
}

pub fn get_game(conn: &Connection, app_id: &str) -> Result<Option<Game>> {
    conn.query_row(
        "SELECT id, app_id, name, last_updated FROM games WHERE app_id = ?1",
        [app_id],
        |row| {
            let last_updated: String = row.get(3)?;
            Ok(Game {
                id: row.get(0)?,
                app_id: row.get(1)?,
                name: row.get(2)?,
                last_updated: from_db_time(&last_updated),
            })
        },
    )
    .optional()
}

/// Display names for a list of app ids, in order; unknown ids render as `App <id>`
pub fn game_names(conn: &Connection, app_ids: &[String]) -> Result<Vec<String>> {
    let mut stmt = conn.prepare_cached("SELECT name FROM games WHERE app_id = ?1")?;
    let mut names = Vec::with_capacity(app_ids.len());
    for app_id in app_ids {
        let name: Option<String> = stmt.query_row([app_id], |row| row.get(0)).optional()?;
        names.push(name.unwrap_or_else(|| format!("App {}", app_id)));
    }
    Ok(names)
}

/// Overwrite (never accumulate) a user's library row for one game
pub fn upsert_library_entry(
    conn: &Connection,
    user_id: i64,
    game_id: i64,
    playtime_minutes: u32,
    achievements_total: u32,
    achievements_unlocked: u32,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO library_entries
            (user_id, game_id, playtime_minutes, achievements_total, achievements_unlocked, last_synced)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(user_id, game_id) DO UPDATE SET
            playtime_minutes = excluded.playtime_minutes,
            achievements_total = excluded.achievements_total,
            achievements_unlocked = excluded.achievements_unlocked,
            last_synced = excluded.last_synced",
        params![
            user_id,
            game_id,
            playtime_minutes,
            achievements_total,
            achievements_unlocked,
            to_db_time(now),
        ],
    )?;
    Ok(())
}

pub fn get_library(conn: &Connection, user_id: i64) -> Result<Vec<LibraryEntry>> {
    let mut stmt = conn.prepare(
        "SELECT g.app_id, g.name, l.playtime_minutes, l.achievements_total,
                l.achievements_unlocked, l.last_synced
         FROM library_entries l
         JOIN games g ON g.id = l.game_id
         WHERE l.user_id = ?1
         ORDER BY g.name",
    )?;

    let entries = stmt
        .query_map([user_id], |row| {
            let last_synced: String = row.get(5)?;
            Ok(LibraryEntry {
                app_id: row.get(0)?,
                game_name: row.get(1)?,
                playtime_minutes: row.get(2)?,
                achievements_total: row.get(3)?,
                achievements_unlocked: row.get(4)?,
                last_synced: from_db_time(&last_synced),
            })
        })?
        .collect::<Result<Vec<_>>>()?;

    Ok(entries)
}

/// The evaluator's view of a user's library
pub fn get_library_snapshot(conn: &Connection, user_id: i64) -> Result<LibrarySnapshot> {
    Ok(get_library(conn, user_id)?
        .into_iter()
        .map(|entry| {
            let owned = entry.owned_game();
            (entry.app_id, owned)
        })
        .collect())
}

pub fn upsert_unlock(
    conn: &Connection,
    user_id: i64,
    game_id: i64,
    unlock: &AchievementUnlock,
) -> Result<()> {
    conn.execute(
        "INSERT INTO achievement_unlocks
            (user_id, game_id, apiname, display_name, description, achieved, unlock_time)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(user_id, game_id, apiname) DO UPDATE SET
            display_name = excluded.display_name,
            description = excluded.description,
            achieved = excluded.achieved,
            unlock_time = excluded.unlock_time",
        params![
            user_id,
            game_id,
            &unlock.apiname,
            &unlock.display_name,
            &unlock.description,
            unlock.achieved,
            unlock.unlock_time.map(to_db_time),
        ],
    )?;
    Ok(())
}

pub fn get_unlocks(conn: &Connection, user_id: i64, app_id: &str) -> Result<Vec<AchievementUnlock>> {
    let mut stmt = conn.prepare(
        "SELECT u.apiname, u.display_name, u.description, u.achieved, u.unlock_time
         FROM achievement_unlocks u
         JOIN games g ON g.id = u.game_id
         WHERE u.user_id = ?1 AND g.app_id = ?2
         ORDER BY u.apiname",
    )?;

    let unlocks = stmt
        .query_map(params![user_id, app_id], |row| {
            Ok(AchievementUnlock {
                apiname: row.get(0)?,
                display_name: row.get(1)?,
                description: row.get(2)?,
                achieved: row.get(3)?,
                unlock_time: from_db_time_opt(row.get(4)?),
            })
        })?
        .collect::<Result<Vec<_>>>()?;

    Ok(unlocks)
}
