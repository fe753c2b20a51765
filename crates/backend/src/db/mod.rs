//! Database module - SQLite storage for the backend
//!
//! Submodules:
//! - users: Linked accounts and their Steam credentials
//! - games: Game catalog, library entries and achievement unlocks
//! - definitions: User-authored achievement definitions
//! - shared: Community snapshots of definitions
//! - collections: Collections, their items and per-user progress
//! - activity: Activity feed entries
//! - locks: Per-user sync locks

pub mod users;
pub mod games;
pub mod definitions;
pub mod shared;
pub mod collections;
pub mod activity;
pub mod locks;

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, Result};

/// Open a database file and initialize tables
pub fn open_connection(path: impl AsRef<Path>) -> Result<Connection> {
    let conn = Connection::open(path)?;
    configure(&conn)?;
    Ok(conn)
}

/// Open a private in-memory database, used by tests and dry runs
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;
    Ok(conn)
}

fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    init_tables(conn)
}

/// Timestamps are stored as fixed-width RFC 3339 so they sort as text
pub(crate) fn to_db_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn from_db_time(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

pub(crate) fn from_db_time_opt(value: Option<String>) -> Option<DateTime<Utc>> {
    value.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}

fn init_tables(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            steam_id TEXT,
            steam_api_key TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // Game catalog, one row per Steam app
    conn.execute(
        "CREATE TABLE IF NOT EXISTS games (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            app_id TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            last_updated TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS library_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            game_id INTEGER NOT NULL REFERENCES games(id),
            playtime_minutes INTEGER NOT NULL DEFAULT 0,
            achievements_total INTEGER NOT NULL DEFAULT 0,
            achievements_unlocked INTEGER NOT NULL DEFAULT 0,
            last_synced TEXT NOT NULL,
            UNIQUE (user_id, game_id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS achievement_unlocks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            game_id INTEGER NOT NULL REFERENCES games(id),
            apiname TEXT NOT NULL,
            display_name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            achieved INTEGER NOT NULL DEFAULT 0,
            unlock_time TEXT,
            UNIQUE (user_id, game_id, apiname)
        )",
        [],
    )?;

    // Provenance columns are nullable foreign keys; the two definition
    // tables reference each other.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS achievement_definitions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            description TEXT NOT NULL,
            condition_type TEXT NOT NULL,
            condition_data TEXT NOT NULL,
            image TEXT,
            created_at TEXT NOT NULL,
            imported_from_shared_id INTEGER REFERENCES shared_definitions(id) ON DELETE SET NULL,
            original_creator TEXT,
            completed_at TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS shared_definitions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            creator_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            original_definition_id INTEGER REFERENCES achievement_definitions(id) ON DELETE SET NULL,
            name TEXT NOT NULL,
            description TEXT NOT NULL,
            condition_type TEXT NOT NULL,
            condition_data TEXT NOT NULL,
            image TEXT,
            tries_count INTEGER NOT NULL DEFAULT 0,
            completions_count INTEGER NOT NULL DEFAULT 0,
            is_active INTEGER NOT NULL DEFAULT 1,
            shared_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS collections (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT NOT NULL,
            collection_type TEXT NOT NULL DEFAULT 'seasonal',
            difficulty TEXT NOT NULL DEFAULT 'medium',
            is_active INTEGER NOT NULL DEFAULT 1,
            is_featured INTEGER NOT NULL DEFAULT 0,
            start_date TEXT,
            end_date TEXT,
            participants_count INTEGER NOT NULL DEFAULT 0,
            completions_count INTEGER NOT NULL DEFAULT 0,
            created_by INTEGER NOT NULL REFERENCES users(id),
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS collection_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            collection_id INTEGER NOT NULL REFERENCES collections(id) ON DELETE CASCADE,
            shared_definition_id INTEGER NOT NULL REFERENCES shared_definitions(id),
            order_index INTEGER NOT NULL DEFAULT 0,
            is_required INTEGER NOT NULL DEFAULT 1,
            point_value INTEGER NOT NULL DEFAULT 10,
            added_at TEXT NOT NULL,
            UNIQUE (collection_id, shared_definition_id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS collection_progress (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            collection_id INTEGER NOT NULL REFERENCES collections(id) ON DELETE CASCADE,
            achievements_completed INTEGER NOT NULL DEFAULT 0,
            total_achievements INTEGER NOT NULL DEFAULT 0,
            points_earned INTEGER NOT NULL DEFAULT 0,
            total_points INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'not-started',
            started_at TEXT NOT NULL,
            completed_at TEXT,
            last_activity TEXT NOT NULL,
            progress_data TEXT NOT NULL DEFAULT '{}',
            UNIQUE (user_id, collection_id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS activity_feed (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            activity_type TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT,
            definition_id INTEGER REFERENCES achievement_definitions(id) ON DELETE SET NULL,
            shared_definition_id INTEGER REFERENCES shared_definitions(id) ON DELETE SET NULL,
            collection_id INTEGER REFERENCES collections(id) ON DELETE SET NULL,
            metadata TEXT NOT NULL DEFAULT '{}',
            is_public INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS sync_locks (
            user_id INTEGER PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
            acquired_at TEXT NOT NULL
        )",
        [],
    )?;

    // Indexes for common queries
    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_library_user ON library_entries(user_id);
         CREATE INDEX IF NOT EXISTS idx_definitions_user ON achievement_definitions(user_id);
         CREATE INDEX IF NOT EXISTS idx_definitions_import ON achievement_definitions(user_id, imported_from_shared_id);
         CREATE INDEX IF NOT EXISTS idx_shared_creator_name ON shared_definitions(creator_id, name);
         CREATE INDEX IF NOT EXISTS idx_collection_order ON collection_items(collection_id, order_index);
         CREATE INDEX IF NOT EXISTS idx_activity_public_recent ON activity_feed(is_public, created_at);
         CREATE INDEX IF NOT EXISTS idx_activity_user_recent ON activity_feed(user_id, created_at);",
    )?;

    Ok(())
}
