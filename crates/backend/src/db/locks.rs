//! Per-user advisory sync locks

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, Result};

use super::to_db_time;

/// Take the user's sync lock. An existing lock older than `ttl` is treated as
/// abandoned and taken over; a fresh one makes this return false.
pub fn try_acquire_sync_lock(conn: &Connection, user_id: i64, now: DateTime<Utc>, ttl: Duration) -> Result<bool> {
    let stale_before = to_db_time(now - ttl);
    let changed = conn.execute(
        "INSERT INTO sync_locks (user_id, acquired_at) VALUES (?1, ?2)
         ON CONFLICT(user_id) DO UPDATE SET acquired_at = excluded.acquired_at
         WHERE sync_locks.acquired_at < ?3",
        params![user_id, to_db_time(now), stale_before],
    )?;
    Ok(changed > 0)
}

pub fn release_sync_lock(conn: &Connection, user_id: i64) -> Result<()> {
    conn.execute("DELETE FROM sync_locks WHERE user_id = ?1", [user_id])?;
    Ok(())
}
