use chrono::Utc;
use meta_achiever_core::User;
use rusqlite::{params, Connection, OptionalExtension, Result, Row};

use super::{from_db_time, to_db_time};

fn user_from_row(row: &Row) -> Result<User> {
    let created_at: String = row.get(4)?;
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        steam_id: row.get(2)?,
        steam_api_key: row.get(3)?,
        created_at: from_db_time(&created_at),
    })
}

/// Insert a user, returning its id
pub fn create_user(
    conn: &Connection,
    username: &str,
    steam_id: Option<&str>,
    steam_api_key: Option<&str>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO users (username, steam_id, steam_api_key, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![username, steam_id, steam_api_key, to_db_time(Utc::now())],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Link or replace the Steam account of an existing user. `None` leaves
/// the stored value untouched.
pub fn update_steam_credentials(
    conn: &Connection,
    user_id: i64,
    steam_id: Option<&str>,
    steam_api_key: Option<&str>,
) -> Result<usize> {
    conn.execute(
        "UPDATE users SET steam_id = COALESCE(?1, steam_id), steam_api_key = COALESCE(?2, steam_api_key)
         WHERE id = ?3",
        params![steam_id, steam_api_key, user_id],
    )
}

/// Create the user, or update the given credentials of an existing one
pub fn save_user(
    conn: &Connection,
    username: &str,
    steam_id: Option<&str>,
    steam_api_key: Option<&str>,
) -> Result<i64> {
    match get_user_by_name(conn, username)? {
        Some(user) => {
            update_steam_credentials(conn, user.id, steam_id, steam_api_key)?;
            Ok(user.id)
        }
        None => create_user(conn, username, steam_id, steam_api_key),
    }
}

pub fn get_user(conn: &Connection, user_id: i64) -> Result<Option<User>> {
    conn.query_row(
        "SELECT id, username, steam_id, steam_api_key, created_at FROM users WHERE id = ?1",
        [user_id],
        user_from_row,
    )
    .optional()
}

pub fn get_user_by_name(conn: &Connection, username: &str) -> Result<Option<User>> {
    conn.query_row(
        "SELECT id, username, steam_id, steam_api_key, created_at FROM users WHERE username = ?1",
        [username],
        user_from_row,
    )
    .optional()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;

    #[test]
    fn saving_again_keeps_credentials_that_were_not_given() {
        let conn = open_in_memory().unwrap();
        let id = save_user(&conn, "ada", Some("7656"), Some("KEY")).unwrap();

        assert_eq!(save_user(&conn, "ada", Some("9999"), None).unwrap(), id);
        let user = get_user(&conn, id).unwrap().unwrap();
        assert_eq!(user.steam_id.as_deref(), Some("9999"));
        assert_eq!(user.steam_api_key.as_deref(), Some("KEY"));

        save_user(&conn, "ada", None, Some("NEWKEY")).unwrap();
        let user = get_user_by_name(&conn, "ada").unwrap().unwrap();
        assert_eq!(user.steam_id.as_deref(), Some("9999"));
        assert_eq!(user.steam_api_key.as_deref(), Some("NEWKEY"));
    }
}
