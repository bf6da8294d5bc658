use crate::models::User;
use bcrypt::{hash, verify, BcryptError};
use chrono::Utc;
use rusqlite::{params, Connection, Error as RusqliteError, OptionalExtension, Row};

const USER_COLUMNS: &str = "id, username, email, is_active, created_at, last_login_time";

fn bcrypt_to_rusqlite_error(e: BcryptError) -> RusqliteError {
    RusqliteError::ToSqlConversionFailure(Box::new(e))
}

fn map_user(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        is_active: row.get(3)?,
        created_at: row.get(4)?,
        last_login_time: row.get(5)?,
    })
}

pub fn create_user(
    conn: &Connection,
    username: &str,
    email: &str,
    password: &str,
) -> Result<i64, RusqliteError> {
    let hashed_password = hash(password, bcrypt::DEFAULT_COST).map_err(bcrypt_to_rusqlite_error)?;
    conn.execute(
        "INSERT INTO users (username, email, password_hash, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![username, email, hashed_password, Utc::now()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn read_all_users(conn: &Connection) -> Result<Vec<User>, RusqliteError> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS))?;
    let users = stmt.query_map([], map_user)?.collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

pub fn read_user_by_id(conn: &Connection, user_id: i64) -> Result<Option<User>, RusqliteError> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
        [user_id],
        map_user,
    )
    .optional()
}

pub fn read_user_by_username(conn: &Connection, username: &str) -> Result<Option<User>, RusqliteError> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS),
        [username],
        map_user,
    )
    .optional()
}

/// Returns the user when the password matches and the account is active.
pub fn verify_credentials(conn: &Connection, username: &str, password: &str) -> Option<User> {
    let res: rusqlite::Result<(String, bool)> = conn.query_row(
        "SELECT password_hash, is_active FROM users WHERE username = ?1",
        [username],
        |row| Ok((row.get(0)?, row.get(1)?)),
    );

    if let Ok((hash, is_active)) = res {
        if is_active && verify(password, &hash).unwrap_or(false) {
            return read_user_by_username(conn, username).ok().flatten();
        }
    }
    None
}

pub fn update_last_login_time(conn: &Connection, user_id: i64) -> Result<(), RusqliteError> {
    let now = Utc::now().to_rfc3339();
    conn.execute("UPDATE users SET last_login_time = ?1 WHERE id = ?2", params![now, user_id])?;
    Ok(())
}

pub fn set_user_active(conn: &Connection, user_id: i64, is_active: bool) -> Result<usize, RusqliteError> {
    conn.execute("UPDATE users SET is_active = ?1 WHERE id = ?2", params![is_active, user_id])
}
