use crate::models::{ConversationSummary, DirectMessage, UserSummary};
use chrono::Utc;
use rusqlite::{params, Connection, Error as RusqliteError, OptionalExtension, Row};

fn map_summary(row: &Row) -> rusqlite::Result<UserSummary> {
    Ok(UserSummary { id: row.get(0)?, username: row.get(1)? })
}

fn map_message(row: &Row) -> rusqlite::Result<DirectMessage> {
    Ok(DirectMessage {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        sender_username: row.get(2)?,
        recipient_id: row.get(3)?,
        body: row.get(4)?,
        is_read: row.get(5)?,
        sent_at: row.get(6)?,
    })
}

const MESSAGE_SELECT: &str = "SELECT m.id, m.sender_id, u.username, m.recipient_id, m.body, m.is_read, m.sent_at
     FROM direct_messages m JOIN users u ON u.id = m.sender_id";

/// Active users other than `except_user_id`, by username.
pub fn list_user_summaries(conn: &Connection, except_user_id: Option<i64>) -> Result<Vec<UserSummary>, RusqliteError> {
    let mut stmt = conn.prepare(
        "SELECT id, username FROM users WHERE is_active = 1 AND id IS NOT ?1 ORDER BY username",
    )?;
    let rows = stmt.query_map([except_user_id], map_summary)?;
    rows.collect()
}

// ====================================================================
// ========================= USER FOLLOWERS ===========================
// ====================================================================

pub fn is_following_user(conn: &Connection, follower_id: i64, following_id: i64) -> Result<bool, RusqliteError> {
    let flag: Option<bool> = conn
        .query_row(
            "SELECT is_follow FROM user_followers WHERE follower_id = ?1 AND following_id = ?2",
            params![follower_id, following_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(flag.unwrap_or(false))
}

pub fn ensure_user_follow_row(conn: &Connection, follower_id: i64, following_id: i64) -> Result<(), RusqliteError> {
    conn.execute(
        "INSERT OR IGNORE INTO user_followers (follower_id, following_id, is_follow) VALUES (?1, ?2, 0)",
        params![follower_id, following_id],
    )?;
    Ok(())
}

pub fn set_user_follow_flag(
    conn: &Connection,
    follower_id: i64,
    following_id: i64,
    is_follow: bool,
) -> Result<usize, RusqliteError> {
    conn.execute(
        "UPDATE user_followers SET is_follow = ?1 WHERE follower_id = ?2 AND following_id = ?3",
        params![is_follow, follower_id, following_id],
    )
}

pub fn count_user_followers(conn: &Connection, user_id: i64) -> Result<i64, RusqliteError> {
    conn.query_row(
        "SELECT COUNT(*) FROM user_followers WHERE following_id = ?1 AND is_follow = 1",
        [user_id],
        |row| row.get(0),
    )
}

pub fn count_user_followings(conn: &Connection, user_id: i64) -> Result<i64, RusqliteError> {
    conn.query_row(
        "SELECT COUNT(*) FROM user_followers WHERE follower_id = ?1 AND is_follow = 1",
        [user_id],
        |row| row.get(0),
    )
}

/// Users who follow `user_id`.
pub fn list_user_followers(conn: &Connection, user_id: i64) -> Result<Vec<UserSummary>, RusqliteError> {
    let mut stmt = conn.prepare(
        "SELECT u.id, u.username FROM user_followers f JOIN users u ON u.id = f.follower_id
         WHERE f.following_id = ?1 AND f.is_follow = 1 ORDER BY u.username",
    )?;
    let rows = stmt.query_map([user_id], map_summary)?;
    rows.collect()
}

/// Users that `user_id` follows.
pub fn list_user_followings(conn: &Connection, user_id: i64) -> Result<Vec<UserSummary>, RusqliteError> {
    let mut stmt = conn.prepare(
        "SELECT u.id, u.username FROM user_followers f JOIN users u ON u.id = f.following_id
         WHERE f.follower_id = ?1 AND f.is_follow = 1 ORDER BY u.username",
    )?;
    let rows = stmt.query_map([user_id], map_summary)?;
    rows.collect()
}

// ====================================================================
// ========================= DIRECT MESSAGES ==========================
// ====================================================================

pub fn create_direct_message(
    conn: &Connection,
    sender_id: i64,
    recipient_id: i64,
    body: &str,
) -> Result<i64, RusqliteError> {
    conn.execute(
        "INSERT INTO direct_messages (sender_id, recipient_id, body, sent_at) VALUES (?1, ?2, ?3, ?4)",
        params![sender_id, recipient_id, body, Utc::now()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn read_direct_message(conn: &Connection, message_id: i64) -> Result<Option<DirectMessage>, RusqliteError> {
    conn.query_row(&format!("{} WHERE m.id = ?1", MESSAGE_SELECT), [message_id], map_message)
        .optional()
}

/// Both directions between the two users, oldest first.
pub fn list_conversation(conn: &Connection, user_id: i64, partner_id: i64) -> Result<Vec<DirectMessage>, RusqliteError> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE (m.sender_id = ?1 AND m.recipient_id = ?2) OR (m.sender_id = ?2 AND m.recipient_id = ?1)
         ORDER BY m.id",
        MESSAGE_SELECT
    ))?;
    let rows = stmt.query_map(params![user_id, partner_id], map_message)?;
    rows.collect()
}

/// Marks what `partner_id` sent to `user_id` as read.
pub fn mark_conversation_read(conn: &Connection, user_id: i64, partner_id: i64) -> Result<usize, RusqliteError> {
    conn.execute(
        "UPDATE direct_messages SET is_read = 1 WHERE recipient_id = ?1 AND sender_id = ?2 AND is_read = 0",
        params![user_id, partner_id],
    )
}

/// One entry per chat partner, most recent conversation first.
pub fn list_conversations(conn: &Connection, user_id: i64) -> Result<Vec<ConversationSummary>, RusqliteError> {
    let mut stmt = conn.prepare(
        "SELECT u.id, u.username, m.body, m.sent_at,
                (SELECT COUNT(*) FROM direct_messages x
                 WHERE x.sender_id = u.id AND x.recipient_id = ?1 AND x.is_read = 0)
         FROM direct_messages m
         JOIN users u ON u.id = CASE WHEN m.sender_id = ?1 THEN m.recipient_id ELSE m.sender_id END
         WHERE m.id IN (
             SELECT MAX(id) FROM direct_messages WHERE sender_id = ?1 OR recipient_id = ?1
             GROUP BY CASE WHEN sender_id = ?1 THEN recipient_id ELSE sender_id END
         )
         ORDER BY m.id DESC",
    )?;
    let rows = stmt.query_map([user_id], |row| {
        Ok(ConversationSummary {
            partner: UserSummary { id: row.get(0)?, username: row.get(1)? },
            last_message: row.get(2)?,
            last_sent_at: row.get(3)?,
            unread_count: row.get(4)?,
        })
    })?;
    rows.collect()
}
