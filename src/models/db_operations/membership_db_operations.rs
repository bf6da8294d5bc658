use crate::models::{BlackListEntry, CommunityFollower, FollowRequest};
use chrono::Utc;
use rusqlite::{params, Connection, Error as RusqliteError, OptionalExtension, Row};

fn map_follow_request(row: &Row) -> rusqlite::Result<FollowRequest> {
    Ok(FollowRequest {
        id: row.get(0)?,
        user_id: row.get(1)?,
        username: row.get(2)?,
        community_id: row.get(3)?,
        send_status: row.get(4)?,
        accepted: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn map_ban(row: &Row) -> rusqlite::Result<BlackListEntry> {
    Ok(BlackListEntry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        username: row.get(2)?,
        community_id: row.get(3)?,
        reason: row.get(4)?,
        banned_at: row.get(5)?,
    })
}

const REQUEST_SELECT: &str =
    "SELECT r.id, r.user_id, u.username, r.community_id, r.send_status, r.accepted, r.created_at
     FROM community_follow_requests r JOIN users u ON u.id = r.user_id";

const BAN_SELECT: &str = "SELECT b.id, b.user_id, u.username, b.community_id, b.reason, b.banned_at
     FROM black_list b JOIN users u ON u.id = b.user_id";

// ====================================================================
// ========================== FOLLOWERS ===============================
// ====================================================================

/// Follow flag for the pair; a missing row reads as not following.
pub fn is_following(conn: &Connection, user_id: i64, community_id: i64) -> Result<bool, RusqliteError> {
    let flag: Option<bool> = conn
        .query_row(
            "SELECT is_follow FROM community_followers WHERE user_id = ?1 AND community_id = ?2",
            params![user_id, community_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(flag.unwrap_or(false))
}

pub fn ensure_follower_row(conn: &Connection, user_id: i64, community_id: i64) -> Result<(), RusqliteError> {
    conn.execute(
        "INSERT OR IGNORE INTO community_followers (user_id, community_id, is_follow) VALUES (?1, ?2, 0)",
        params![user_id, community_id],
    )?;
    Ok(())
}

pub fn set_follow_flag(
    conn: &Connection,
    user_id: i64,
    community_id: i64,
    is_follow: bool,
) -> Result<usize, RusqliteError> {
    conn.execute(
        "UPDATE community_followers SET is_follow = ?1 WHERE user_id = ?2 AND community_id = ?3",
        params![is_follow, user_id, community_id],
    )
}

pub fn count_followers(conn: &Connection, community_id: i64) -> Result<i64, RusqliteError> {
    conn.query_row(
        "SELECT COUNT(*) FROM community_followers WHERE community_id = ?1 AND is_follow = 1",
        [community_id],
        |row| row.get(0),
    )
}

pub fn list_followers(conn: &Connection, community_id: i64) -> Result<Vec<CommunityFollower>, RusqliteError> {
    let mut stmt = conn.prepare(
        "SELECT f.user_id, u.username, f.community_id, f.is_follow
         FROM community_followers f JOIN users u ON u.id = f.user_id
         WHERE f.community_id = ?1 AND f.is_follow = 1 ORDER BY u.username",
    )?;
    let rows = stmt.query_map([community_id], |row| {
        Ok(CommunityFollower {
            user_id: row.get(0)?,
            username: row.get(1)?,
            community_id: row.get(2)?,
            is_follow: row.get(3)?,
        })
    })?;
    rows.collect()
}

pub fn has_follower_row(conn: &Connection, user_id: i64, community_id: i64) -> Result<bool, RusqliteError> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM community_followers WHERE user_id = ?1 AND community_id = ?2)",
        params![user_id, community_id],
        |row| row.get(0),
    )
}

// ====================================================================
// ======================= FOLLOW REQUESTS ============================
// ====================================================================

pub fn read_follow_request(
    conn: &Connection,
    user_id: i64,
    community_id: i64,
) -> Result<Option<FollowRequest>, RusqliteError> {
    conn.query_row(
        &format!("{} WHERE r.user_id = ?1 AND r.community_id = ?2", REQUEST_SELECT),
        params![user_id, community_id],
        map_follow_request,
    )
    .optional()
}

pub fn ensure_follow_request_row(conn: &Connection, user_id: i64, community_id: i64) -> Result<(), RusqliteError> {
    conn.execute(
        "INSERT OR IGNORE INTO community_follow_requests (user_id, community_id, created_at) VALUES (?1, ?2, ?3)",
        params![user_id, community_id, Utc::now()],
    )?;
    Ok(())
}

pub fn mark_follow_request_sent(conn: &Connection, request_id: i64) -> Result<usize, RusqliteError> {
    conn.execute(
        "UPDATE community_follow_requests SET send_status = 1 WHERE id = ?1",
        [request_id],
    )
}

/// Requests that were notified and not yet resolved.
pub fn list_pending_follow_requests(
    conn: &Connection,
    community_id: i64,
) -> Result<Vec<FollowRequest>, RusqliteError> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE r.community_id = ?1 AND r.accepted = 0 AND r.send_status = 1 ORDER BY r.created_at, r.id",
        REQUEST_SELECT
    ))?;
    let rows = stmt.query_map([community_id], map_follow_request)?;
    rows.collect()
}

pub fn read_pending_follow_request(
    conn: &Connection,
    user_id: i64,
    community_id: i64,
) -> Result<Option<FollowRequest>, RusqliteError> {
    conn.query_row(
        &format!(
            "{} WHERE r.user_id = ?1 AND r.community_id = ?2 AND r.accepted = 0 AND r.send_status = 1",
            REQUEST_SELECT
        ),
        params![user_id, community_id],
        map_follow_request,
    )
    .optional()
}

pub fn delete_follow_request(conn: &Connection, request_id: i64) -> Result<usize, RusqliteError> {
    conn.execute("DELETE FROM community_follow_requests WHERE id = ?1", [request_id])
}

// ====================================================================
// ========================== BLACK LIST ==============================
// ====================================================================

pub fn read_ban(conn: &Connection, user_id: i64, community_id: i64) -> Result<Option<BlackListEntry>, RusqliteError> {
    conn.query_row(
        &format!("{} WHERE b.user_id = ?1 AND b.community_id = ?2", BAN_SELECT),
        params![user_id, community_id],
        map_ban,
    )
    .optional()
}

pub fn is_banned(conn: &Connection, user_id: i64, community_id: i64) -> Result<bool, RusqliteError> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM black_list WHERE user_id = ?1 AND community_id = ?2)",
        params![user_id, community_id],
        |row| row.get(0),
    )
}

/// Get-or-create keyed by (user, community). Returns true when a new row was inserted.
pub fn upsert_ban(conn: &Connection, user_id: i64, community_id: i64, reason: &str) -> Result<bool, RusqliteError> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO black_list (user_id, community_id, reason, banned_at) VALUES (?1, ?2, ?3, ?4)",
        params![user_id, community_id, reason, Utc::now()],
    )?;
    if inserted == 0 {
        conn.execute(
            "UPDATE black_list SET reason = ?1 WHERE user_id = ?2 AND community_id = ?3",
            params![reason, user_id, community_id],
        )?;
    }
    Ok(inserted > 0)
}

pub fn delete_ban(conn: &Connection, user_id: i64, community_id: i64) -> Result<usize, RusqliteError> {
    conn.execute(
        "DELETE FROM black_list WHERE user_id = ?1 AND community_id = ?2",
        params![user_id, community_id],
    )
}

pub fn list_bans(conn: &Connection, community_id: i64) -> Result<Vec<BlackListEntry>, RusqliteError> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE b.community_id = ?1 ORDER BY b.banned_at DESC, b.id DESC",
        BAN_SELECT
    ))?;
    let rows = stmt.query_map([community_id], map_ban)?;
    rows.collect()
}
