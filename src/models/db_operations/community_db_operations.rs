use crate::models::{Community, CommunitySummary, Moderator, ModeratorTier};
use chrono::Utc;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, Error as RusqliteError, OptionalExtension, Row};

impl ToSql for ModeratorTier {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ModeratorTier {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

fn map_community(row: &Row) -> rusqlite::Result<Community> {
    Ok(Community {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        is_private: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn map_moderator(row: &Row) -> rusqlite::Result<Moderator> {
    Ok(Moderator {
        id: row.get(0)?,
        user_id: row.get(1)?,
        username: row.get(2)?,
        community_id: row.get(3)?,
        tier: row.get(4)?,
    })
}

const MODERATOR_SELECT: &str = "SELECT m.id, m.user_id, u.username, m.community_id, m.tier
     FROM moderators m JOIN users u ON u.id = m.user_id";

// ====================================================================
// ========================= COMMUNITIES ==============================
// ====================================================================

pub fn create_community(
    conn: &Connection,
    name: &str,
    description: &str,
    is_private: bool,
) -> Result<i64, RusqliteError> {
    conn.execute(
        "INSERT INTO communities (name, description, is_private, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![name, description, is_private, Utc::now()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn read_community_by_name(conn: &Connection, name: &str) -> Result<Option<Community>, RusqliteError> {
    conn.query_row(
        "SELECT id, name, description, is_private, created_at FROM communities WHERE name = ?1",
        [name],
        map_community,
    )
    .optional()
}

pub fn read_all_communities(conn: &Connection) -> Result<Vec<CommunitySummary>, RusqliteError> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.name, c.description, c.is_private, c.created_at,
                (SELECT COUNT(*) FROM community_followers f WHERE f.community_id = c.id AND f.is_follow = 1)
         FROM communities c ORDER BY c.name",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(CommunitySummary {
            community: map_community(row)?,
            followers_count: row.get(5)?,
        })
    })?;
    rows.collect()
}

pub fn update_community(
    conn: &Connection,
    community_id: i64,
    description: &str,
    is_private: bool,
) -> Result<usize, RusqliteError> {
    conn.execute(
        "UPDATE communities SET description = ?1, is_private = ?2 WHERE id = ?3",
        params![description, is_private, community_id],
    )
}

pub fn delete_community(conn: &Connection, community_id: i64) -> Result<usize, RusqliteError> {
    conn.execute("DELETE FROM communities WHERE id = ?1", [community_id])
}

// ====================================================================
// ========================== MODERATORS ==============================
// ====================================================================

pub fn read_moderator_tier(
    conn: &Connection,
    user_id: i64,
    community_id: i64,
) -> Result<Option<ModeratorTier>, RusqliteError> {
    conn.query_row(
        "SELECT tier FROM moderators WHERE user_id = ?1 AND community_id = ?2",
        params![user_id, community_id],
        |row| row.get(0),
    )
    .optional()
}

pub fn read_moderator_by_id(
    conn: &Connection,
    moderator_id: i64,
    community_id: i64,
) -> Result<Option<Moderator>, RusqliteError> {
    conn.query_row(
        &format!("{} WHERE m.id = ?1 AND m.community_id = ?2", MODERATOR_SELECT),
        params![moderator_id, community_id],
        map_moderator,
    )
    .optional()
}

pub fn read_owner(conn: &Connection, community_id: i64) -> Result<Option<Moderator>, RusqliteError> {
    conn.query_row(
        &format!("{} WHERE m.community_id = ?1 AND m.tier = 'owner'", MODERATOR_SELECT),
        [community_id],
        map_moderator,
    )
    .optional()
}

pub fn list_moderators_with_tier(
    conn: &Connection,
    community_id: i64,
    tier: ModeratorTier,
) -> Result<Vec<Moderator>, RusqliteError> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE m.community_id = ?1 AND m.tier = ?2 ORDER BY u.username",
        MODERATOR_SELECT
    ))?;
    let rows = stmt.query_map(params![community_id, tier], map_moderator)?;
    rows.collect()
}

/// Inserts the row or moves an existing one to `tier`. Returns true when anything changed.
pub fn upsert_moderator(
    conn: &Connection,
    user_id: i64,
    community_id: i64,
    tier: ModeratorTier,
) -> Result<bool, RusqliteError> {
    let changed = conn.execute(
        "INSERT INTO moderators (user_id, community_id, tier) VALUES (?1, ?2, ?3)
         ON CONFLICT(user_id, community_id) DO UPDATE SET tier = excluded.tier
         WHERE moderators.tier <> excluded.tier",
        params![user_id, community_id, tier],
    )?;
    Ok(changed > 0)
}

pub fn delete_moderator(conn: &Connection, moderator_id: i64, community_id: i64) -> Result<usize, RusqliteError> {
    conn.execute(
        "DELETE FROM moderators WHERE id = ?1 AND community_id = ?2",
        params![moderator_id, community_id],
    )
}
