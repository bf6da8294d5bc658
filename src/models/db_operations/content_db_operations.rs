use crate::models::{Comment, CommentTarget, Publication, Thread};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Error as RusqliteError, OptionalExtension, Row};

fn map_publication(row: &Row) -> rusqlite::Result<Publication> {
    Ok(Publication {
        id: row.get(0)?,
        author_id: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        published_at: row.get(4)?,
    })
}

fn map_thread(row: &Row) -> rusqlite::Result<Thread> {
    Ok(Thread {
        id: row.get(0)?,
        author_id: row.get(1)?,
        title: row.get(2)?,
        context: row.get(3)?,
        created: row.get(4)?,
    })
}

fn map_comment(row: &Row) -> rusqlite::Result<Comment> {
    let kind: String = row.get(4)?;
    let target_id: i64 = row.get(5)?;
    let target = CommentTarget::from_parts(&kind, target_id).ok_or_else(|| {
        RusqliteError::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("unknown comment target '{}'", kind).into(),
        )
    })?;
    Ok(Comment {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        context: row.get(3)?,
        target,
        created: row.get(6)?,
    })
}

// ====================================================================
// ========================= PUBLICATIONS =============================
// ====================================================================

pub fn create_publication(
    conn: &Connection,
    author_id: i64,
    title: &str,
    content: &str,
) -> Result<i64, RusqliteError> {
    conn.execute(
        "INSERT INTO publications (author_id, title, content, published_at) VALUES (?1, ?2, ?3, ?4)",
        params![author_id, title, content, Utc::now()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn attach_publication(conn: &Connection, community_id: i64, publication_id: i64) -> Result<(), RusqliteError> {
    conn.execute(
        "INSERT OR IGNORE INTO community_posts (community_id, publication_id) VALUES (?1, ?2)",
        params![community_id, publication_id],
    )?;
    Ok(())
}

pub fn read_publication(conn: &Connection, publication_id: i64) -> Result<Option<Publication>, RusqliteError> {
    conn.query_row(
        "SELECT id, author_id, title, content, published_at FROM publications WHERE id = ?1",
        [publication_id],
        map_publication,
    )
    .optional()
}

/// Community publications, newest first. `author_id` and `since` narrow the listing.
pub fn list_community_publications(
    conn: &Connection,
    community_id: i64,
    author_id: Option<i64>,
    since: Option<DateTime<Utc>>,
) -> Result<Vec<Publication>, RusqliteError> {
    let mut stmt = conn.prepare(
        "SELECT p.id, p.author_id, p.title, p.content, p.published_at
         FROM publications p JOIN community_posts cp ON cp.publication_id = p.id
         WHERE cp.community_id = ?1
           AND (?2 IS NULL OR p.author_id = ?2)
           AND (?3 IS NULL OR p.published_at >= ?3)
         ORDER BY p.published_at DESC, p.id DESC",
    )?;
    let rows = stmt.query_map(params![community_id, author_id, since], map_publication)?;
    rows.collect()
}

// ====================================================================
// =========================== THREADS ================================
// ====================================================================

pub fn create_thread(conn: &Connection, author_id: i64, title: &str, context: &str) -> Result<i64, RusqliteError> {
    conn.execute(
        "INSERT INTO threads (author_id, title, context, created) VALUES (?1, ?2, ?3, ?4)",
        params![author_id, title, context, Utc::now()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn read_thread(conn: &Connection, thread_id: i64) -> Result<Option<Thread>, RusqliteError> {
    conn.query_row(
        "SELECT id, author_id, title, context, created FROM threads WHERE id = ?1",
        [thread_id],
        map_thread,
    )
    .optional()
}

// ====================================================================
// =========================== COMMENTS ===============================
// ====================================================================

pub fn create_comment(
    conn: &Connection,
    user_id: i64,
    title: &str,
    context: &str,
    target: CommentTarget,
) -> Result<i64, RusqliteError> {
    conn.execute(
        "INSERT INTO comments (user_id, title, context, target_kind, target_id, created)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![user_id, title, context, target.kind(), target.id(), Utc::now()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn read_comment(conn: &Connection, comment_id: i64) -> Result<Option<Comment>, RusqliteError> {
    conn.query_row(
        "SELECT id, user_id, title, context, target_kind, target_id, created FROM comments WHERE id = ?1",
        [comment_id],
        map_comment,
    )
    .optional()
}

pub fn list_comments(conn: &Connection, target: CommentTarget) -> Result<Vec<Comment>, RusqliteError> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, title, context, target_kind, target_id, created
         FROM comments WHERE target_kind = ?1 AND target_id = ?2 ORDER BY created, id",
    )?;
    let rows = stmt.query_map(params![target.kind(), target.id()], map_comment)?;
    rows.collect()
}

pub fn delete_comment(conn: &Connection, comment_id: i64) -> Result<usize, RusqliteError> {
    conn.execute("DELETE FROM comments WHERE id = ?1", [comment_id])
}
