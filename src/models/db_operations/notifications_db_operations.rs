use crate::models::{EntityRef, Notification};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Error as RusqliteError};

pub fn create_notification(
    conn: &Connection,
    user_id: i64,
    message: &str,
    subject: EntityRef,
) -> Result<i64, RusqliteError> {
    conn.execute(
        "INSERT INTO notifications (user_id, message, content_type, object_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![user_id, message, subject.content_type(), subject.object_id(), Utc::now()],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Newest first. Rows with an unknown content type are skipped with a warning.
pub fn list_notifications_for_user(conn: &Connection, user_id: i64) -> Result<Vec<Notification>, RusqliteError> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, message, content_type, object_id, created_at
         FROM notifications WHERE user_id = ?1 ORDER BY created_at DESC, id DESC",
    )?;
    let rows = stmt.query_map([user_id], |row| {
        let content_type: String = row.get(3)?;
        let object_id: i64 = row.get(4)?;
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, String>(2)?,
            EntityRef::from_parts(&content_type, object_id).ok_or(content_type),
            row.get::<_, DateTime<Utc>>(5)?,
        ))
    })?;

    let mut notifications = Vec::new();
    for row in rows {
        let (id, user_id, message, subject, created_at) = row?;
        match subject {
            Ok(subject) => notifications.push(Notification { id, user_id, message, subject, created_at }),
            Err(content_type) => {
                log::warn!("Skipping notification {} with unknown content type '{}'", id, content_type)
            }
        }
    }
    Ok(notifications)
}

pub fn count_notifications_for_user(conn: &Connection, user_id: i64) -> Result<i64, RusqliteError> {
    conn.query_row(
        "SELECT COUNT(*) FROM notifications WHERE user_id = ?1",
        [user_id],
        |row| row.get(0),
    )
}

pub fn delete_notification(conn: &Connection, notification_id: i64, user_id: i64) -> Result<usize, RusqliteError> {
    conn.execute(
        "DELETE FROM notifications WHERE id = ?1 AND user_id = ?2",
        params![notification_id, user_id],
    )
}
