use rusqlite::Connection;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Rusqlite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
}

/// Tables in creation order. Foreign keys only point at earlier entries.
const TABLES: &[(&str, &str)] = &[
    (
        "users",
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            last_login_time TEXT
        )",
    ),
    (
        "communities",
        "CREATE TABLE IF NOT EXISTS communities (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL DEFAULT '',
            is_private INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )",
    ),
    (
        "moderators",
        "CREATE TABLE IF NOT EXISTS moderators (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            community_id INTEGER NOT NULL,
            tier TEXT NOT NULL CHECK(tier IN ('owner', 'admin', 'moderator')),
            UNIQUE (user_id, community_id),
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY (community_id) REFERENCES communities(id) ON DELETE CASCADE
        )",
    ),
    (
        "community_followers",
        "CREATE TABLE IF NOT EXISTS community_followers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            community_id INTEGER NOT NULL,
            is_follow INTEGER NOT NULL DEFAULT 0,
            UNIQUE (user_id, community_id),
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY (community_id) REFERENCES communities(id) ON DELETE CASCADE
        )",
    ),
    (
        "community_follow_requests",
        "CREATE TABLE IF NOT EXISTS community_follow_requests (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            community_id INTEGER NOT NULL,
            send_status INTEGER NOT NULL DEFAULT 0,
            accepted INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            UNIQUE (user_id, community_id),
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY (community_id) REFERENCES communities(id) ON DELETE CASCADE
        )",
    ),
    (
        "black_list",
        "CREATE TABLE IF NOT EXISTS black_list (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            community_id INTEGER NOT NULL,
            reason TEXT NOT NULL,
            banned_at TEXT NOT NULL,
            UNIQUE (user_id, community_id),
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY (community_id) REFERENCES communities(id) ON DELETE CASCADE
        )",
    ),
    (
        "user_followers",
        "CREATE TABLE IF NOT EXISTS user_followers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            follower_id INTEGER NOT NULL,
            following_id INTEGER NOT NULL,
            is_follow INTEGER NOT NULL DEFAULT 0,
            UNIQUE (follower_id, following_id),
            CHECK (follower_id <> following_id),
            FOREIGN KEY (follower_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY (following_id) REFERENCES users(id) ON DELETE CASCADE
        )",
    ),
    (
        "direct_messages",
        "CREATE TABLE IF NOT EXISTS direct_messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            sender_id INTEGER NOT NULL,
            recipient_id INTEGER NOT NULL,
            body TEXT NOT NULL,
            is_read INTEGER NOT NULL DEFAULT 0,
            sent_at TEXT NOT NULL,
            CHECK (sender_id <> recipient_id),
            FOREIGN KEY (sender_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY (recipient_id) REFERENCES users(id) ON DELETE CASCADE
        )",
    ),
    (
        "notifications",
        "CREATE TABLE IF NOT EXISTS notifications (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            message TEXT NOT NULL,
            content_type TEXT NOT NULL,
            object_id INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        )",
    ),
    (
        "publications",
        "CREATE TABLE IF NOT EXISTS publications (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            author_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            published_at TEXT NOT NULL,
            FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE CASCADE
        )",
    ),
    (
        "community_posts",
        "CREATE TABLE IF NOT EXISTS community_posts (
            community_id INTEGER NOT NULL,
            publication_id INTEGER NOT NULL,
            PRIMARY KEY (community_id, publication_id),
            FOREIGN KEY (community_id) REFERENCES communities(id) ON DELETE CASCADE,
            FOREIGN KEY (publication_id) REFERENCES publications(id) ON DELETE CASCADE
        )",
    ),
    (
        "threads",
        "CREATE TABLE IF NOT EXISTS threads (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            author_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            context TEXT NOT NULL,
            created TEXT NOT NULL,
            FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE CASCADE
        )",
    ),
    (
        "comments",
        "CREATE TABLE IF NOT EXISTS comments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            context TEXT NOT NULL,
            target_kind TEXT NOT NULL CHECK(target_kind IN ('thread', 'publication')),
            target_id INTEGER NOT NULL,
            created TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        )",
    ),
];

pub fn setup_community_db(conn: &mut Connection) -> Result<(), SetupError> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    let tx = conn.transaction()?;
    for (name, ddl) in TABLES {
        log::info!("- Creating '{}' table...", name);
        tx.execute(ddl, [])?;
    }
    tx.execute(
        "CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications (user_id, created_at)",
        [],
    )?;
    tx.execute(
        "CREATE INDEX IF NOT EXISTS idx_comments_target ON comments (target_kind, target_id)",
        [],
    )?;
    tx.execute(
        "CREATE INDEX IF NOT EXISTS idx_direct_messages_pair ON direct_messages (sender_id, recipient_id, sent_at)",
        [],
    )?;
    tx.commit()?;
    Ok(())
}
