use crate::models::db_operations::notifications_db_operations;
use crate::models::{EntityRef, Notification};
use crate::DbPool;
use rusqlite::Connection;
use std::sync::Mutex;
use thiserror::Error;

/// Side effects produced by membership transitions, delivered after commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommunityEvent {
    FollowRequestSent {
        community_id: i64,
        community_name: String,
        owner_id: i64,
        requester_username: String,
    },
}

impl CommunityEvent {
    pub fn recipient(&self) -> i64 {
        match self {
            CommunityEvent::FollowRequestSent { owner_id, .. } => *owner_id,
        }
    }

    pub fn subject(&self) -> EntityRef {
        match self {
            CommunityEvent::FollowRequestSent { community_id, .. } => EntityRef::Community(*community_id),
        }
    }

    pub fn message(&self) -> String {
        match self {
            CommunityEvent::FollowRequestSent { community_name, requester_username, .. } => format!(
                "There is your new follow request: {}\nCheck your follow request list: /community/name-{}/follow-requests/",
                requester_username, community_name
            ),
        }
    }
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("R2D2 Pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

pub trait NotificationDispatcher: Send + Sync {
    fn dispatch(&self, event: &CommunityEvent) -> Result<(), NotifyError>;
}

/// Writes each event as an in-app notification row.
pub struct SqliteNotificationDispatcher {
    pool: DbPool,
}

impl SqliteNotificationDispatcher {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl NotificationDispatcher for SqliteNotificationDispatcher {
    fn dispatch(&self, event: &CommunityEvent) -> Result<(), NotifyError> {
        let conn = self.pool.get()?;
        record_notification(&conn, event)?;
        Ok(())
    }
}

/// Keeps events in memory. Used where delivery should be observed rather than persisted.
#[derive(Default)]
pub struct RecordingDispatcher {
    events: Mutex<Vec<CommunityEvent>>,
}

impl RecordingDispatcher {
    pub fn events(&self) -> Vec<CommunityEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl NotificationDispatcher for RecordingDispatcher {
    fn dispatch(&self, event: &CommunityEvent) -> Result<(), NotifyError> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| {
                log::error!("Mutex for recorded events was poisoned! Recovering lock.");
                poisoned.into_inner()
            })
            .push(event.clone());
        Ok(())
    }
}

pub fn record_notification(conn: &Connection, event: &CommunityEvent) -> rusqlite::Result<i64> {
    notifications_db_operations::create_notification(conn, event.recipient(), &event.message(), event.subject())
}

/// Fire-and-forget delivery: failures are logged and never reach the caller.
pub fn dispatch_all(dispatcher: &dyn NotificationDispatcher, events: &[CommunityEvent]) {
    for event in events {
        if let Err(e) = dispatcher.dispatch(event) {
            log::error!("Failed to deliver notification to user {}: {}", event.recipient(), e);
        }
    }
}

pub fn list_notifications(conn: &Connection, user_id: i64) -> rusqlite::Result<Vec<Notification>> {
    notifications_db_operations::list_notifications_for_user(conn, user_id)
}
