use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::helper::notification_helpers::NotificationDispatcher;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Shared across workers through `web::Data`.
pub struct AppState {
    pub dispatcher: Arc<dyn NotificationDispatcher>,
}

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Every pooled connection enforces foreign keys and waits on a locked database
/// instead of failing straight away.
pub fn build_pool(db_path: &Path) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.busy_timeout(BUSY_TIMEOUT)
    });
    Pool::builder().build(manager)
}

pub mod config;
pub mod error;
pub mod helper;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod setup;
