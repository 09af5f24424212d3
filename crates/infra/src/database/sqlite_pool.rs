//! SQLite pool helpers
//!
//! Builds the r2d2 pool used by every repository and applies the
//! per-connection pragmas on checkout of a fresh connection.

use std::path::Path;
use std::time::Duration;

use cadence_domain::{CadenceError, DatabaseConfig, Result as DomainResult};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use tracing::{instrument, warn};

/// Pool of SQLite connections shared by the repositories.
pub type SqlitePool = Pool<SqliteConnectionManager>;

/// Connection checked out of a [`SqlitePool`].
pub type SqliteConnection = PooledConnection<SqliteConnectionManager>;

const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Apply connection-level pragmas
///
/// - WAL mode for concurrent readers during a generation pass
/// - NORMAL synchronous mode
/// - Foreign key constraints enabled (rule cascade, instance unlink)
/// - Busy timeout for handling lock contention
pub fn apply_connection_pragmas(conn: &Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    // Set first so the journal mode switch waits on concurrent openers.
    conn.busy_timeout(busy_timeout)?;
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA wal_autocheckpoint=1000;
         PRAGMA synchronous=NORMAL;
         PRAGMA foreign_keys=ON;",
    )
}

/// Create a pool for the database at `path`.
#[instrument(skip(path, config), fields(db_path = %path.as_ref().display(), pool_size = config.pool_size))]
pub fn create_sqlite_pool<P: AsRef<Path>>(
    path: P,
    config: &DatabaseConfig,
) -> DomainResult<SqlitePool> {
    let busy_timeout = Duration::from_millis(config.busy_timeout_ms);
    let manager = SqliteConnectionManager::file(path.as_ref())
        .with_init(move |conn| apply_connection_pragmas(conn, busy_timeout));

    Pool::builder()
        .max_size(config.pool_size.max(1))
        .connection_timeout(CONNECTION_TIMEOUT)
        .build(manager)
        .map_err(|err| {
            warn!(error = %err, "Failed to create connection pool");
            CadenceError::Database(format!("failed to create pool: {err}"))
        })
}
