//! Database connection management.
//!
//! Wraps a single rusqlite Connection in a Mutex. Every repository call holds
//! the lock for its whole closure, so a read-modify-write inside one closure
//! never interleaves with another writer.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, Transaction};
use tracing::info;

use whereabouts_core::error::WhereaboutsError;

use crate::migrations;

/// Thread-safe SQLite database wrapper.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a database at the given path.
    ///
    /// Configures WAL mode, synchronous=NORMAL, foreign keys, and runs
    /// all pending migrations.
    pub fn new(path: &Path) -> Result<Self, WhereaboutsError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| WhereaboutsError::Storage(format!("Failed to open database: {}", e)))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
        .map_err(|e| WhereaboutsError::Storage(format!("Failed to set pragmas: {}", e)))?;

        info!("Database opened at {}", path.display());

        Self::migrated(conn)
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self, WhereaboutsError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            WhereaboutsError::Storage(format!("Failed to open in-memory db: {}", e))
        })?;

        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| WhereaboutsError::Storage(format!("Failed to set pragmas: {}", e)))?;

        Self::migrated(conn)
    }

    fn migrated(conn: Connection) -> Result<Self, WhereaboutsError> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.with_conn(migrations::run_migrations)?;
        Ok(db)
    }

    /// Execute a closure with a reference to the underlying connection.
    ///
    /// The mutex is held for the duration of the closure.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, WhereaboutsError>
    where
        F: FnOnce(&Connection) -> Result<T, WhereaboutsError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| WhereaboutsError::Storage(format!("Database lock poisoned: {}", e)))?;
        f(&conn)
    }

    /// Execute a closure inside a transaction.
    ///
    /// Commits when the closure returns `Ok`, rolls back otherwise.
    pub fn with_transaction<F, T>(&self, f: F) -> Result<T, WhereaboutsError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, WhereaboutsError>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| WhereaboutsError::Storage(format!("Database lock poisoned: {}", e)))?;
        let tx = conn
            .transaction()
            .map_err(|e| WhereaboutsError::Storage(format!("Failed to begin transaction: {}", e)))?;
        let value = f(&tx)?;
        tx.commit()
            .map_err(|e| WhereaboutsError::Storage(format!("Failed to commit: {}", e)))?;
        Ok(value)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish()
    }
}
