//! Database schema migrations.
//!
//! Applies the initial schema: people, leaves, activities and the
//! schema_migrations bookkeeping table.

use rusqlite::Connection;
use tracing::info;

use whereabouts_core::error::WhereaboutsError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), WhereaboutsError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| WhereaboutsError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| {
            WhereaboutsError::Storage(format!("Failed to query migration version: {}", e))
        })?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: initial_schema");
    }

    Ok(())
}

/// Version 1: Initial schema.
///
/// Dates are stored as `YYYY-MM-DD` and times of day as `HH:MM`. The folded
/// name columns hold lower-cased copies for case-insensitive lookups, since
/// SQLite's LOWER() only folds ASCII.
fn apply_v1(conn: &Connection) -> Result<(), WhereaboutsError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS people (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            last_name           TEXT NOT NULL,
            first_name          TEXT NOT NULL,
            middle_name         TEXT NOT NULL DEFAULT '',
            last_name_folded    TEXT NOT NULL,
            first_name_folded   TEXT NOT NULL,
            created_at          INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
            UNIQUE (last_name, first_name, middle_name)
        );

        CREATE INDEX IF NOT EXISTS idx_people_last_folded
            ON people (last_name_folded);

        CREATE INDEX IF NOT EXISTS idx_people_first_folded
            ON people (first_name_folded);

        CREATE TABLE IF NOT EXISTS leaves (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            person_id   INTEGER NOT NULL REFERENCES people (id) ON DELETE CASCADE,
            day         TEXT NOT NULL,
            leave_time  TEXT NOT NULL,
            created_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
            updated_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
            UNIQUE (person_id, day)
        );

        CREATE INDEX IF NOT EXISTS idx_leaves_day
            ON leaves (day, leave_time);

        CREATE TABLE IF NOT EXISTS activities (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            person_id       INTEGER NOT NULL REFERENCES people (id) ON DELETE CASCADE,
            day             TEXT NOT NULL,
            activity_time   TEXT NOT NULL,
            description     TEXT NOT NULL,
            created_at      INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
            updated_at      INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
            UNIQUE (person_id, day)
        );

        CREATE INDEX IF NOT EXISTS idx_activities_day
            ON activities (day, activity_time);

        INSERT INTO schema_migrations (version, name) VALUES (1, 'initial_schema');
        ",
    )
    .map_err(|e| WhereaboutsError::Storage(format!("Migration v1 failed: {}", e)))?;

    Ok(())
}
