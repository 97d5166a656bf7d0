//! Whereabouts storage crate - SQLite persistence for the roster and
//! presence records.
//!
//! Provides a WAL-mode SQLite database with migrations and the SQLite
//! implementations of the `PersonDirectory` and `StatusStore` contracts.

pub mod db;
pub mod directory;
pub mod migrations;
pub mod status;

pub use db::Database;
pub use directory::SqliteDirectory;
pub use status::SqliteStatusStore;
