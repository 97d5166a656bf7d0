//! Collaborator contracts used by the conversation layer.
//!
//! The SQLite crate implements [`PersonDirectory`] and [`StatusStore`]; the
//! spreadsheet crate implements [`Spreadsheets`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::Result;
use crate::types::{ExportRow, LeaveEntry, Person, PersonId, PersonName};

/// Read access to the roster, plus inserts for imports.
///
/// Every search returns people ordered by (last name, first name). Matching
/// is case-insensitive.
pub trait PersonDirectory: Send + Sync {
    fn all_people(&self) -> Result<Vec<Person>>;

    fn person(&self, id: PersonId) -> Result<Option<Person>>;

    /// Exact match of `term` against the last name or the first name.
    fn search_term(&self, term: &str) -> Result<Vec<Person>>;

    /// Exact last + exact first, or exact one side + substring on the other.
    fn search_full_name(&self, last: &str, first: &str) -> Result<Vec<Person>>;

    /// Substring of `last` in the last name or of `first` in the first name.
    fn search_partial(&self, last: &str, first: &str) -> Result<Vec<Person>>;

    /// Insert a person. Returns `None` if the exact name is already present.
    fn insert_person(&self, name: &PersonName) -> Result<Option<PersonId>>;
}

/// Presence records. Leave and activity are mutually exclusive per
/// (person, day); the upserts enforce it atomically.
pub trait StatusStore: Send + Sync {
    fn upsert_leave(&self, person: PersonId, at: NaiveDateTime) -> Result<()>;

    fn upsert_activity(&self, person: PersonId, at: NaiveDateTime, description: &str)
        -> Result<()>;

    /// Delete both kinds of record for the person on `day`.
    fn remove_conflicting(&self, person: PersonId, day: NaiveDate) -> Result<()>;

    fn today_leaves(&self) -> Result<HashMap<PersonId, NaiveTime>>;

    fn today_activities(&self) -> Result<HashMap<PersonId, (NaiveTime, String)>>;

    /// Leaves on `day` joined with person identity, ordered by leave time.
    fn leaves_on(&self, day: NaiveDate) -> Result<Vec<LeaveEntry>>;

    fn leave_on(&self, person: PersonId, day: NaiveDate) -> Result<Option<NaiveTime>>;

    fn activity_on(&self, person: PersonId, day: NaiveDate)
        -> Result<Option<(NaiveTime, String)>>;

    /// Every record, ordered by (day, last name, first name).
    fn export_rows(&self) -> Result<Vec<ExportRow>>;
}

/// Spreadsheet reading and writing.
pub trait Spreadsheets: Send + Sync {
    /// Read a roster: first sheet, header row skipped.
    fn read_roster(&self, path: &Path) -> Result<Vec<PersonName>>;

    /// Write the statistics workbook into `dir`, returning the file path.
    fn write_statistics(&self, rows: &[ExportRow], dir: &Path) -> Result<PathBuf>;
}
