//! SQLite-backed presence records.
//!
//! Leave and activity rows are unique per (person, day). Writing one kind
//! deletes the other kind for the same (person, day) inside the same
//! transaction, so readers never observe both.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};

use whereabouts_core::clock::Clock;
use whereabouts_core::error::WhereaboutsError;
use whereabouts_core::traits::StatusStore;
use whereabouts_core::types::{
    round_to_minute, truncate_description, ExportRow, LeaveEntry, Person, PersonId, PersonName,
};

use crate::db::Database;

const DAY_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M";

/// Presence records stored in the `leaves` and `activities` tables.
pub struct SqliteStatusStore {
    db: Arc<Database>,
    clock: Arc<dyn Clock>,
}

impl SqliteStatusStore {
    pub fn new(db: Arc<Database>, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }
}

impl StatusStore for SqliteStatusStore {
    fn upsert_leave(&self, person: PersonId, at: NaiveDateTime) -> Result<(), WhereaboutsError> {
        let at = round_to_minute(at);
        let day = format_day(at.date());
        let time = format_time(at.time());

        self.db.with_transaction(|tx| {
            delete_activity(tx, person, &day)?;
            tx.execute(
                "INSERT INTO leaves (person_id, day, leave_time) VALUES (?1, ?2, ?3)
                 ON CONFLICT (person_id, day) DO UPDATE SET
                    leave_time = excluded.leave_time,
                    updated_at = strftime('%s', 'now')",
                rusqlite::params![person.0, day, time],
            )
            .map_err(|e| WhereaboutsError::Storage(format!("Failed to save leave: {}", e)))?;
            Ok(())
        })?;

        info!(person = %person, day = %day, time = %time, "Leave recorded");
        Ok(())
    }

    fn upsert_activity(
        &self,
        person: PersonId,
        at: NaiveDateTime,
        description: &str,
    ) -> Result<(), WhereaboutsError> {
        let at = round_to_minute(at);
        let day = format_day(at.date());
        let time = format_time(at.time());
        let description = truncate_description(description);

        self.db.with_transaction(|tx| {
            delete_leave(tx, person, &day)?;
            tx.execute(
                "INSERT INTO activities (person_id, day, activity_time, description)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (person_id, day) DO UPDATE SET
                    activity_time = excluded.activity_time,
                    description = excluded.description,
                    updated_at = strftime('%s', 'now')",
                rusqlite::params![person.0, day, time, description],
            )
            .map_err(|e| WhereaboutsError::Storage(format!("Failed to save activity: {}", e)))?;
            Ok(())
        })?;

        info!(person = %person, day = %day, time = %time, "Activity recorded");
        Ok(())
    }

    fn remove_conflicting(&self, person: PersonId, day: NaiveDate) -> Result<(), WhereaboutsError> {
        let day = format_day(day);
        self.db.with_transaction(|tx| {
            delete_leave(tx, person, &day)?;
            delete_activity(tx, person, &day)
        })?;
        debug!(person = %person, day = %day, "Cleared records for day");
        Ok(())
    }

    fn today_leaves(&self) -> Result<HashMap<PersonId, NaiveTime>, WhereaboutsError> {
        let day = format_day(self.clock.today());
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT person_id, leave_time FROM leaves WHERE day = ?1")
                .map_err(|e| WhereaboutsError::Storage(e.to_string()))?;
            let rows = stmt
                .query_map(rusqlite::params![day], |row| {
                    Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
                })
                .map_err(|e| WhereaboutsError::Storage(format!("Failed to load leaves: {}", e)))?;

            let mut leaves = HashMap::new();
            for row in rows {
                let (id, time) = row.map_err(|e| WhereaboutsError::Storage(e.to_string()))?;
                leaves.insert(PersonId(id), parse_time(&time)?);
            }
            Ok(leaves)
        })
    }

    fn today_activities(
        &self,
    ) -> Result<HashMap<PersonId, (NaiveTime, String)>, WhereaboutsError> {
        let day = format_day(self.clock.today());
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT person_id, activity_time, description FROM activities WHERE day = ?1",
                )
                .map_err(|e| WhereaboutsError::Storage(e.to_string()))?;
            let rows = stmt
                .query_map(rusqlite::params![day], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                })
                .map_err(|e| {
                    WhereaboutsError::Storage(format!("Failed to load activities: {}", e))
                })?;

            let mut activities = HashMap::new();
            for row in rows {
                let (id, time, description) =
                    row.map_err(|e| WhereaboutsError::Storage(e.to_string()))?;
                activities.insert(PersonId(id), (parse_time(&time)?, description));
            }
            Ok(activities)
        })
    }

    fn leaves_on(&self, day: NaiveDate) -> Result<Vec<LeaveEntry>, WhereaboutsError> {
        let day = format_day(day);
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT p.id, p.last_name, p.first_name, p.middle_name, l.leave_time
                     FROM leaves l
                     JOIN people p ON p.id = l.person_id
                     WHERE l.day = ?1
                     ORDER BY l.leave_time, p.last_name, p.first_name",
                )
                .map_err(|e| WhereaboutsError::Storage(e.to_string()))?;
            let rows = stmt
                .query_map(rusqlite::params![day], |row| {
                    Ok((
                        Person {
                            id: PersonId(row.get(0)?),
                            name: PersonName {
                                last: row.get(1)?,
                                first: row.get(2)?,
                                middle: row.get(3)?,
                            },
                        },
                        row.get::<_, String>(4)?,
                    ))
                })
                .map_err(|e| WhereaboutsError::Storage(format!("Failed to load leaves: {}", e)))?;

            let mut entries = Vec::new();
            for row in rows {
                let (person, time) = row.map_err(|e| WhereaboutsError::Storage(e.to_string()))?;
                entries.push(LeaveEntry {
                    person,
                    time: parse_time(&time)?,
                });
            }
            Ok(entries)
        })
    }

    fn leave_on(
        &self,
        person: PersonId,
        day: NaiveDate,
    ) -> Result<Option<NaiveTime>, WhereaboutsError> {
        let day = format_day(day);
        let time: Option<String> = self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT leave_time FROM leaves WHERE person_id = ?1 AND day = ?2",
                rusqlite::params![person.0, day],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| WhereaboutsError::Storage(format!("Failed to load leave: {}", e)))
        })?;
        time.as_deref().map(parse_time).transpose()
    }

    fn activity_on(
        &self,
        person: PersonId,
        day: NaiveDate,
    ) -> Result<Option<(NaiveTime, String)>, WhereaboutsError> {
        let day = format_day(day);
        let found: Option<(String, String)> = self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT activity_time, description FROM activities
                 WHERE person_id = ?1 AND day = ?2",
                rusqlite::params![person.0, day],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| WhereaboutsError::Storage(format!("Failed to load activity: {}", e)))
        })?;
        match found {
            Some((time, description)) => Ok(Some((parse_time(&time)?, description))),
            None => Ok(None),
        }
    }

    fn export_rows(&self) -> Result<Vec<ExportRow>, WhereaboutsError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT day, last_name, first_name, middle_name,
                            leave_time, activity_time, description
                     FROM (
                        SELECT l.day, p.last_name, p.first_name, p.middle_name,
                               l.leave_time, NULL AS activity_time, NULL AS description
                        FROM leaves l JOIN people p ON p.id = l.person_id
                        UNION ALL
                        SELECT a.day, p.last_name, p.first_name, p.middle_name,
                               NULL, a.activity_time, a.description
                        FROM activities a JOIN people p ON p.id = a.person_id
                     )
                     ORDER BY day, last_name, first_name, middle_name",
                )
                .map_err(|e| WhereaboutsError::Storage(e.to_string()))?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(RawExportRow {
                        day: row.get(0)?,
                        name: PersonName {
                            last: row.get(1)?,
                            first: row.get(2)?,
                            middle: row.get(3)?,
                        },
                        leave_time: row.get(4)?,
                        activity_time: row.get(5)?,
                        description: row.get(6)?,
                    })
                })
                .map_err(|e| WhereaboutsError::Storage(format!("Failed to export: {}", e)))?;

            let mut out = Vec::new();
            for row in rows {
                let raw = row.map_err(|e| WhereaboutsError::Storage(e.to_string()))?;
                out.push(raw.decode()?);
            }
            Ok(out)
        })
    }
}

struct RawExportRow {
    day: String,
    name: PersonName,
    leave_time: Option<String>,
    activity_time: Option<String>,
    description: Option<String>,
}

impl RawExportRow {
    fn decode(self) -> Result<ExportRow, WhereaboutsError> {
        Ok(ExportRow {
            day: parse_day(&self.day)?,
            name: self.name,
            leave_time: self.leave_time.as_deref().map(parse_time).transpose()?,
            activity_time: self.activity_time.as_deref().map(parse_time).transpose()?,
            activity_description: self.description,
        })
    }
}

fn delete_leave(conn: &Connection, person: PersonId, day: &str) -> Result<(), WhereaboutsError> {
    conn.execute(
        "DELETE FROM leaves WHERE person_id = ?1 AND day = ?2",
        rusqlite::params![person.0, day],
    )
    .map_err(|e| WhereaboutsError::Storage(format!("Failed to remove leave: {}", e)))?;
    Ok(())
}

fn delete_activity(conn: &Connection, person: PersonId, day: &str) -> Result<(), WhereaboutsError> {
    conn.execute(
        "DELETE FROM activities WHERE person_id = ?1 AND day = ?2",
        rusqlite::params![person.0, day],
    )
    .map_err(|e| WhereaboutsError::Storage(format!("Failed to remove activity: {}", e)))?;
    Ok(())
}

fn format_day(day: NaiveDate) -> String {
    day.format(DAY_FORMAT).to_string()
}

fn format_time(time: NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

fn parse_day(raw: &str) -> Result<NaiveDate, WhereaboutsError> {
    NaiveDate::parse_from_str(raw, DAY_FORMAT)
        .map_err(|e| WhereaboutsError::Storage(format!("Corrupt day '{}': {}", raw, e)))
}

fn parse_time(raw: &str) -> Result<NaiveTime, WhereaboutsError> {
    NaiveTime::parse_from_str(raw, TIME_FORMAT)
        .map_err(|e| WhereaboutsError::Storage(format!("Corrupt time '{}': {}", raw, e)))
}
