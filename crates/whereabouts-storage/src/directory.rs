//! SQLite-backed roster.

use std::sync::Arc;

use rusqlite::OptionalExtension;
use tracing::debug;

use whereabouts_core::error::WhereaboutsError;
use whereabouts_core::traits::PersonDirectory;
use whereabouts_core::types::{Person, PersonId, PersonName};

use crate::db::Database;

const PERSON_COLUMNS: &str = "id, last_name, first_name, middle_name";
const PERSON_ORDER: &str = "ORDER BY last_name, first_name, middle_name, id";

/// Roster stored in the `people` table.
pub struct SqliteDirectory {
    db: Arc<Database>,
}

impl SqliteDirectory {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Number of people on the roster.
    pub fn count(&self) -> Result<usize, WhereaboutsError> {
        self.db.with_conn(|conn| {
            let n: i64 = conn
                .query_row("SELECT COUNT(*) FROM people", [], |row| row.get(0))
                .map_err(|e| WhereaboutsError::Storage(format!("Failed to count people: {}", e)))?;
            Ok(n as usize)
        })
    }

    fn query_people(
        &self,
        where_clause: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<Person>, WhereaboutsError> {
        let sql = format!(
            "SELECT {} FROM people {} {}",
            PERSON_COLUMNS, where_clause, PERSON_ORDER
        );
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| WhereaboutsError::Storage(e.to_string()))?;
            let rows = stmt
                .query_map(params, row_to_person)
                .map_err(|e| WhereaboutsError::Storage(format!("Failed to query people: {}", e)))?;

            let mut people = Vec::new();
            for row in rows {
                people.push(row.map_err(|e| WhereaboutsError::Storage(e.to_string()))?);
            }
            Ok(people)
        })
    }
}

impl PersonDirectory for SqliteDirectory {
    fn all_people(&self) -> Result<Vec<Person>, WhereaboutsError> {
        self.query_people("", &[])
    }

    fn person(&self, id: PersonId) -> Result<Option<Person>, WhereaboutsError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM people WHERE id = ?1", PERSON_COLUMNS),
                rusqlite::params![id.0],
                row_to_person,
            )
            .optional()
            .map_err(|e| WhereaboutsError::Storage(format!("Failed to load person: {}", e)))
        })
    }

    fn search_term(&self, term: &str) -> Result<Vec<Person>, WhereaboutsError> {
        let term = fold(term);
        if term.is_empty() {
            return Ok(Vec::new());
        }
        debug!(term = %term, "Exact single-term search");
        self.query_people(
            "WHERE last_name_folded = ?1 OR first_name_folded = ?1",
            &[&term],
        )
    }

    fn search_full_name(&self, last: &str, first: &str) -> Result<Vec<Person>, WhereaboutsError> {
        let (last, first) = (fold(last), fold(first));
        if last.is_empty() || first.is_empty() {
            return Ok(Vec::new());
        }
        debug!(last = %last, first = %first, "Full-name search");
        self.query_people(
            "WHERE (last_name_folded = ?1 AND first_name_folded = ?2)
                OR (last_name_folded = ?1 AND instr(first_name_folded, ?2) > 0)
                OR (instr(last_name_folded, ?1) > 0 AND first_name_folded = ?2)",
            &[&last, &first],
        )
    }

    fn search_partial(&self, last: &str, first: &str) -> Result<Vec<Person>, WhereaboutsError> {
        let (last, first) = (fold(last), fold(first));
        debug!(last = %last, first = %first, "Partial search");
        // instr(x, '') is 1, so empty terms must not take part.
        self.query_people(
            "WHERE (?1 <> '' AND instr(last_name_folded, ?1) > 0)
                OR (?2 <> '' AND instr(first_name_folded, ?2) > 0)",
            &[&last, &first],
        )
    }

    fn insert_person(&self, name: &PersonName) -> Result<Option<PersonId>, WhereaboutsError> {
        if name.is_blank() {
            return Err(WhereaboutsError::Storage(
                "Person needs a last or first name".to_string(),
            ));
        }
        self.db.with_conn(|conn| {
            let inserted = conn
                .execute(
                    "INSERT OR IGNORE INTO people
                        (last_name, first_name, middle_name, last_name_folded, first_name_folded)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    rusqlite::params![
                        name.last,
                        name.first,
                        name.middle,
                        fold(&name.last),
                        fold(&name.first),
                    ],
                )
                .map_err(|e| WhereaboutsError::Storage(format!("Failed to add person: {}", e)))?;

            if inserted == 0 {
                return Ok(None);
            }
            Ok(Some(PersonId(conn.last_insert_rowid())))
        })
    }
}

fn fold(s: &str) -> String {
    s.trim().to_lowercase()
}

fn row_to_person(row: &rusqlite::Row<'_>) -> rusqlite::Result<Person> {
    Ok(Person {
        id: PersonId(row.get(0)?),
        name: PersonName {
            last: row.get(1)?,
            first: row.get(2)?,
            middle: row.get(3)?,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory_with(names: &[(&str, &str, &str)]) -> SqliteDirectory {
        let dir = SqliteDirectory::new(Arc::new(Database::in_memory().unwrap()));
        for (last, first, middle) in names {
            dir.insert_person(&PersonName::new(*last, *first, *middle))
                .unwrap();
        }
        dir
    }

    fn labels(people: &[Person]) -> Vec<String> {
        people.iter().map(|p| p.short_label()).collect()
    }

    // =========================================================================
    // Inserts
    // =========================================================================

    #[test]
    fn test_insert_and_get() {
        let dir = directory_with(&[]);
        let id = dir
            .insert_person(&PersonName::new("Petrov", "Ivan", "Sergeevich"))
            .unwrap()
            .unwrap();

        let person = dir.person(id).unwrap().unwrap();
        assert_eq!(person.name.middle, "Sergeevich");
        assert!(dir.person(PersonId(999)).unwrap().is_none());
    }

    #[test]
    fn test_insert_duplicate_returns_none() {
        let dir = directory_with(&[("Petrov", "Ivan", "")]);
        let again = dir
            .insert_person(&PersonName::new("Petrov", "Ivan", ""))
            .unwrap();
        assert!(again.is_none());
        assert_eq!(dir.count().unwrap(), 1);

        // Different middle name is a different person.
        let other = dir
            .insert_person(&PersonName::new("Petrov", "Ivan", "Olegovich"))
            .unwrap();
        assert!(other.is_some());
    }

    #[test]
    fn test_insert_blank_rejected() {
        let dir = directory_with(&[]);
        assert!(dir.insert_person(&PersonName::new("", "", "X")).is_err());
    }

    // =========================================================================
    // Searches
    // =========================================================================

    #[test]
    fn test_all_people_sorted() {
        let dir = directory_with(&[
            ("Sidorov", "Anton", ""),
            ("Ivanov", "Petr", ""),
            ("Ivanov", "Alexey", ""),
        ]);
        assert_eq!(
            labels(&dir.all_people().unwrap()),
            vec!["Ivanov Alexey", "Ivanov Petr", "Sidorov Anton"]
        );
    }

    #[test]
    fn test_search_term_matches_last_or_first() {
        let dir = directory_with(&[
            ("Petrov", "Ivan", ""),
            ("Ivanov", "Petr", ""),
            ("Ivan", "Markov", ""),
        ]);
        let found = dir.search_term("ivan").unwrap();
        assert_eq!(labels(&found), vec!["Ivan Markov", "Petrov Ivan"]);
    }

    #[test]
    fn test_search_term_is_case_insensitive_for_cyrillic() {
        let dir = directory_with(&[("Петров", "Иван", "")]);
        assert_eq!(dir.search_term("ПЕТРОВ").unwrap().len(), 1);
        assert_eq!(dir.search_term("иван").unwrap().len(), 1);
    }

    #[test]
    fn test_search_term_blank_is_empty() {
        let dir = directory_with(&[("Petrov", "Ivan", "")]);
        assert!(dir.search_term("  ").unwrap().is_empty());
    }

    #[test]
    fn test_search_full_name_variants() {
        let dir = directory_with(&[
            ("Ivanov", "Petr", ""),
            ("Ivanov", "Alexey", ""),
            ("Ivanova", "Petra", ""),
        ]);

        // Exact last + exact first.
        assert_eq!(labels(&dir.search_full_name("Ivanov", "Petr").unwrap()), vec![
            "Ivanov Petr"
        ]);
        // Exact last + partial first.
        assert_eq!(labels(&dir.search_full_name("ivanov", "ale").unwrap()), vec![
            "Ivanov Alexey"
        ]);
        // Partial last + exact first.
        assert_eq!(labels(&dir.search_full_name("ivano", "petra").unwrap()), vec![
            "Ivanova Petra"
        ]);
        // Neither side exact.
        assert!(dir.search_full_name("ivano", "pet").unwrap().is_empty());
    }

    #[test]
    fn test_search_partial() {
        let dir = directory_with(&[
            ("Petrov", "Ivan", ""),
            ("Petrenko", "Olga", ""),
            ("Sidorov", "Petr", ""),
        ]);
        assert_eq!(labels(&dir.search_partial("petr", "petr").unwrap()), vec![
            "Petrenko Olga",
            "Petrov Ivan",
            "Sidorov Petr"
        ]);
        assert_eq!(labels(&dir.search_partial("enko", "").unwrap()), vec![
            "Petrenko Olga"
        ]);
    }

    #[test]
    fn test_search_partial_empty_terms_match_nothing() {
        let dir = directory_with(&[("Petrov", "Ivan", "")]);
        assert!(dir.search_partial("", "").unwrap().is_empty());
    }
}
