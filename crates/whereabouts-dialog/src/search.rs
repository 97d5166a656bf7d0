//! Person lookup with exact-then-partial fallback.

use tracing::debug;

use whereabouts_core::traits::PersonDirectory;
use whereabouts_core::types::Person;

use crate::error::DialogError;
use crate::parser::ParseError;

/// Resolve a free-text key to the people it may refer to.
///
/// One word is matched exactly against last or first name; two or more
/// words are read as "last first" (extra words are ignored). If the exact
/// pass finds nobody, a substring pass runs with the same words. An empty
/// result is `PersonNotFound`; ordering is (last, first) from the directory.
pub fn find_people(directory: &dyn PersonDirectory, key: &str) -> Result<Vec<Person>, DialogError> {
    let terms: Vec<&str> = key.split_whitespace().collect();
    let (exact, last, first) = match terms.as_slice() {
        [] => return Err(ParseError::EmptySearchTerm.into()),
        [term] => (directory.search_term(term)?, *term, *term),
        [last, first, ..] => (directory.search_full_name(last, first)?, *last, *first),
    };

    let people = if exact.is_empty() {
        debug!(key, "No exact match, trying partial search");
        directory.search_partial(last, first)?
    } else {
        exact
    };

    if people.is_empty() {
        return Err(DialogError::PersonNotFound(key.trim().to_string()));
    }
    Ok(people)
}
