//! Shared domain types: people, presence records, identities.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// Maximum length of an activity description, in characters.
pub const MAX_DESCRIPTION_CHARS: usize = 1000;

/// Database identity of a roster member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PersonId(pub i64);

impl fmt::Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Chat the conversation happens in. Sessions are keyed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub i64);

/// Sender of an inbound event. Privilege checks use it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

/// Full name of a person. `middle` is empty when the person has none.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PersonName {
    pub last: String,
    pub first: String,
    pub middle: String,
}

impl PersonName {
    pub fn new(last: impl Into<String>, first: impl Into<String>, middle: impl Into<String>) -> Self {
        Self {
            last: last.into().trim().to_string(),
            first: first.into().trim().to_string(),
            middle: middle.into().trim().to_string(),
        }
    }

    /// A name needs at least a last or a first name to be stored.
    pub fn is_blank(&self) -> bool {
        self.last.is_empty() && self.first.is_empty()
    }

    /// Identity key used for duplicate detection during import.
    pub fn key(&self) -> (String, String, String) {
        (self.last.clone(), self.first.clone(), self.middle.clone())
    }
}

impl fmt::Display for PersonName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = [&self.last, &self.first, &self.middle];
        let joined = parts
            .iter()
            .filter(|p| !p.is_empty())
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        f.write_str(&joined)
    }
}

/// A roster member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub name: PersonName,
}

impl Person {
    /// Short label used on selection buttons: "Last First".
    pub fn short_label(&self) -> String {
        format!("{} {}", self.name.last, self.name.first)
            .trim()
            .to_string()
    }
}

/// A leave joined with the person it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveEntry {
    pub person: Person,
    pub time: NaiveTime,
}

/// One line of the statistics export: a (person, day) pair with whichever
/// record exists for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRow {
    pub day: NaiveDate,
    pub name: PersonName,
    pub leave_time: Option<NaiveTime>,
    pub activity_time: Option<NaiveTime>,
    pub activity_description: Option<String>,
}

/// Truncate a timestamp to whole minutes.
pub fn round_to_minute(at: NaiveDateTime) -> NaiveDateTime {
    at.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(at)
}

/// Cut a description to [`MAX_DESCRIPTION_CHARS`] characters.
pub fn truncate_description(description: &str) -> String {
    description.chars().take(MAX_DESCRIPTION_CHARS).collect()
}
