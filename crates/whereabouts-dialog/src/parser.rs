//! Time and name extraction from free text.
//!
//! A free-text message carries one time marker: a "now" keyword or an
//! `H:MM` clock time. The text around the marker names the person and, for
//! activities, describes what they are doing.

use std::ops::Range;
use std::sync::LazyLock;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;

use whereabouts_core::types::round_to_minute;

/// Errors produced while reading free text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("no time found in message")]
    NoTimeFound,
    #[error("invalid time {hour}:{minute:02}")]
    InvalidTimeValue { hour: u32, minute: u32 },
    #[error("search term is empty")]
    EmptySearchTerm,
    #[error("cannot read date '{0}'")]
    InvalidDate(String),
}

// ASCII digits only; `\d` would also accept other Unicode digits.
static CLOCK_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]{1,2}):([0-9]{2})").expect("Invalid clock regex"));

/// Which kind of marker carried the time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Now,
    Clock,
}

/// What a free-text message asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeTextIntent<'a> {
    Leave { key: &'a str },
    Activity { key: &'a str, description: &'a str },
}

/// Result of reading a time marker out of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeExpression {
    source: String,
    marker: Range<usize>,
    kind: MarkerKind,
    at: NaiveDateTime,
    before: String,
    after: String,
    residual: String,
}

impl TimeExpression {
    /// Timestamp on the current date, truncated to the minute.
    pub fn at(&self) -> NaiveDateTime {
        self.at
    }

    pub fn kind(&self) -> MarkerKind {
        self.kind
    }

    /// Byte range of the marker inside the original text.
    pub fn marker(&self) -> Range<usize> {
        self.marker.clone()
    }

    /// Trimmed text before the marker.
    pub fn before(&self) -> &str {
        &self.before
    }

    /// Trimmed text after the marker. Next to a "now" keyword a segment
    /// holding nothing but clock times is empty.
    pub fn after(&self) -> &str {
        &self.after
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// The message with the marker removed, whitespace collapsed.
    pub fn residual(&self) -> &str {
        &self.residual
    }

    pub fn search_key(&self) -> Result<&str, ParseError> {
        if self.residual.is_empty() {
            Err(ParseError::EmptySearchTerm)
        } else {
            Ok(&self.residual)
        }
    }

    /// Text on both sides of the marker means "person, marker, description";
    /// anything else is a leave keyed by the residual.
    pub fn intent(&self) -> FreeTextIntent<'_> {
        let (before, after) = (self.before(), self.after());
        if !before.is_empty() && !after.is_empty() {
            FreeTextIntent::Activity {
                key: before,
                description: after,
            }
        } else {
            FreeTextIntent::Leave {
                key: &self.residual,
            }
        }
    }
}

/// Extracts time markers using a configurable set of "now" keywords.
#[derive(Debug, Clone)]
pub struct TimeParser {
    /// Case-insensitive keyword detection.
    detect: Option<Regex>,
    /// Case-sensitive removal of the lower, Capitalized and UPPER variants.
    strip: Option<Regex>,
}

impl TimeParser {
    pub fn new<S: AsRef<str>>(keywords: &[S]) -> Self {
        let keywords: Vec<&str> = keywords
            .iter()
            .map(|k| k.as_ref().trim())
            .filter(|k| !k.is_empty())
            .collect();
        if keywords.is_empty() {
            return Self {
                detect: None,
                strip: None,
            };
        }

        let alternation = keywords
            .iter()
            .map(|k| regex::escape(k))
            .collect::<Vec<_>>()
            .join("|");
        let detect = Regex::new(&format!(r"(?i)\b(?:{})\b", alternation))
            .expect("Escaped keyword pattern is valid");

        let mut variants: Vec<String> = keywords
            .iter()
            .flat_map(|k| casing_variants(k))
            .map(|v| regex::escape(&v))
            .collect();
        variants.sort();
        variants.dedup();
        let strip = Regex::new(&format!(r"\b(?:{})\b", variants.join("|")))
            .expect("Escaped keyword pattern is valid");

        Self {
            detect: Some(detect),
            strip: Some(strip),
        }
    }

    /// True if the text carries a "now" keyword or something shaped like a
    /// clock time (valid or not).
    pub fn contains_time_marker(&self, text: &str) -> bool {
        self.detect.as_ref().is_some_and(|re| re.is_match(text)) || CLOCK_TIME.is_match(text)
    }

    /// Read the time marker out of `text`. The keyword wins over a clock time.
    pub fn parse(&self, text: &str, now: NaiveDateTime) -> Result<TimeExpression, ParseError> {
        if let Some(found) = self.detect.as_ref().and_then(|re| re.find(text)) {
            let before = without_lone_clock(&text[..found.start()]);
            let after = without_lone_clock(&text[found.end()..]);
            let rest = format!("{} {}", before, after);
            let residual = match &self.strip {
                Some(strip) => strip.replace_all(&rest, " ").to_string(),
                None => rest,
            };
            return Ok(TimeExpression {
                source: text.to_string(),
                marker: found.range(),
                kind: MarkerKind::Now,
                at: round_to_minute(now),
                before: before.to_string(),
                after: after.to_string(),
                residual: collapse_whitespace(&residual),
            });
        }

        let caps = CLOCK_TIME.captures(text).ok_or(ParseError::NoTimeFound)?;
        let whole = caps.get(0).ok_or(ParseError::NoTimeFound)?;
        let hour: u32 = caps[1].parse().map_err(|_| ParseError::NoTimeFound)?;
        let minute: u32 = caps[2].parse().map_err(|_| ParseError::NoTimeFound)?;
        let time = NaiveTime::from_hms_opt(hour, minute, 0).ok_or(ParseError::InvalidTimeValue { hour, minute })?;

        let residual = format!("{} {}", &text[..whole.start()], &text[whole.end()..]);
        Ok(TimeExpression {
            source: text.to_string(),
            marker: whole.range(),
            kind: MarkerKind::Clock,
            at: now.date().and_time(time),
            before: text[..whole.start()].trim().to_string(),
            after: text[whole.end()..].trim().to_string(),
            residual: collapse_whitespace(&residual),
        })
    }
}

impl Default for TimeParser {
    fn default() -> Self {
        Self::new(&["сейчас", "now"])
    }
}

fn casing_variants(keyword: &str) -> [String; 3] {
    let lower = keyword.to_lowercase();
    let mut chars = lower.chars();
    let capitalized = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };
    [lower.clone(), capitalized, keyword.to_uppercase()]
}

/// A segment made only of clock times is superseded by the keyword.
fn without_lone_clock(segment: &str) -> &str {
    let segment = segment.trim();
    if !segment.is_empty() && CLOCK_TIME.replace_all(segment, "").trim().is_empty() {
        ""
    } else {
        segment
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Read a statistics date argument relative to `today`.
///
/// Accepts today/yesterday words and `DD.MM.YYYY`, `DD.MM.YY`, `YYYY-MM-DD`,
/// `DD/MM/YYYY`.
pub fn parse_report_date(arg: &str, today: NaiveDate) -> Result<NaiveDate, ParseError> {
    let arg = arg.trim();
    match arg.to_lowercase().as_str() {
        "сегодня" | "today" => return Ok(today),
        "вчера" | "yesterday" => return Ok(today - Duration::days(1)),
        _ => {}
    }

    let dotted_format = match arg.rsplit('.').next() {
        Some(year) if arg.contains('.') && year.len() == 2 => "%d.%m.%y",
        _ => "%d.%m.%Y",
    };
    [dotted_format, "%Y-%m-%d", "%d/%m/%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(arg, fmt).ok())
        .ok_or_else(|| ParseError::InvalidDate(arg.to_string()))
}
