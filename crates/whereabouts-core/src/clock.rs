//! Wall-clock abstraction.
//!
//! All "today" and "now" decisions go through a [`Clock`] so that the team's
//! local time (not the host's) is used and tests can pin the time.

use std::sync::Mutex;

use chrono::{Duration, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use tracing::warn;

pub trait Clock: Send + Sync {
    /// Current local date and time of the team.
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

/// System time shifted by a fixed UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    /// Build a clock for the given offset in hours. Out-of-range offsets
    /// fall back to UTC+3.
    pub fn with_offset_hours(hours: i32) -> Self {
        let offset = FixedOffset::east_opt(hours * 3600).unwrap_or_else(|| {
            warn!(hours, "Invalid UTC offset, falling back to UTC+3");
            moscow()
        });
        Self { offset }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self { offset: moscow() }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.offset).naive_local()
    }
}

fn moscow() -> FixedOffset {
    FixedOffset::east_opt(3 * 3600).expect("UTC+3 is a valid offset")
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<NaiveDateTime>,
}

impl ManualClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}
