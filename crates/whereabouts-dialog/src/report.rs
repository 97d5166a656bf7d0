//! Plain-text rendering of status snapshots, statistics and import results.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use whereabouts_core::types::{LeaveEntry, Person, PersonId, PersonName};

/// Longest description shown in the status snapshot.
const SNAPSHOT_DESCRIPTION_CHARS: usize = 50;
/// Soft limit for a single chat message listing people.
const MESSAGE_SOFT_LIMIT: usize = 3500;

/// Presence of one person today.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presence {
    Present,
    Left(NaiveTime),
    Busy(NaiveTime, String),
}

/// Work out everyone's presence. Activity takes priority over leave.
pub fn presence_of(
    people: &[Person],
    leaves: &HashMap<PersonId, NaiveTime>,
    activities: &HashMap<PersonId, (NaiveTime, String)>,
) -> Vec<(Person, Presence)> {
    let mut rows: Vec<(Person, Presence)> = people
        .iter()
        .map(|person| {
            let presence = if let Some((time, description)) = activities.get(&person.id) {
                Presence::Busy(*time, description.clone())
            } else if let Some(time) = leaves.get(&person.id) {
                Presence::Left(*time)
            } else {
                Presence::Present
            };
            (person.clone(), presence)
        })
        .collect();
    rows.sort_by(|(a, _), (b, _)| {
        (&a.name.last, &a.name.first).cmp(&(&b.name.last, &b.name.first))
    });
    rows
}

pub fn status_snapshot(now: NaiveDateTime, rows: &[(Person, Presence)]) -> String {
    let mut out = format!("Status on {}\n\n", now.format("%d.%m.%Y %H:%M"));
    let (mut present, mut left, mut busy) = (0, 0, 0);

    for (person, presence) in rows {
        let line = match presence {
            Presence::Present => {
                present += 1;
                "present".to_string()
            }
            Presence::Left(time) => {
                left += 1;
                format!("left at {}", time.format("%H:%M"))
            }
            Presence::Busy(time, description) => {
                busy += 1;
                format!(
                    "activity since {} - {}",
                    time.format("%H:%M"),
                    shorten(description, SNAPSHOT_DESCRIPTION_CHARS)
                )
            }
        };
        out.push_str(&format!("{}: {}\n", person.short_label(), line));
    }

    out.push_str(&format!(
        "\nTotal: {} | present: {} | left: {} | activity: {}",
        rows.len(),
        present,
        left,
        busy
    ));
    out
}

pub fn leaves_report(day: NaiveDate, entries: &[LeaveEntry]) -> String {
    let header = format!("Leaves on {}", day.format("%d.%m.%Y"));
    if entries.is_empty() {
        return format!("{}: no leave records.", header);
    }
    let mut out = format!("{} ({}):\n", header, entries.len());
    for entry in entries {
        out.push_str(&format!(
            "{} {}\n",
            entry.time.format("%H:%M"),
            entry.person.name
        ));
    }
    out.trim_end().to_string()
}

pub fn statistics_help() -> String {
    [
        "Statistics:",
        "/stat сегодня - leaves today",
        "/stat вчера - leaves yesterday",
        "/stat DD.MM.YYYY - leaves on a date (DD.MM.YY also works)",
        "/stat excel - spreadsheet with all records (administrators)",
    ]
    .join("\n")
}

/// Summary of a roster import: added people, then the whole roster.
pub fn import_summary(added: &[PersonName], skipped: usize, roster: &[Person]) -> Vec<String> {
    let mut first = if added.is_empty() {
        "No new people were added.".to_string()
    } else {
        let names: Vec<String> = added.iter().map(|n| n.to_string()).collect();
        bounded_list(&format!("Added {} people:", added.len()), &names)
    };
    if skipped > 0 {
        first.push_str(&format!("\nSkipped {} rows (duplicates or blank).", skipped));
    }

    let names: Vec<String> = roster.iter().map(|p| p.name.to_string()).collect();
    let second = bounded_list(&format!("Roster: {} people", roster.len()), &names);
    vec![first, second]
}

fn bounded_list(header: &str, items: &[String]) -> String {
    let mut out = header.to_string();
    for (i, item) in items.iter().enumerate() {
        let line = format!("\n{}. {}", i + 1, item);
        if out.len() + line.len() > MESSAGE_SOFT_LIMIT {
            out.push_str("\n... and others");
            break;
        }
        out.push_str(&line);
    }
    out
}

/// Cut `text` to `max` characters, ending with "..." when cut.
pub fn shorten(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}
