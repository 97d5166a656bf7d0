//! Conversation state machine.
//!
//! [`DialogEngine::handle`] turns one inbound event into the messages to send
//! back. It locks the chat's session slot for the whole event, reads the
//! state, calls the directory, store and spreadsheet collaborators, and only
//! moves to the next state once every call has succeeded. A failed step
//! leaves the session exactly as it was.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::{debug, error, info, warn};

use whereabouts_core::access::AccessPolicy;
use whereabouts_core::clock::Clock;
use whereabouts_core::config::WhereaboutsConfig;
use whereabouts_core::traits::{PersonDirectory, Spreadsheets, StatusStore};
use whereabouts_core::types::{truncate_description, ChatId, Person, PersonId, UserId};

use crate::error::DialogError;
use crate::intent::{CallbackToken, Command, MAIN_MENU};
use crate::parser::{parse_report_date, FreeTextIntent, ParseError, TimeParser};
use crate::report;
use crate::search::find_people;
use crate::session::{DialogState, PendingAction, SessionStore, Slot};
use crate::transport::{Choice, EventKind, InboundEvent, Outbound};

/// Tunables of the engine, usually taken from the configuration file.
#[derive(Debug, Clone)]
pub struct DialogOptions {
    pub access: AccessPolicy,
    pub now_keywords: Vec<String>,
    pub session_ttl_minutes: u32,
    pub confirm_overwrites: bool,
    pub export_dir: PathBuf,
}

impl DialogOptions {
    pub fn from_config(config: &WhereaboutsConfig, data_dir: &Path) -> Self {
        Self {
            access: AccessPolicy::from_config(&config.access),
            now_keywords: config.dialog.now_keywords.clone(),
            session_ttl_minutes: config.dialog.session_ttl_minutes,
            confirm_overwrites: config.dialog.confirm_overwrites,
            export_dir: config.export.resolve_dir(data_dir),
        }
    }
}

impl Default for DialogOptions {
    fn default() -> Self {
        Self::from_config(&WhereaboutsConfig::default(), Path::new("."))
    }
}

/// Collaborators the engine talks to.
#[derive(Clone)]
pub struct Backends {
    pub directory: Arc<dyn PersonDirectory>,
    pub store: Arc<dyn StatusStore>,
    pub sheets: Arc<dyn Spreadsheets>,
    pub clock: Arc<dyn Clock>,
}

pub struct DialogEngine {
    backends: Backends,
    parser: TimeParser,
    sessions: SessionStore,
    options: DialogOptions,
}

impl DialogEngine {
    pub fn new(backends: Backends, options: DialogOptions) -> Self {
        Self {
            parser: TimeParser::new(options.now_keywords.as_slice()),
            sessions: SessionStore::new(options.session_ttl_minutes),
            backends,
            options,
        }
    }

    /// Handle one inbound event. Errors are turned into a reply.
    pub fn handle(&self, event: &InboundEvent) -> Vec<Outbound> {
        let now = self.backends.clock.now();
        let result = self
            .sessions
            .with_slot(event.chat_id, now, |slot| self.dispatch(slot, event, now))
            .and_then(|inner| inner);

        match result {
            Ok(replies) => replies,
            Err(DialogError::Backend(cause)) => {
                error!(chat = event.chat_id.0, error = %cause, "Backend failure");
                vec![Outbound::plain(DialogError::Backend(cause).user_message())]
            }
            Err(err) => {
                debug!(chat = event.chat_id.0, error = %err, "Rejected input");
                vec![Outbound::plain(err.user_message())]
            }
        }
    }

    /// Drop sessions idle for longer than the TTL.
    pub fn purge_expired(&self) -> Result<usize, DialogError> {
        self.sessions.purge_expired(self.backends.clock.now())
    }

    pub fn active_sessions(&self) -> Result<usize, DialogError> {
        self.sessions.active_count()
    }

    /// Current state of a chat, `None` when idle.
    pub fn state_of(&self, chat: ChatId) -> Option<DialogState> {
        let now = self.backends.clock.now();
        self.sessions
            .with_slot(chat, now, |slot| slot.state().cloned())
            .ok()
            .flatten()
    }

    fn dispatch(
        &self,
        slot: &mut Slot,
        event: &InboundEvent,
        now: NaiveDateTime,
    ) -> Result<Vec<Outbound>, DialogError> {
        match &event.kind {
            EventKind::Text(text) => self.on_text(slot, event.sender, text, now),
            EventKind::Callback(token) => self.on_callback(slot, token, now),
            EventKind::Document {
                caption,
                file_name,
                path,
            } => self.on_document(event.sender, caption, file_name, path),
        }
    }

    // =========================================================================
    // Text
    // =========================================================================

    fn on_text(
        &self,
        slot: &mut Slot,
        sender: UserId,
        text: &str,
        now: NaiveDateTime,
    ) -> Result<Vec<Outbound>, DialogError> {
        match Command::detect(text) {
            Command::Start => Ok(vec![Outbound::Menu {
                text: "Choose an action or send \"Surname 14:30\" / \"Surname сейчас\"."
                    .to_string(),
                items: MAIN_MENU.iter().map(|s| s.to_string()).collect(),
            }]),
            Command::RecordLeave => {
                let people = self.roster()?;
                let choices = selection_choices(&people);
                slot.set(
                    DialogState::AwaitingLeaveSelection {
                        candidates: ids(&people),
                    },
                    now,
                );
                Ok(vec![Outbound::choices("Who is leaving?", choices)])
            }
            Command::RecordActivity => {
                let people = self.roster()?;
                let choices = selection_choices(&people);
                slot.set(
                    DialogState::AwaitingActivityPersonSelection {
                        candidates: ids(&people),
                    },
                    now,
                );
                Ok(vec![Outbound::choices(
                    "Who is busy with an unplanned activity?",
                    choices,
                )])
            }
            Command::Status => self.status(now),
            Command::StatisticsHelp => Ok(vec![Outbound::plain(report::statistics_help())]),
            Command::Statistics(arg) => self.statistics(sender, &arg),
            Command::ImportRoster => Err(DialogError::MissingAttachment),
            Command::Cancel => {
                slot.clear();
                Ok(vec![Outbound::plain("Cancelled.")])
            }
            Command::FreeText(text) => self.on_free_text(slot, &text, now),
        }
    }

    fn on_free_text(
        &self,
        slot: &mut Slot,
        text: &str,
        now: NaiveDateTime,
    ) -> Result<Vec<Outbound>, DialogError> {
        if let Some(DialogState::AwaitingActivityDescription { person, at }) = slot.state() {
            let (person, at) = (*person, *at);
            if text.trim().is_empty() {
                return Err(DialogError::EmptyDescription);
            }
            let pending = PendingAction::Activity {
                at,
                description: text.trim().to_string(),
            };
            return self.commit_or_confirm(slot, person, pending, now);
        }

        if !self.parser.contains_time_marker(text) {
            if slot.take_expired() {
                return Err(DialogError::SessionExpired);
            }
            if slot.state().and_then(DialogState::candidates).is_some() {
                return Err(DialogError::UnknownSelection);
            }
            return Err(DialogError::UnrecognizedInput);
        }

        let expr = self.parser.parse(text, now)?;
        let (key, pending) = match expr.intent() {
            FreeTextIntent::Leave { key } => (key, PendingAction::Leave { at: expr.at() }),
            FreeTextIntent::Activity { key, description } => (
                key,
                PendingAction::Activity {
                    at: expr.at(),
                    description: description.to_string(),
                },
            ),
        };
        if key.is_empty() {
            return Err(ParseError::EmptySearchTerm.into());
        }

        let people = find_people(self.backends.directory.as_ref(), key)?;
        if let [person] = people.as_slice() {
            return self.commit_or_confirm(slot, person.id, pending, now);
        }

        info!(key, candidates = people.len(), "Ambiguous name, asking to choose");
        let choices = selection_choices(&people);
        slot.set(
            DialogState::AwaitingDisambiguation {
                candidates: ids(&people),
                pending,
            },
            now,
        );
        Ok(vec![Outbound::choices(
            format!("Several people match \"{}\". Who did you mean?", key),
            choices,
        )])
    }

    // =========================================================================
    // Callbacks
    // =========================================================================

    fn on_callback(
        &self,
        slot: &mut Slot,
        raw: &str,
        now: NaiveDateTime,
    ) -> Result<Vec<Outbound>, DialogError> {
        let token: CallbackToken = raw.parse().map_err(|e: String| {
            warn!(token = raw, error = %e, "Unparseable callback");
            DialogError::UnknownSelection
        })?;

        let Some(state) = slot.state().cloned() else {
            slot.take_expired();
            return Err(DialogError::SessionExpired);
        };

        match (state, token) {
            (DialogState::AwaitingLeaveSelection { candidates }, CallbackToken::Select(id)) => {
                ensure_offered(&candidates, id)?;
                self.commit_or_confirm(slot, id, PendingAction::Leave { at: now }, now)
            }
            (
                DialogState::AwaitingActivityPersonSelection { candidates },
                CallbackToken::Select(id),
            ) => {
                ensure_offered(&candidates, id)?;
                let person = self.person(id)?;
                slot.set(
                    DialogState::AwaitingActivityDescription { person: id, at: now },
                    now,
                );
                Ok(vec![Outbound::plain(format!(
                    "Describe the activity of {}:",
                    person.name
                ))])
            }
            (
                DialogState::AwaitingDisambiguation {
                    candidates,
                    pending,
                },
                CallbackToken::Select(id),
            ) => {
                ensure_offered(&candidates, id)?;
                self.commit_or_confirm(slot, id, pending, now)
            }
            (DialogState::AwaitingConfirmation { person, pending }, CallbackToken::ConfirmYes) => {
                let person = self.person(person)?;
                let reply = self.commit(&person, &pending)?;
                slot.clear();
                Ok(vec![reply])
            }
            (DialogState::AwaitingConfirmation { .. }, CallbackToken::ConfirmNo) => {
                slot.clear();
                Ok(vec![Outbound::plain("Cancelled. Nothing was changed.")])
            }
            (state, token) => {
                debug!(state = state.name(), %token, "Callback does not fit the state");
                Err(DialogError::UnknownSelection)
            }
        }
    }

    // =========================================================================
    // Documents
    // =========================================================================

    fn on_document(
        &self,
        sender: UserId,
        caption: &str,
        file_name: &str,
        path: &Path,
    ) -> Result<Vec<Outbound>, DialogError> {
        if Command::detect(caption) != Command::ImportRoster {
            return Err(DialogError::UnrecognizedInput);
        }
        self.require_privileged(sender)?;

        let lower = file_name.to_lowercase();
        if !(lower.ends_with(".xlsx") || lower.ends_with(".xls")) {
            return Err(DialogError::UnsupportedFile(file_name.to_string()));
        }

        let names = self.backends.sheets.read_roster(path)?;
        let mut seen = HashSet::new();
        let mut added = Vec::new();
        let mut skipped = 0;
        for name in names {
            if name.is_blank() || !seen.insert(name.key()) {
                skipped += 1;
                continue;
            }
            match self.backends.directory.insert_person(&name)? {
                Some(_) => added.push(name),
                None => skipped += 1,
            }
        }
        info!(
            user = sender.0,
            added = added.len(),
            skipped,
            "Roster imported"
        );

        let roster = self.backends.directory.all_people()?;
        Ok(report::import_summary(&added, skipped, &roster)
            .into_iter()
            .map(Outbound::plain)
            .collect())
    }

    // =========================================================================
    // Reports
    // =========================================================================

    fn status(&self, now: NaiveDateTime) -> Result<Vec<Outbound>, DialogError> {
        let people = self.roster()?;
        let leaves = self.backends.store.today_leaves()?;
        let activities = self.backends.store.today_activities()?;
        let rows = report::presence_of(&people, &leaves, &activities);
        Ok(vec![Outbound::plain(report::status_snapshot(now, &rows))])
    }

    fn statistics(&self, sender: UserId, arg: &str) -> Result<Vec<Outbound>, DialogError> {
        if arg.eq_ignore_ascii_case("excel") {
            self.require_privileged(sender)?;
            let rows = self.backends.store.export_rows()?;
            let path = self
                .backends
                .sheets
                .write_statistics(&rows, &self.options.export_dir)?;
            info!(user = sender.0, rows = rows.len(), path = %path.display(), "Statistics exported");
            return Ok(vec![Outbound::Document {
                path,
                caption: format!("Statistics export: {} records", rows.len()),
            }]);
        }

        let day = parse_report_date(arg, self.backends.clock.today())?;
        let entries = self.backends.store.leaves_on(day)?;
        Ok(vec![Outbound::plain(report::leaves_report(day, &entries))])
    }

    // =========================================================================
    // Commits
    // =========================================================================

    fn commit_or_confirm(
        &self,
        slot: &mut Slot,
        id: PersonId,
        pending: PendingAction,
        now: NaiveDateTime,
    ) -> Result<Vec<Outbound>, DialogError> {
        let person = self.person(id)?;

        if self.options.confirm_overwrites {
            if let Some(existing) = self.existing_same_kind(&person, &pending)? {
                let question = format!(
                    "{} already has {} today. Replace it?",
                    person.name, existing
                );
                slot.set(
                    DialogState::AwaitingConfirmation {
                        person: id,
                        pending,
                    },
                    now,
                );
                return Ok(vec![Outbound::choices(
                    question,
                    vec![
                        Choice::new("Yes", CallbackToken::ConfirmYes.to_string()),
                        Choice::new("No", CallbackToken::ConfirmNo.to_string()),
                    ],
                )]);
            }
        }

        let reply = self.commit(&person, &pending)?;
        slot.clear();
        Ok(vec![reply])
    }

    fn existing_same_kind(
        &self,
        person: &Person,
        pending: &PendingAction,
    ) -> Result<Option<String>, DialogError> {
        let day = pending.at().date();
        let existing = match pending {
            PendingAction::Leave { .. } => self
                .backends
                .store
                .leave_on(person.id, day)?
                .map(|t| format!("a leave at {}", t.format("%H:%M"))),
            PendingAction::Activity { .. } => self
                .backends
                .store
                .activity_on(person.id, day)?
                .map(|(t, d)| {
                    format!(
                        "an activity since {} ({})",
                        t.format("%H:%M"),
                        report::shorten(&d, 50)
                    )
                }),
        };
        Ok(existing)
    }

    fn commit(&self, person: &Person, pending: &PendingAction) -> Result<Outbound, DialogError> {
        match pending {
            PendingAction::Leave { at } => {
                self.backends.store.upsert_leave(person.id, *at)?;
                Ok(Outbound::plain(format!(
                    "Recorded: {} left at {}.",
                    person.name,
                    at.format("%H:%M")
                )))
            }
            PendingAction::Activity { at, description } => {
                if description.trim().is_empty() {
                    return Err(DialogError::EmptyDescription);
                }
                let description = truncate_description(description);
                self.backends
                    .store
                    .upsert_activity(person.id, *at, &description)?;
                Ok(Outbound::plain(format!(
                    "Recorded: {} is busy since {}: {}",
                    person.name,
                    at.format("%H:%M"),
                    description
                )))
            }
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn roster(&self) -> Result<Vec<Person>, DialogError> {
        let people = self.backends.directory.all_people()?;
        if people.is_empty() {
            return Err(DialogError::NoPeopleRegistered);
        }
        Ok(people)
    }

    fn person(&self, id: PersonId) -> Result<Person, DialogError> {
        self.backends
            .directory
            .person(id)?
            .ok_or_else(|| DialogError::PersonNotFound(format!("#{}", id)))
    }

    fn require_privileged(&self, user: UserId) -> Result<(), DialogError> {
        if self.options.access.is_privileged(user) {
            Ok(())
        } else {
            warn!(user = user.0, "Privileged command refused");
            Err(DialogError::NotPrivileged)
        }
    }
}

fn ids(people: &[Person]) -> Vec<PersonId> {
    people.iter().map(|p| p.id).collect()
}

fn selection_choices(people: &[Person]) -> Vec<Choice> {
    people
        .iter()
        .map(|p| Choice::new(p.short_label(), CallbackToken::Select(p.id).to_string()))
        .collect()
}

fn ensure_offered(candidates: &[PersonId], id: PersonId) -> Result<(), DialogError> {
    if candidates.contains(&id) {
        Ok(())
    } else {
        Err(DialogError::UnknownSelection)
    }
}
