//! Per-chat conversation sessions with inactivity expiry.
//!
//! A chat without a session is idle. Each chat owns one slot behind its own
//! mutex; the engine holds that mutex for the whole handling of an event, so
//! events of one chat are processed one at a time while other chats proceed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{Duration, NaiveDateTime};
use tracing::debug;

use whereabouts_core::error::WhereaboutsError;
use whereabouts_core::types::{ChatId, PersonId};

use crate::error::DialogError;

/// The record a multi-step flow will write once the person is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingAction {
    Leave { at: NaiveDateTime },
    Activity { at: NaiveDateTime, description: String },
}

impl PendingAction {
    pub fn at(&self) -> NaiveDateTime {
        match self {
            PendingAction::Leave { at } | PendingAction::Activity { at, .. } => *at,
        }
    }
}

/// Non-idle conversation states, each carrying the data it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogState {
    AwaitingLeaveSelection {
        candidates: Vec<PersonId>,
    },
    AwaitingActivityPersonSelection {
        candidates: Vec<PersonId>,
    },
    /// Person chosen; the activity started when the choice was made.
    AwaitingActivityDescription {
        person: PersonId,
        at: NaiveDateTime,
    },
    AwaitingDisambiguation {
        candidates: Vec<PersonId>,
        pending: PendingAction,
    },
    AwaitingConfirmation {
        person: PersonId,
        pending: PendingAction,
    },
}

impl DialogState {
    pub fn name(&self) -> &'static str {
        match self {
            DialogState::AwaitingLeaveSelection { .. } => "awaiting_leave_selection",
            DialogState::AwaitingActivityPersonSelection { .. } => {
                "awaiting_activity_person_selection"
            }
            DialogState::AwaitingActivityDescription { .. } => "awaiting_activity_description",
            DialogState::AwaitingDisambiguation { .. } => "awaiting_disambiguation",
            DialogState::AwaitingConfirmation { .. } => "awaiting_confirmation",
        }
    }

    /// Candidates offered for selection, if the state expects a selection.
    pub fn candidates(&self) -> Option<&[PersonId]> {
        match self {
            DialogState::AwaitingLeaveSelection { candidates }
            | DialogState::AwaitingActivityPersonSelection { candidates }
            | DialogState::AwaitingDisambiguation { candidates, .. } => Some(candidates),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub state: DialogState,
    pub touched_at: NaiveDateTime,
}

/// Session slot of a single chat.
#[derive(Debug, Default)]
pub struct Slot {
    session: Option<Session>,
    /// When a session was dropped for inactivity. Cleared once reported,
    /// or forgotten after another TTL without a follow-up.
    expired_at: Option<NaiveDateTime>,
}

impl Slot {
    /// Drop the session if it has been idle longer than `ttl`.
    fn expire(&mut self, now: NaiveDateTime, ttl: Duration) -> bool {
        if self.expired_at.is_some_and(|since| now - since > ttl) {
            self.expired_at = None;
        }
        match &self.session {
            Some(session) if now - session.touched_at > ttl => {
                debug!(state = session.state.name(), "Session expired");
                self.session = None;
                self.expired_at = Some(now);
                true
            }
            _ => false,
        }
    }

    pub fn state(&self) -> Option<&DialogState> {
        self.session.as_ref().map(|s| &s.state)
    }

    pub fn set(&mut self, state: DialogState, now: NaiveDateTime) {
        self.session = Some(Session {
            state,
            touched_at: now,
        });
        self.expired_at = None;
    }

    pub fn clear(&mut self) {
        self.session = None;
        self.expired_at = None;
    }

    /// Report (once) whether the last session ended by expiry.
    pub fn take_expired(&mut self) -> bool {
        self.expired_at.take().is_some()
    }

    fn is_vacant(&self) -> bool {
        self.session.is_none() && self.expired_at.is_none()
    }
}

/// All sessions, keyed by chat.
#[derive(Debug)]
pub struct SessionStore {
    slots: Mutex<HashMap<ChatId, Arc<Mutex<Slot>>>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl_minutes: u32) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            ttl: Duration::minutes(i64::from(ttl_minutes)),
        }
    }

    /// Lock the slot of `chat`, creating it on first use, and apply expiry.
    pub fn with_slot<T>(
        &self,
        chat: ChatId,
        now: NaiveDateTime,
        f: impl FnOnce(&mut Slot) -> T,
    ) -> Result<T, DialogError> {
        let slot = {
            let mut slots = self.lock_slots()?;
            slots.entry(chat).or_default().clone()
        };
        let mut guard = slot
            .lock()
            .map_err(|e| poisoned(format!("session lock poisoned: {}", e)))?;
        guard.expire(now, self.ttl);
        Ok(f(&mut guard))
    }

    /// Expire idle sessions and forget vacant slots. Returns how many
    /// sessions expired. Slots held by an in-flight event are skipped.
    pub fn purge_expired(&self, now: NaiveDateTime) -> Result<usize, DialogError> {
        let mut slots = self.lock_slots()?;
        let mut expired = 0;
        slots.retain(|_, slot| {
            // Another handle means an event cloned the slot and may not have
            // locked it yet.
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            match slot.try_lock() {
                Ok(mut guard) => {
                    if guard.expire(now, self.ttl) {
                        expired += 1;
                    }
                    !guard.is_vacant()
                }
                Err(_) => true,
            }
        });
        Ok(expired)
    }

    /// Number of chats with a live (non-idle) session.
    pub fn active_count(&self) -> Result<usize, DialogError> {
        let slots = self.lock_slots()?;
        Ok(slots
            .values()
            .filter(|slot| {
                slot.try_lock()
                    .map(|guard| guard.session.is_some())
                    .unwrap_or(true)
            })
            .count())
    }

    fn lock_slots(&self) -> Result<MutexGuard<'_, HashMap<ChatId, Arc<Mutex<Slot>>>>, DialogError> {
        self.slots
            .lock()
            .map_err(|e| poisoned(format!("session map lock poisoned: {}", e)))
    }
}

fn poisoned(message: String) -> DialogError {
    DialogError::Backend(WhereaboutsError::Storage(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 6)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn leave_selection() -> DialogState {
        DialogState::AwaitingLeaveSelection {
            candidates: vec![PersonId(1), PersonId(2)],
        }
    }

    #[test]
    fn test_new_chat_is_idle() {
        let store = SessionStore::new(30);
        let state = store
            .with_slot(ChatId(1), at(10, 0), |slot| slot.state().cloned())
            .unwrap();
        assert!(state.is_none());
    }

    #[test]
    fn test_set_and_read_back() {
        let store = SessionStore::new(30);
        store
            .with_slot(ChatId(1), at(10, 0), |slot| slot.set(leave_selection(), at(10, 0)))
            .unwrap();
        let state = store
            .with_slot(ChatId(1), at(10, 20), |slot| slot.state().cloned())
            .unwrap();
        assert_eq!(state, Some(leave_selection()));
        assert_eq!(store.active_count().unwrap(), 1);
    }

    #[test]
    fn test_sessions_are_per_chat() {
        let store = SessionStore::new(30);
        store
            .with_slot(ChatId(1), at(10, 0), |slot| slot.set(leave_selection(), at(10, 0)))
            .unwrap();
        let other = store
            .with_slot(ChatId(2), at(10, 0), |slot| slot.state().cloned())
            .unwrap();
        assert!(other.is_none());
    }

    #[test]
    fn test_expiry_on_access_is_reported_once() {
        let store = SessionStore::new(30);
        store
            .with_slot(ChatId(1), at(10, 0), |slot| slot.set(leave_selection(), at(10, 0)))
            .unwrap();

        let (state, expired) = store
            .with_slot(ChatId(1), at(10, 31), |slot| {
                (slot.state().cloned(), slot.take_expired())
            })
            .unwrap();
        assert!(state.is_none());
        assert!(expired);

        let expired_again = store
            .with_slot(ChatId(1), at(10, 32), |slot| slot.take_expired())
            .unwrap();
        assert!(!expired_again);
    }

    #[test]
    fn test_purge_expired() {
        let store = SessionStore::new(30);
        store
            .with_slot(ChatId(1), at(10, 0), |slot| slot.set(leave_selection(), at(10, 0)))
            .unwrap();
        store
            .with_slot(ChatId(2), at(10, 25), |slot| slot.set(leave_selection(), at(10, 25)))
            .unwrap();
        // Touched but idle chat: forgotten by the sweep.
        store.with_slot(ChatId(3), at(10, 25), |_| ()).unwrap();

        assert_eq!(store.purge_expired(at(10, 40)).unwrap(), 1);
        assert_eq!(store.active_count().unwrap(), 1);

        // The expired chat still learns about it on its next event.
        let expired = store
            .with_slot(ChatId(1), at(10, 41), |slot| slot.take_expired())
            .unwrap();
        assert!(expired);
    }

    #[test]
    fn test_expiry_flag_is_forgotten_after_another_ttl() {
        let store = SessionStore::new(30);
        store
            .with_slot(ChatId(1), at(10, 0), |slot| slot.set(leave_selection(), at(10, 0)))
            .unwrap();

        // First sweep expires the session and keeps the flag.
        assert_eq!(store.purge_expired(at(10, 31)).unwrap(), 1);
        assert_eq!(store.slots.lock().unwrap().len(), 1);

        // A second TTL later the flag is dropped and so is the slot.
        assert_eq!(store.purge_expired(at(11, 2)).unwrap(), 0);
        assert!(store.slots.lock().unwrap().is_empty());

        let expired = store
            .with_slot(ChatId(1), at(11, 3), |slot| slot.take_expired())
            .unwrap();
        assert!(!expired);
    }

    #[test]
    fn test_sweep_never_drops_a_slot_in_use() {
        let store = Arc::new(SessionStore::new(30));
        let stop = Arc::new(AtomicBool::new(false));

        let sweeper = {
            let store = Arc::clone(&store);
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    store.purge_expired(at(10, 0)).unwrap();
                }
            })
        };

        let mut lost = 0;
        for i in 0..20_000 {
            let chat = ChatId(i);
            store
                .with_slot(chat, at(10, 0), |slot| slot.set(leave_selection(), at(10, 0)))
                .unwrap();
            let state = store
                .with_slot(chat, at(10, 0), |slot| slot.state().cloned())
                .unwrap();
            if state.is_none() {
                lost += 1;
            }
        }

        stop.store(true, Ordering::Relaxed);
        sweeper.join().unwrap();
        assert_eq!(lost, 0);
    }

    #[test]
    fn test_clear_resets_expiry_flag() {
        let mut slot = Slot::default();
        slot.set(leave_selection(), at(9, 0));
        assert!(slot.expire(at(12, 0), Duration::minutes(30)));
        slot.clear();
        assert!(!slot.take_expired());
    }

    #[test]
    fn test_candidates_accessor() {
        assert_eq!(leave_selection().candidates().unwrap().len(), 2);
        let describing = DialogState::AwaitingActivityDescription {
            person: PersonId(1),
            at: at(12, 0),
        };
        assert!(describing.candidates().is_none());
        assert_eq!(describing.name(), "awaiting_activity_description");
    }

    #[test]
    fn test_pending_action_time() {
        let pending = PendingAction::Activity {
            at: at(15, 0),
            description: "meeting".to_string(),
        };
        assert_eq!(pending.at(), at(15, 0));
    }
}
