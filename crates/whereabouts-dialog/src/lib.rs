//! Whereabouts dialog crate - the conversation layer of the bot.
//!
//! Reads time markers and names out of free text, resolves people against
//! the roster, and drives the per-chat state machine that records leaves and
//! unplanned activities.

pub mod engine;
pub mod error;
pub mod intent;
pub mod parser;
pub mod report;
pub mod search;
pub mod session;
pub mod transport;

pub use engine::{Backends, DialogEngine, DialogOptions};
pub use error::DialogError;
pub use intent::{CallbackToken, Command};
pub use parser::{parse_report_date, FreeTextIntent, ParseError, TimeExpression, TimeParser};
pub use session::{DialogState, PendingAction};
pub use transport::{Choice, EventKind, InboundEvent, Outbound, TextFormat};
