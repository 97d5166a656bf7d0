//! Error types for the conversation layer.
//!
//! Every variant is reported back to the chat; none of them changes stored
//! data.

use whereabouts_core::error::WhereaboutsError;

use crate::parser::ParseError;

#[derive(Debug, thiserror::Error)]
pub enum DialogError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("activity description is empty")]
    EmptyDescription,
    #[error("no person matches '{0}'")]
    PersonNotFound(String),
    #[error("the roster is empty")]
    NoPeopleRegistered,
    #[error("session expired")]
    SessionExpired,
    #[error("operation requires administrator rights")]
    NotPrivileged,
    #[error("selection is not one of the offered options")]
    UnknownSelection,
    #[error("unrecognized input")]
    UnrecognizedInput,
    #[error("a spreadsheet attachment is required")]
    MissingAttachment,
    #[error("unsupported file '{0}'")]
    UnsupportedFile(String),
    #[error("backend error: {0}")]
    Backend(#[from] WhereaboutsError),
}

impl DialogError {
    /// Message shown to the user. Backend details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            DialogError::Parse(ParseError::NoTimeFound) => {
                "No time found. Send a time like 14:30 or the word \"сейчас\".".to_string()
            }
            DialogError::Parse(ParseError::InvalidTimeValue { hour, minute }) => format!(
                "Invalid time {}:{:02}. Hours must be 0-23 and minutes 0-59.",
                hour, minute
            ),
            DialogError::Parse(ParseError::EmptySearchTerm) => {
                "Add a surname, for example: Петров 14:30.".to_string()
            }
            DialogError::Parse(ParseError::InvalidDate(raw)) => format!(
                "Cannot read the date '{}'. Use DD.MM.YYYY, DD.MM.YY, сегодня or вчера.",
                raw
            ),
            DialogError::EmptyDescription => {
                "The description is empty. Describe the activity.".to_string()
            }
            DialogError::PersonNotFound(key) => format!("Nobody matches \"{}\".", key),
            DialogError::NoPeopleRegistered => {
                "The roster is empty. An administrator can import it with /add_excel.".to_string()
            }
            DialogError::SessionExpired => {
                "The session has expired. Please start again.".to_string()
            }
            DialogError::NotPrivileged => {
                "This command is available to administrators only.".to_string()
            }
            DialogError::UnknownSelection => {
                "That option is not available. Pick one from the list.".to_string()
            }
            DialogError::UnrecognizedInput => {
                "Unknown command. Use the menu or send \"Surname 14:30\".".to_string()
            }
            DialogError::MissingAttachment => {
                "Attach an .xlsx file with the caption /add_excel.".to_string()
            }
            DialogError::UnsupportedFile(name) => {
                format!("\"{}\" is not an .xlsx or .xls file.", name)
            }
            DialogError::Backend(_) => "Something went wrong. Please try again.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialog_error_display() {
        assert_eq!(
            DialogError::from(ParseError::NoTimeFound).to_string(),
            "no time found in message"
        );
        assert_eq!(
            DialogError::PersonNotFound("Petrov".into()).to_string(),
            "no person matches 'Petrov'"
        );
        assert_eq!(DialogError::SessionExpired.to_string(), "session expired");
        assert_eq!(
            DialogError::Backend(WhereaboutsError::Storage("locked".into())).to_string(),
            "backend error: Storage error: locked"
        );
    }

    #[test]
    fn test_user_message_hides_backend_details() {
        let err = DialogError::Backend(WhereaboutsError::Storage("disk I/O".into()));
        assert!(!err.user_message().contains("disk"));
    }

    #[test]
    fn test_user_message_invalid_time() {
        let err = DialogError::from(ParseError::InvalidTimeValue {
            hour: 25,
            minute: 7,
        });
        assert!(err.user_message().contains("25:07"));
    }
}
