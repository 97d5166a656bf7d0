//! Recognition of commands, menu buttons and callback tokens.

use std::fmt;
use std::str::FromStr;

use whereabouts_core::types::PersonId;

pub const BUTTON_LEAVE: &str = "Зафиксировать уход";
pub const BUTTON_ACTIVITY: &str = "Внеплановая деятельность";
pub const BUTTON_STATUS: &str = "Где подчинённые";
pub const BUTTON_STATISTICS: &str = "Статистика";
pub const BUTTON_CANCEL: &str = "Отмена";

/// Main menu, in display order.
pub const MAIN_MENU: [&str; 4] = [BUTTON_LEAVE, BUTTON_ACTIVITY, BUTTON_STATUS, BUTTON_STATISTICS];

const SELECT_PREFIX: &str = "select_sub_";

/// What a text message asks for, before any session state is considered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    RecordLeave,
    RecordActivity,
    Status,
    StatisticsHelp,
    /// `/stat <arg>`; `excel` asks for the spreadsheet export.
    Statistics(String),
    ImportRoster,
    Cancel,
    /// Anything else: a description, a time expression or noise.
    FreeText(String),
}

impl Command {
    pub fn detect(text: &str) -> Self {
        let trimmed = text.trim();
        let (head, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (trimmed, ""),
        };
        // Telegram-style "/cmd@botname".
        let head = head.split('@').next().unwrap_or(head);

        match head {
            "/start" | "/help" => return Command::Start,
            "/leave" => return Command::RecordLeave,
            "/activity" => return Command::RecordActivity,
            "/where" | "/status" => return Command::Status,
            "/cancel" => return Command::Cancel,
            "/add_excel" => return Command::ImportRoster,
            "/stat" if rest.is_empty() => return Command::StatisticsHelp,
            "/stat" => return Command::Statistics(rest.to_string()),
            _ => {}
        }

        match trimmed {
            BUTTON_LEAVE => Command::RecordLeave,
            BUTTON_ACTIVITY => Command::RecordActivity,
            BUTTON_STATUS => Command::Status,
            BUTTON_STATISTICS => Command::StatisticsHelp,
            BUTTON_CANCEL => Command::Cancel,
            _ => Command::FreeText(trimmed.to_string()),
        }
    }
}

/// Token carried by an inline button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackToken {
    Select(PersonId),
    ConfirmYes,
    ConfirmNo,
}

impl fmt::Display for CallbackToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackToken::Select(id) => write!(f, "{}{}", SELECT_PREFIX, id.0),
            CallbackToken::ConfirmYes => f.write_str("confirm_yes"),
            CallbackToken::ConfirmNo => f.write_str("confirm_no"),
        }
    }
}

impl FromStr for CallbackToken {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirm_yes" => Ok(CallbackToken::ConfirmYes),
            "confirm_no" => Ok(CallbackToken::ConfirmNo),
            _ => s
                .strip_prefix(SELECT_PREFIX)
                .and_then(|id| id.parse::<i64>().ok())
                .map(|id| CallbackToken::Select(PersonId(id)))
                .ok_or_else(|| format!("unknown callback token: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_slash_commands() {
        assert_eq!(Command::detect("/start"), Command::Start);
        assert_eq!(Command::detect("/stat"), Command::StatisticsHelp);
        assert_eq!(
            Command::detect("/stat  вчера "),
            Command::Statistics("вчера".to_string())
        );
        assert_eq!(
            Command::detect("/stat@whereabouts_bot excel"),
            Command::Statistics("excel".to_string())
        );
        assert_eq!(Command::detect("/add_excel"), Command::ImportRoster);
        assert_eq!(Command::detect("/cancel"), Command::Cancel);
    }

    #[test]
    fn test_detect_menu_buttons() {
        assert_eq!(Command::detect(BUTTON_LEAVE), Command::RecordLeave);
        assert_eq!(Command::detect(BUTTON_ACTIVITY), Command::RecordActivity);
        assert_eq!(Command::detect(" Где подчинённые "), Command::Status);
        assert_eq!(Command::detect(BUTTON_STATISTICS), Command::StatisticsHelp);
    }

    #[test]
    fn test_detect_free_text() {
        assert_eq!(
            Command::detect("  Петров 14:30 "),
            Command::FreeText("Петров 14:30".to_string())
        );
        assert_eq!(Command::detect("/unknown"), Command::FreeText("/unknown".to_string()));
    }

    #[test]
    fn test_callback_token_display_and_parse() {
        let token = CallbackToken::Select(PersonId(42));
        assert_eq!(token.to_string(), "select_sub_42");
        assert_eq!("select_sub_42".parse::<CallbackToken>().unwrap(), token);
        assert_eq!(
            "confirm_yes".parse::<CallbackToken>().unwrap(),
            CallbackToken::ConfirmYes
        );
        assert_eq!(
            "confirm_no".parse::<CallbackToken>().unwrap(),
            CallbackToken::ConfirmNo
        );
    }

    #[test]
    fn test_callback_token_rejects_garbage() {
        assert!("select_sub_abc".parse::<CallbackToken>().is_err());
        assert!("select_sub_".parse::<CallbackToken>().is_err());
        assert!("confirm_maybe".parse::<CallbackToken>().is_err());
    }
}
