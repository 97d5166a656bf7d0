//! Line-oriented console transport.
//!
//! Each stdin line becomes one inbound event for a fixed chat and sender.
//! Inline buttons are pressed with `/select <id>`, `/yes`, `/no` or
//! `/press <token>`; a roster file is attached with `/attach <path>`.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

use whereabouts_core::types::{ChatId, PersonId, UserId};
use whereabouts_dialog::{CallbackToken, DialogEngine, InboundEvent, Outbound};

const ROSTER_CAPTION: &str = "/add_excel";

/// Map one input line to an event. Blank lines yield `None`.
pub fn parse_line(line: &str, chat: ChatId, sender: UserId) -> Option<InboundEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };

    let event = match head {
        "/select" => match rest.parse::<i64>() {
            Ok(id) => InboundEvent::callback(
                chat,
                sender,
                CallbackToken::Select(PersonId(id)).to_string(),
            ),
            Err(_) => InboundEvent::callback(chat, sender, rest),
        },
        "/yes" if rest.is_empty() => {
            InboundEvent::callback(chat, sender, CallbackToken::ConfirmYes.to_string())
        }
        "/no" if rest.is_empty() => {
            InboundEvent::callback(chat, sender, CallbackToken::ConfirmNo.to_string())
        }
        "/press" => InboundEvent::callback(chat, sender, rest),
        "/attach" => {
            let (path, caption) = match rest.split_once(char::is_whitespace) {
                Some((path, caption)) => (path, caption.trim()),
                None => (rest, ROSTER_CAPTION),
            };
            InboundEvent::document(chat, sender, caption, path)
        }
        _ => InboundEvent::text(chat, sender, line),
    };
    Some(event)
}

/// Render an outbound message for the terminal.
pub fn render(message: &Outbound) -> String {
    match message {
        Outbound::Text { text, .. } => text.clone(),
        Outbound::Choices { text, choices } => {
            let mut out = text.clone();
            for choice in choices {
                out.push_str(&format!("\n  [{}] -> /press {}", choice.label, choice.token));
            }
            out
        }
        Outbound::Menu { text, items } => format!("{}\n  menu: {}", text, items.join(" | ")),
        Outbound::Document { path, caption } => {
            format!("{}\n  file: {}", caption, path.display())
        }
    }
}

/// Render as a single JSON line.
pub fn render_json(message: &Outbound) -> String {
    serde_json::to_string(message).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to serialize outbound message");
        format!("{{\"type\":\"error\",\"error\":{:?}}}", e.to_string())
    })
}

/// Read stdin until EOF, feeding every line to the engine.
pub async fn run(
    engine: Arc<DialogEngine>,
    chat: ChatId,
    sender: UserId,
    json: bool,
) -> std::io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        let Some(event) = parse_line(&line, chat, sender) else {
            continue;
        };
        debug!(chat = chat.0, kind = ?event.kind, "Console event");

        let engine = engine.clone();
        let replies = tokio::task::spawn_blocking(move || engine.handle(&event))
            .await
            .map_err(std::io::Error::other)?;

        for reply in &replies {
            let rendered = if json {
                render_json(reply)
            } else {
                render(reply)
            };
            stdout.write_all(rendered.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
        }
        stdout.flush().await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use whereabouts_dialog::{Choice, EventKind};

    const CHAT: ChatId = ChatId(7);
    const USER: UserId = UserId(3);

    fn kind(line: &str) -> EventKind {
        parse_line(line, CHAT, USER).unwrap().kind
    }

    // ==================== Input mapping ====================

    #[test]
    fn test_blank_line_is_skipped() {
        assert!(parse_line("   ", CHAT, USER).is_none());
    }

    #[test]
    fn test_plain_text_passes_through() {
        assert_eq!(kind("  Петров 14:30 "), EventKind::Text("Петров 14:30".into()));
        assert_eq!(kind("/stat 06.05.2024"), EventKind::Text("/stat 06.05.2024".into()));
    }

    #[test]
    fn test_button_presses() {
        assert_eq!(kind("/select 12"), EventKind::Callback("select_sub_12".into()));
        assert_eq!(kind("/yes"), EventKind::Callback("confirm_yes".into()));
        assert_eq!(kind("/no"), EventKind::Callback("confirm_no".into()));
        assert_eq!(kind("/press select_sub_4"), EventKind::Callback("select_sub_4".into()));
    }

    #[test]
    fn test_attach_defaults_to_roster_caption() {
        match kind("/attach /tmp/staff.xlsx") {
            EventKind::Document {
                caption,
                file_name,
                path,
            } => {
                assert_eq!(caption, "/add_excel");
                assert_eq!(file_name, "staff.xlsx");
                assert_eq!(path, PathBuf::from("/tmp/staff.xlsx"));
            }
            other => panic!("unexpected kind: {:?}", other),
        }

        match kind("/attach /tmp/notes.xlsx hello") {
            EventKind::Document { caption, .. } => assert_eq!(caption, "hello"),
            other => panic!("unexpected kind: {:?}", other),
        }
    }

    #[test]
    fn test_event_carries_chat_and_sender() {
        let event = parse_line("/start", CHAT, USER).unwrap();
        assert_eq!(event.chat_id, CHAT);
        assert_eq!(event.sender, USER);
    }

    // ==================== Rendering ====================

    #[test]
    fn test_render_choices_lists_tokens() {
        let message = Outbound::choices(
            "Pick a person:",
            vec![Choice::new("Петров Иван", "select_sub_1")],
        );
        let rendered = render(&message);
        assert!(rendered.starts_with("Pick a person:"));
        assert!(rendered.contains("[Петров Иван] -> /press select_sub_1"));
    }

    #[test]
    fn test_render_json_is_tagged() {
        let rendered = render_json(&Outbound::plain("ok"));
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value["type"], "text");
        assert_eq!(value["text"], "ok");
    }
}
