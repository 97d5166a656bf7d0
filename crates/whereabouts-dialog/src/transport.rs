//! Inbound events and outbound messages exchanged with a chat transport.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use whereabouts_core::types::{ChatId, UserId};

/// An event delivered by the chat transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    pub chat_id: ChatId,
    pub sender: UserId,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum EventKind {
    /// A typed message or a main-menu button press.
    Text(String),
    /// An inline button press carrying its token.
    Callback(String),
    /// A file that has already been downloaded to `path`.
    Document {
        caption: String,
        file_name: String,
        path: PathBuf,
    },
}

impl InboundEvent {
    pub fn text(chat_id: ChatId, sender: UserId, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            sender,
            kind: EventKind::Text(text.into()),
        }
    }

    pub fn callback(chat_id: ChatId, sender: UserId, token: impl Into<String>) -> Self {
        Self {
            chat_id,
            sender,
            kind: EventKind::Callback(token.into()),
        }
    }

    pub fn document(
        chat_id: ChatId,
        sender: UserId,
        caption: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Self {
            chat_id,
            sender,
            kind: EventKind::Document {
                caption: caption.into(),
                file_name,
                path,
            },
        }
    }
}

/// A selectable option: a human label plus the token sent back on press.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub label: String,
    pub token: String,
}

impl Choice {
    pub fn new(label: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            token: token.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextFormat {
    Plain,
    Markdown,
}

/// A message for the transport to deliver to the chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    Text { text: String, format: TextFormat },
    Choices { text: String, choices: Vec<Choice> },
    /// Persistent main menu.
    Menu { text: String, items: Vec<String> },
    Document { path: PathBuf, caption: String },
}

impl Outbound {
    pub fn plain(text: impl Into<String>) -> Self {
        Outbound::Text {
            text: text.into(),
            format: TextFormat::Plain,
        }
    }

    pub fn markdown(text: impl Into<String>) -> Self {
        Outbound::Text {
            text: text.into(),
            format: TextFormat::Markdown,
        }
    }

    pub fn choices(text: impl Into<String>, choices: Vec<Choice>) -> Self {
        Outbound::Choices {
            text: text.into(),
            choices,
        }
    }

    /// The human-readable text of the message.
    pub fn text(&self) -> &str {
        match self {
            Outbound::Text { text, .. }
            | Outbound::Choices { text, .. }
            | Outbound::Menu { text, .. } => text,
            Outbound::Document { caption, .. } => caption,
        }
    }
}
