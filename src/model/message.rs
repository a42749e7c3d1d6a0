//! Outgoing message payloads.

use serde::{Deserialize, Serialize};

/// Something the transport can deliver to a chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Message {
    /// HTML-formatted text.
    Text { text: String },
    /// A photo by URL with an HTML caption.
    Photo { url: String, caption: String },
    /// A copy of an existing message, keeping its exact content and format.
    Copy { from_chat_id: i64, message_id: i64 },
}

impl Message {
    pub fn text(text: impl Into<String>) -> Self {
        Message::Text { text: text.into() }
    }

    pub fn copy_of(from_chat_id: i64, message_id: i64) -> Self {
        Message::Copy {
            from_chat_id,
            message_id,
        }
    }
}
