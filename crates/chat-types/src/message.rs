use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who authored a message.
///
/// Persisted as the `role` field: `"user"` or `"assistant"`. Older records
/// written with `"bot"` are still accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sender {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "assistant", alias = "bot")]
    Bot,
}

impl Sender {
    pub fn as_role(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Bot => "assistant",
        }
    }

    pub fn from_role(role: &str) -> Self {
        match role {
            "user" => Sender::User,
            _ => Sender::Bot,
        }
    }
}

/// A single chat turn. Immutable once appended to a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub id: String,
    pub content: String,
    #[serde(rename = "role")]
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

impl Message {
    pub fn new(id: impl Into<String>, sender: Sender, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            sender,
            timestamp: Utc::now(),
            conversation_id: None,
        }
    }

    pub fn user(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(id, Sender::User, content)
    }

    pub fn bot(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(id, Sender::Bot, content)
    }

    pub fn in_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn is_user(&self) -> bool {
        self.sender == Sender::User
    }
}
