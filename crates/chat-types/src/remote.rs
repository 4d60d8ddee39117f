//! Gateway results, independent of the HTTP wire format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::message::Message;

/// Outgoing chat turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub model: Option<String>,
    pub conversation_id: Option<String>,
}

/// Successful reply to a chat turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply_text: String,
    /// The backend's id for the conversation. May differ from the id sent.
    pub conversation_id: Option<String>,
}

/// Conversation as the backend knows it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConversation {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConversationSummary {
    pub id: String,
    pub title: String,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RemoteConversationList {
    /// Newest first
    pub conversations: Vec<RemoteConversationSummary>,
    pub current: Option<String>,
}
