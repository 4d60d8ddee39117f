use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::message::{Message, Sender};

pub const DEFAULT_TITLE: &str = "New Conversation";

/// Titles longer than this many characters are cut and suffixed with `...`.
pub const TITLE_MAX_CHARS: usize = 30;

/// A persisted conversation record.
///
/// This is also the on-disk layout: one `<id>.json` file per record for the
/// directory provider, one entry of the `conversations` mapping for the
/// key-value provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: DEFAULT_TITLE.to_string(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a message. The first user message fixes the title; it is
    /// never recomputed afterwards.
    pub fn push(&mut self, mut message: Message) {
        if message.conversation_id.is_none() {
            message.conversation_id = Some(self.id.clone());
        }
        let first_user = message.sender == Sender::User && !self.has_user_message();
        if first_user {
            self.title = derive_title(&message.content);
        }
        self.messages.push(message);
        self.touch();
    }

    pub fn has_user_message(&self) -> bool {
        self.messages.iter().any(Message::is_user)
    }

    /// Move the record under a new id, carrying every message along.
    pub fn rekey(&mut self, id: impl Into<String>) {
        self.id = id.into();
        for message in &mut self.messages {
            message.conversation_id = Some(self.id.clone());
        }
        self.touch();
    }

    /// Repair records written by older front-ends: missing message ids and
    /// conversation ids are filled in, and `updated_at` is clamped so it
    /// never precedes `created_at`.
    pub fn normalize(&mut self) {
        for (index, message) in self.messages.iter_mut().enumerate() {
            if message.id.is_empty() {
                message.id = format!("{}-{:06}", self.id, index);
            }
            if message.conversation_id.is_none() {
                message.conversation_id = Some(self.id.clone());
            }
        }
        if self.updated_at < self.created_at {
            self.updated_at = self.created_at;
        }
    }

    pub fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            updated_at: self.updated_at,
            message_count: self.messages.len(),
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now().max(self.created_at).max(self.updated_at);
    }
}

/// Cut a message down to a conversation title.
pub fn derive_title(content: &str) -> String {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return DEFAULT_TITLE.to_string();
    }
    if trimmed.chars().count() > TITLE_MAX_CHARS {
        let cut: String = trimmed.chars().take(TITLE_MAX_CHARS).collect();
        format!("{}...", cut)
    } else {
        trimmed.to_string()
    }
}

/// Summary of a conversation for listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: String,
    pub title: String,
    pub updated_at: DateTime<Utc>,
    pub message_count: usize,
}

/// Newest first; ties broken by id so the order is stable.
pub fn sort_summaries(summaries: &mut [ConversationSummary]) {
    summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
}
