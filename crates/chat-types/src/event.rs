use serde::{Deserialize, Serialize};
use crate::message::Message;

/// Where the session manager is in its state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    Idle,
    /// A chat turn is waiting on the backend
    Sending,
    /// A conversation is being loaded from the store
    Switching,
    /// The last intent failed; cleared by the next intent
    Erroring(String),
}

impl SessionPhase {
    pub fn is_busy(&self) -> bool {
        matches!(self, SessionPhase::Sending | SessionPhase::Switching)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// Events emitted by the session manager.
/// The presentation layer subscribes to these instead of polling state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SessionEvent {
    PhaseChanged { phase: SessionPhase },

    /// A message was appended to the active conversation
    MessageAppended { conversation_id: String, message: Message },

    /// The in-memory message list was replaced wholesale (switch or new)
    MessagesReplaced { conversation_id: Option<String>, count: usize },

    ActiveConversationChanged { conversation_id: Option<String> },

    LoadingChanged { loading: bool },

    ModelChanged { model: String },

    PersonaChanged { persona: String },

    /// The persisted record set changed; conversation lists should re-query
    ConversationsChanged,

    /// A debounced save reached the store
    SaveCompleted { conversation_id: String },

    /// Transient, user-facing notice (storage trouble, failed switch, ...)
    Notification { level: NotificationLevel, message: String },
}
