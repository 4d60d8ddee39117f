use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChatError {
    /// Request failed to reach the backend or came back non-2xx
    #[error("Network error: {0}")]
    Network(String),

    /// The backend answered 2xx but reported a failure
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Conversation not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Busy: another request is in flight")]
    Busy,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("JS interop error: {0}")]
    JsInterop(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse error taxonomy shown to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    StorageUnavailable,
    NotFound,
    Validation,
    Other,
}

impl ChatError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChatError::Network(_) | ChatError::Backend(_) => ErrorKind::Network,
            ChatError::StorageUnavailable(_) => ErrorKind::StorageUnavailable,
            ChatError::NotFound(_) => ErrorKind::NotFound,
            ChatError::Validation(_) => ErrorKind::Validation,
            _ => ErrorKind::Other,
        }
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(e: serde_json::Error) -> Self {
        ChatError::Serialization(e.to_string())
    }
}
