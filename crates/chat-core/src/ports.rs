//! Port traits: the hexagonal architecture boundary.
//!
//! These traits are defined here in `chat-core` (pure Rust).
//! Implementations live in `chat-platform` (browser adapters).
//! The core never imports platform code; it only depends on these traits.

use async_trait::async_trait;
use futures::future::LocalBoxFuture;
use chat_types::{
    Result,
    conversation::{Conversation, ConversationSummary},
    persona::{ModelCatalog, PersonaCatalog},
    remote::{ChatReply, ChatRequest, RemoteConversation, RemoteConversationList},
};

// ─── Raw Storage Ports ───────────────────────────────────────

/// Flat key-value storage (browser local storage, memory).
#[async_trait(?Send)]
pub trait StoragePort {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>>;

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Name of this backend (for logging/debug)
    fn backend_name(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryPermission {
    Granted,
    /// The user has not answered the permission prompt yet
    Prompt,
    Denied,
}

/// A user-granted directory of flat files.
#[async_trait(?Send)]
pub trait DirectoryPort {
    /// Current grant state. Implementations must not prompt here.
    async fn permission(&self) -> Result<DirectoryPermission>;

    /// `Ok(None)` when the file does not exist
    async fn read_file(&self, name: &str) -> Result<Option<String>>;

    /// Create or overwrite
    async fn write_file(&self, name: &str, contents: &str) -> Result<()>;

    /// Returns false when there was nothing to remove
    async fn remove_file(&self, name: &str) -> Result<bool>;

    /// File names directly inside the directory
    async fn list_files(&self) -> Result<Vec<String>>;

    /// Human-readable directory name
    fn label(&self) -> &str;
}

// ─── Conversation Store ──────────────────────────────────────

/// Durable conversation records, keyed by conversation id.
#[async_trait(?Send)]
pub trait ConversationStore {
    /// Upsert by id. Saving the same record twice leaves one record.
    async fn save(&self, conversation: &Conversation) -> Result<()>;

    /// `Err(ChatError::NotFound)` when no record has this id
    async fn load(&self, id: &str) -> Result<Conversation>;

    /// Summaries sorted by `updated_at`, newest first
    async fn list_all(&self) -> Result<Vec<ConversationSummary>>;

    /// Full records, newest first
    async fn load_all(&self) -> Result<Vec<Conversation>>;

    /// `Err(ChatError::NotFound)` when no record has this id
    async fn delete(&self, id: &str) -> Result<()>;

    fn backend_name(&self) -> &str;
}

// ─── Chat Backend ────────────────────────────────────────────

/// Typed client over the remote chat service. Every call fails closed:
/// transport problems come back as `Err`, never as a panic.
#[async_trait(?Send)]
pub trait ChatBackend {
    async fn send_message(&self, req: ChatRequest) -> Result<ChatReply>;

    async fn list_models(&self) -> Result<ModelCatalog>;

    async fn list_personas(&self) -> Result<PersonaCatalog>;

    /// Returns the model the server actually selected
    async fn set_model(&self, model: &str) -> Result<String>;

    /// Returns the persona the server actually selected
    async fn set_persona(&self, persona: &str) -> Result<String>;

    /// Returns the new conversation's id
    async fn create_conversation(&self) -> Result<String>;

    async fn delete_conversation(&self, id: &str) -> Result<()>;

    async fn list_conversations(&self) -> Result<RemoteConversationList>;

    async fn get_conversation(&self, id: &str) -> Result<RemoteConversation>;

    async fn clear_history(&self) -> Result<()>;
}

// ─── Timer Port ──────────────────────────────────────────────

/// Handle to a scheduled task that has not been cancelled.
pub trait PendingTimer {
    /// Stop the timer. If it has not fired yet, the task is dropped unrun.
    fn cancel(self: Box<Self>);
}

/// One-shot timers on the event loop.
pub trait TimerPort {
    /// Run `task` once after `delay_ms` milliseconds.
    fn schedule(&self, delay_ms: u32, task: LocalBoxFuture<'static, ()>) -> Box<dyn PendingTimer>;
}
