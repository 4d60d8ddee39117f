//! Conversation store providers.
//!
//! `KeyValueConversationStore` and `DirectoryConversationStore` implement
//! the same `ConversationStore` port. `FallbackStore` pairs a primary
//! provider with a fallback and switches over for good the first time the
//! primary reports `StorageUnavailable`.

pub mod key_value;
pub mod directory;

pub use key_value::{KeyValueConversationStore, DEFAULT_STORAGE_KEY};
pub use directory::DirectoryConversationStore;

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use async_trait::async_trait;
use chat_types::{
    ChatError, Result,
    conversation::{Conversation, ConversationSummary},
    event::{NotificationLevel, SessionEvent},
};
use crate::event_bus::EventBus;
use crate::ports::ConversationStore;

pub struct FallbackStore {
    active: RefCell<Rc<dyn ConversationStore>>,
    fallback: RefCell<Option<Rc<dyn ConversationStore>>>,
    failed_over: Cell<bool>,
    primary_name: String,
    fallback_name: String,
    event_bus: Option<EventBus>,
}

impl FallbackStore {
    pub fn new(primary: Rc<dyn ConversationStore>, fallback: Rc<dyn ConversationStore>) -> Self {
        Self {
            primary_name: primary.backend_name().to_string(),
            fallback_name: fallback.backend_name().to_string(),
            active: RefCell::new(primary),
            fallback: RefCell::new(Some(fallback)),
            failed_over: Cell::new(false),
            event_bus: None,
        }
    }

    /// Announce a fail-over on `bus`.
    pub fn with_events(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn has_failed_over(&self) -> bool {
        self.failed_over.get()
    }

    fn current(&self) -> Rc<dyn ConversationStore> {
        self.active.borrow().clone()
    }

    /// Swap in the fallback provider. `None` once it has already been used.
    fn fail_over(&self, reason: &str) -> Option<Rc<dyn ConversationStore>> {
        let fallback = self.fallback.borrow_mut().take()?;
        log::warn!(
            "Conversation store '{}' unavailable ({}), switching to '{}'",
            self.primary_name,
            reason,
            self.fallback_name
        );
        *self.active.borrow_mut() = fallback.clone();
        self.failed_over.set(true);
        if let Some(bus) = &self.event_bus {
            bus.emit(SessionEvent::Notification {
                level: NotificationLevel::Warning,
                message: format!(
                    "Directory storage is unavailable ({}). Conversations are now kept in {}.",
                    reason, self.fallback_name
                ),
            });
        }
        Some(fallback)
    }
}

macro_rules! with_failover {
    ($self:ident, $store:ident => $call:expr) => {{
        let $store = $self.current();
        match $call.await {
            Err(ChatError::StorageUnavailable(reason)) => match $self.fail_over(&reason) {
                Some($store) => $call.await,
                None => Err(ChatError::StorageUnavailable(reason)),
            },
            other => other,
        }
    }};
}

#[async_trait(?Send)]
impl ConversationStore for FallbackStore {
    async fn save(&self, conversation: &Conversation) -> Result<()> {
        with_failover!(self, store => store.save(conversation))
    }

    async fn load(&self, id: &str) -> Result<Conversation> {
        with_failover!(self, store => store.load(id))
    }

    async fn list_all(&self) -> Result<Vec<ConversationSummary>> {
        with_failover!(self, store => store.list_all())
    }

    async fn load_all(&self) -> Result<Vec<Conversation>> {
        with_failover!(self, store => store.load_all())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        with_failover!(self, store => store.delete(id))
    }

    fn backend_name(&self) -> &str {
        if self.failed_over.get() {
            &self.fallback_name
        } else {
            &self.primary_name
        }
    }
}
