//! Conversation list view model.
//!
//! A projection of the store's summaries for a sidebar. It keeps no
//! state of its own beyond the cached summaries, a loading flag and an
//! optional title filter; every mutation is relayed to the session manager
//! and followed by a re-query.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use chat_types::{Result, conversation::ConversationSummary, event::SessionEvent};
use crate::ports::ConversationStore;
use crate::session::SessionManager;

pub struct ConversationListViewModel {
    store: Rc<dyn ConversationStore>,
    items: RefCell<Vec<ConversationSummary>>,
    loading: Cell<bool>,
    filter: RefCell<String>,
    /// Bumped per refresh; only the newest refresh may land its result
    generation: Cell<u64>,
}

impl ConversationListViewModel {
    pub fn new(store: Rc<dyn ConversationStore>) -> Self {
        Self {
            store,
            items: RefCell::new(Vec::new()),
            loading: Cell::new(false),
            filter: RefCell::new(String::new()),
            generation: Cell::new(0),
        }
    }

    /// Re-query the store. On failure the previous items are kept.
    ///
    /// Overlapping refreshes are coalesced: a refresh that was overtaken by
    /// a newer one drops its result and leaves `loading` to the newer one.
    pub async fn refresh(&self) -> Result<()> {
        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        self.loading.set(true);
        let result = self.store.list_all().await;
        if self.generation.get() != generation {
            log::debug!("Dropping superseded conversation list");
            return result.map(|_| ());
        }
        self.loading.set(false);
        match result {
            Ok(items) => {
                *self.items.borrow_mut() = items;
                Ok(())
            }
            Err(e) => {
                log::warn!("Could not list conversations: {}", e);
                Err(e)
            }
        }
    }

    /// Summaries newest first, narrowed by the title filter.
    pub fn items(&self) -> Vec<ConversationSummary> {
        let filter = self.filter.borrow().to_lowercase();
        self.items
            .borrow()
            .iter()
            .filter(|s| filter.is_empty() || s.title.to_lowercase().contains(&filter))
            .cloned()
            .collect()
    }

    pub fn set_filter(&self, text: &str) {
        *self.filter.borrow_mut() = text.trim().to_string();
    }

    pub fn filter(&self) -> String {
        self.filter.borrow().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.get()
    }

    /// Whether any of `events` changed the persisted record set.
    pub fn needs_refresh(events: &[SessionEvent]) -> bool {
        events.iter().any(|e| {
            matches!(
                e,
                SessionEvent::ConversationsChanged | SessionEvent::SaveCompleted { .. }
            )
        })
    }

    pub async fn create(&self, session: &SessionManager) -> Result<()> {
        session.new_conversation().await;
        self.refresh().await
    }

    pub async fn select(&self, session: &SessionManager, id: &str) -> Result<()> {
        session.select_conversation(id).await?;
        self.refresh().await
    }

    /// The list is re-queried even when the delete fails.
    pub async fn delete(&self, session: &SessionManager, id: &str) -> Result<()> {
        let deleted = session.delete_conversation(id).await;
        let refreshed = self.refresh().await;
        deleted.and(refreshed)
    }
}
