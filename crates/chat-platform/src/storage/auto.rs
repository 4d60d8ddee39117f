//! Pick the storage backends for a session.
//!
//! Preferences: localStorage → Memory (fallback).
//! Conversations: directory (with key-value fallback) when a directory was
//! granted, otherwise the key-value provider on top of the preferences
//! storage.

use std::rc::Rc;
use chat_core::event_bus::EventBus;
use chat_core::ports::{ConversationStore, DirectoryPort, StoragePort};
use chat_core::store::{DirectoryConversationStore, FallbackStore, KeyValueConversationStore};
use chat_types::config::{StorageBackendType, StorageConfig};
use crate::directory::BrowserDirectory;
use super::{LocalStorage, MemoryStorage};

/// Try to open persistent key-value storage.
/// Returns a trait object so callers are backend-agnostic.
pub fn auto_detect_storage() -> Rc<dyn StoragePort> {
    match LocalStorage::open() {
        Ok(local) => {
            log::info!("Storage backend: localStorage");
            Rc::new(local)
        }
        Err(e) => {
            log::warn!("localStorage unavailable ({}), falling back to memory", e);
            Rc::new(MemoryStorage::new())
        }
    }
}

/// Build the conversation store for one session. The choice is made once;
/// a directory store that later loses its grant fails over to the
/// key-value provider on its own.
pub fn select_conversation_store(
    config: &StorageConfig,
    key_value: Rc<dyn StoragePort>,
    directory: Option<BrowserDirectory>,
    bus: &EventBus,
) -> Rc<dyn ConversationStore> {
    let kv_store = || -> Rc<dyn ConversationStore> {
        Rc::new(KeyValueConversationStore::new(key_value.clone(), config.storage_key.clone()))
    };

    match (config.backend, directory) {
        (StorageBackendType::Memory, _) => {
            log::info!("Conversation store: memory");
            Rc::new(KeyValueConversationStore::new(
                Rc::new(MemoryStorage::new()),
                config.storage_key.clone(),
            ))
        }
        (StorageBackendType::KeyValue, _) => {
            log::info!("Conversation store: key-value ({})", key_value.backend_name());
            kv_store()
        }
        (StorageBackendType::Directory | StorageBackendType::Auto, Some(directory)) => {
            log::info!("Conversation store: directory '{}'", directory.label());
            let primary = Rc::new(DirectoryConversationStore::new(Rc::new(directory)));
            Rc::new(FallbackStore::new(primary, kv_store()).with_events(bus.clone()))
        }
        (StorageBackendType::Directory, None) => {
            log::warn!("Directory storage requested but no directory was granted, using key-value");
            kv_store()
        }
        (StorageBackendType::Auto, None) => {
            log::info!("Conversation store: key-value ({})", key_value.backend_name());
            kv_store()
        }
    }
}
