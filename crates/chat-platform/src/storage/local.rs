//! `window.localStorage` backend.
//!
//! Values are stored as strings, so only UTF-8 payloads are accepted.
//! Persistent across reloads; a few megabytes per origin.

use async_trait::async_trait;
use wasm_bindgen::JsValue;
use web_sys::Storage;
use chat_core::ports::StoragePort;
use chat_types::{ChatError, Result};

pub struct LocalStorage {
    storage: Storage,
}

impl LocalStorage {
    pub fn open() -> Result<Self> {
        let window = web_sys::window()
            .ok_or_else(|| ChatError::StorageUnavailable("No window object".to_string()))?;

        let storage = window
            .local_storage()
            .map_err(|e| ChatError::StorageUnavailable(format!("{:?}", e)))?
            .ok_or_else(|| ChatError::StorageUnavailable("localStorage not available".to_string()))?;

        Ok(Self { storage })
    }
}

fn storage_error(e: JsValue) -> ChatError {
    ChatError::Storage(format!("{:?}", e))
}

#[async_trait(?Send)]
impl StoragePort for LocalStorage {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let value = self.storage.get_item(key).map_err(storage_error)?;
        Ok(value.map(String::into_bytes))
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let text = std::str::from_utf8(value)
            .map_err(|e| ChatError::Storage(format!("value for '{}' is not UTF-8: {}", key, e)))?;
        // Throws QuotaExceededError when the origin is full.
        self.storage.set_item(key, text).map_err(storage_error)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.storage.remove_item(key).map_err(storage_error)
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let len = self.storage.length().map_err(storage_error)?;
        let mut keys = Vec::new();
        for index in 0..len {
            if let Some(key) = self.storage.key(index).map_err(storage_error)? {
                if key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn backend_name(&self) -> &str {
        "localStorage"
    }
}
