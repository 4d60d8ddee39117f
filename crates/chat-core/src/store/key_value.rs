//! Key-value conversation provider.
//!
//! Every conversation lives in one JSON mapping `{id: record}` under a
//! single storage key. Each write re-serializes the whole mapping, so a
//! save costs O(n) in the number of stored conversations. Writes go
//! through a read-merge-write cycle keyed by conversation id under an
//! async lock, so interleaved saves of different conversations never
//! clobber each other.

use std::collections::BTreeMap;
use std::rc::Rc;
use async_trait::async_trait;
use futures::lock::Mutex;
use serde::Deserialize;
use chat_types::{
    ChatError, Result,
    conversation::{sort_summaries, Conversation, ConversationSummary},
};
use crate::ports::{ConversationStore, StoragePort};

pub const DEFAULT_STORAGE_KEY: &str = "conversations";

type RecordMap = BTreeMap<String, Conversation>;

/// Accepts both layouts older front-ends wrote.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredRecords {
    Map(RecordMap),
    List(Vec<Conversation>),
}

pub struct KeyValueConversationStore {
    storage: Rc<dyn StoragePort>,
    key: String,
    write_lock: Mutex<()>,
}

impl KeyValueConversationStore {
    pub fn new(storage: Rc<dyn StoragePort>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn read_records(&self) -> Result<RecordMap> {
        let bytes = match self.storage.get(&self.key).await? {
            Some(bytes) if !bytes.is_empty() => bytes,
            _ => return Ok(RecordMap::new()),
        };
        let records = match serde_json::from_slice::<StoredRecords>(&bytes)? {
            StoredRecords::Map(map) => map,
            StoredRecords::List(list) => list.into_iter().map(|c| (c.id.clone(), c)).collect(),
        };
        Ok(records
            .into_iter()
            .map(|(id, mut c)| {
                c.normalize();
                (id, c)
            })
            .collect())
    }

    async fn write_records(&self, records: &RecordMap) -> Result<()> {
        let bytes = serde_json::to_vec(records)?;
        self.storage.set(&self.key, &bytes).await
    }
}

#[async_trait(?Send)]
impl ConversationStore for KeyValueConversationStore {
    async fn save(&self, conversation: &Conversation) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.read_records().await?;
        records.insert(conversation.id.clone(), conversation.clone());
        self.write_records(&records).await
    }

    async fn load(&self, id: &str) -> Result<Conversation> {
        self.read_records()
            .await?
            .remove(id)
            .ok_or_else(|| ChatError::NotFound(id.to_string()))
    }

    async fn list_all(&self) -> Result<Vec<ConversationSummary>> {
        let mut summaries: Vec<ConversationSummary> = self
            .read_records()
            .await?
            .values()
            .map(Conversation::summary)
            .collect();
        sort_summaries(&mut summaries);
        Ok(summaries)
    }

    async fn load_all(&self) -> Result<Vec<Conversation>> {
        let mut all: Vec<Conversation> = self.read_records().await?.into_values().collect();
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
        Ok(all)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.read_records().await?;
        if records.remove(id).is_none() {
            return Err(ChatError::NotFound(id.to_string()));
        }
        self.write_records(&records).await
    }

    fn backend_name(&self) -> &str {
        self.storage.backend_name()
    }
}
