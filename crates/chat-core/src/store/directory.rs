//! Directory conversation provider: one `<id>.json` file per conversation.
//!
//! Every operation checks the directory grant first and fails with
//! `StorageUnavailable` when it is missing or revoked.

use std::rc::Rc;
use async_trait::async_trait;
use chat_types::{
    ChatError, Result,
    conversation::{sort_summaries, Conversation, ConversationSummary},
};
use crate::ports::{ConversationStore, DirectoryPermission, DirectoryPort};

const RECORD_EXTENSION: &str = ".json";

pub struct DirectoryConversationStore {
    dir: Rc<dyn DirectoryPort>,
}

impl DirectoryConversationStore {
    pub fn new(dir: Rc<dyn DirectoryPort>) -> Self {
        Self { dir }
    }

    async fn ensure_granted(&self) -> Result<()> {
        match self.dir.permission().await? {
            DirectoryPermission::Granted => Ok(()),
            DirectoryPermission::Prompt => Err(ChatError::StorageUnavailable(format!(
                "access to '{}' has not been granted",
                self.dir.label()
            ))),
            DirectoryPermission::Denied => Err(ChatError::StorageUnavailable(format!(
                "access to '{}' was denied",
                self.dir.label()
            ))),
        }
    }

    async fn read_record(&self, file_name: &str) -> Result<Option<Conversation>> {
        match self.dir.read_file(file_name).await? {
            Some(text) => {
                let mut conversation: Conversation = serde_json::from_str(&text)?;
                conversation.normalize();
                Ok(Some(conversation))
            }
            None => Ok(None),
        }
    }
}

/// File name for a conversation id. Ids that could escape the directory
/// are rejected.
pub fn record_file_name(id: &str) -> Result<String> {
    if id.is_empty() || id.starts_with('.') || id.contains(|c: char| c == '/' || c == '\\') {
        return Err(ChatError::Validation(format!("invalid conversation id '{}'", id)));
    }
    Ok(format!("{}{}", id, RECORD_EXTENSION))
}

#[async_trait(?Send)]
impl ConversationStore for DirectoryConversationStore {
    async fn save(&self, conversation: &Conversation) -> Result<()> {
        self.ensure_granted().await?;
        let name = record_file_name(&conversation.id)?;
        let json = serde_json::to_string_pretty(conversation)?;
        self.dir.write_file(&name, &json).await
    }

    async fn load(&self, id: &str) -> Result<Conversation> {
        self.ensure_granted().await?;
        let name = record_file_name(id)?;
        self.read_record(&name)
            .await?
            .ok_or_else(|| ChatError::NotFound(id.to_string()))
    }

    async fn list_all(&self) -> Result<Vec<ConversationSummary>> {
        let mut summaries: Vec<ConversationSummary> =
            self.load_all().await?.iter().map(Conversation::summary).collect();
        sort_summaries(&mut summaries);
        Ok(summaries)
    }

    async fn load_all(&self) -> Result<Vec<Conversation>> {
        self.ensure_granted().await?;
        let mut all = Vec::new();
        for name in self.dir.list_files().await? {
            if !name.ends_with(RECORD_EXTENSION) {
                continue;
            }
            match self.read_record(&name).await {
                Ok(Some(conversation)) => all.push(conversation),
                Ok(None) => {}
                Err(ChatError::Serialization(e)) => {
                    log::warn!("Skipping unreadable conversation file {}: {}", name, e);
                }
                Err(e) => return Err(e),
            }
        }
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
        Ok(all)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.ensure_granted().await?;
        let name = record_file_name(id)?;
        if self.dir.remove_file(&name).await? {
            Ok(())
        } else {
            Err(ChatError::NotFound(id.to_string()))
        }
    }

    fn backend_name(&self) -> &str {
        "directory"
    }
}
