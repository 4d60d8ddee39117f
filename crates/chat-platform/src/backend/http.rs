//! HTTP chat service adapter.
//!
//! Talks to the companion chat service's JSON routes under `/api`.
//! Uses browser `fetch()` via gloo-net for WASM compatibility.

use async_trait::async_trait;
use gloo_net::http::{Request, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use chat_core::ports::ChatBackend;
use chat_types::{
    ChatError, Result,
    config::BackendConfig,
    persona::{ModelCatalog, PersonaCatalog},
    remote::{ChatReply, ChatRequest, RemoteConversation, RemoteConversationList},
};
use super::wire::*;

pub struct HttpChatBackend {
    base_url: String,
}

impl HttpChatBackend {
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            base_url: config.api_base.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = Request::get(&self.url(path))
            .send()
            .await
            .map_err(|e| ChatError::Network(e.to_string()))?;
        read_json(path, response).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let response = Request::post(&self.url(path))
            .header("Content-Type", "application/json")
            .json(body)
            .map_err(|e| ChatError::Serialization(e.to_string()))?
            .send()
            .await
            .map_err(|e| ChatError::Network(e.to_string()))?;
        read_json(path, response).await
    }

    async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = Request::post(&self.url(path))
            .send()
            .await
            .map_err(|e| ChatError::Network(e.to_string()))?;
        read_json(path, response).await
    }
}

/// Non-2xx becomes `Network` (or `NotFound` for a 404 on a conversation
/// route); a 2xx body with an `error` field becomes `Backend`.
async fn read_json<T: DeserializeOwned>(path: &str, response: Response) -> Result<T> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| ChatError::Network(e.to_string()))?;

    if !response.ok() {
        let detail = serde_json::from_str::<ErrorBody>(&text)
            .ok()
            .and_then(|b| b.error.or(b.message))
            .unwrap_or(text);
        if status == 404 && path.starts_with("/conversation/") {
            return Err(ChatError::NotFound(path.trim_start_matches("/conversation/").to_string()));
        }
        log::warn!("{} answered HTTP {}: {}", path, status, detail);
        return Err(ChatError::Network(format!("HTTP {}: {}", status, detail)));
    }

    if let Ok(ErrorBody { error: Some(error), .. }) = serde_json::from_str::<ErrorBody>(&text) {
        return Err(ChatError::Backend(error));
    }
    serde_json::from_str(&text).map_err(ChatError::from)
}

#[async_trait(?Send)]
impl ChatBackend for HttpChatBackend {
    async fn send_message(&self, req: ChatRequest) -> Result<ChatReply> {
        let body = ChatBody {
            message: &req.message,
            model: req.model.as_deref(),
            conversation_id: req.conversation_id.as_deref(),
        };
        let response: ChatResponse = self.post("/chat", &body).await?;
        response.into_reply()
    }

    async fn list_models(&self) -> Result<ModelCatalog> {
        let response: ModelsResponse = self.get("/models").await?;
        Ok(response.into())
    }

    async fn list_personas(&self) -> Result<PersonaCatalog> {
        let response: PersonasResponse = self.get("/personas").await?;
        Ok(response.into())
    }

    async fn set_model(&self, model: &str) -> Result<String> {
        let response: CurrentModelResponse = self.post("/set-model", &SetModelBody { model }).await?;
        Ok(response.current_model)
    }

    async fn set_persona(&self, persona: &str) -> Result<String> {
        let response: CurrentPersonaResponse =
            self.post("/set-persona", &SetPersonaBody { persona }).await?;
        Ok(response.current_persona)
    }

    async fn create_conversation(&self) -> Result<String> {
        let response: CreatedConversationResponse = self.post_empty("/conversation").await?;
        Ok(response.conversation_id)
    }

    async fn delete_conversation(&self, id: &str) -> Result<()> {
        let path = format!("/conversation/{}", id);
        let response = Request::delete(&self.url(&path))
            .send()
            .await
            .map_err(|e| ChatError::Network(e.to_string()))?;
        let _: serde_json::Value = read_json(&path, response).await?;
        Ok(())
    }

    async fn list_conversations(&self) -> Result<RemoteConversationList> {
        let response: ConversationsResponse = self.get("/conversations").await?;
        Ok(response.into())
    }

    async fn get_conversation(&self, id: &str) -> Result<RemoteConversation> {
        let response: ConversationResponse = self.get(&format!("/conversation/{}", id)).await?;
        Ok(response.into())
    }

    async fn clear_history(&self) -> Result<()> {
        let _: serde_json::Value = self.post_empty("/clear-history").await?;
        Ok(())
    }
}
