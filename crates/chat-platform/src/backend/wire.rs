//! JSON bodies of the chat service's `/api` routes.

use std::collections::BTreeMap;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use chat_types::{
    ChatError, Result,
    message::{Message, Sender},
    persona::{ModelCatalog, Persona, PersonaCatalog},
    remote::{ChatReply, RemoteConversation, RemoteConversationList, RemoteConversationSummary},
};

// ─── Requests ────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ChatBody<'a> {
    pub message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct SetModelBody<'a> {
    pub model: &'a str,
}

#[derive(Debug, Serialize)]
pub struct SetPersonaBody<'a> {
    pub persona: &'a str,
}

// ─── Responses ───────────────────────────────────────────────

/// Every route may answer with `error` (plus a human `message`) instead of
/// its normal payload, sometimes with a 2xx status.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ChatResponse {
    pub fn into_reply(self) -> Result<ChatReply> {
        match (self.error, self.message) {
            (Some(error), _) => Err(ChatError::Backend(error)),
            (None, Some(message)) => Ok(ChatReply {
                reply_text: message,
                conversation_id: self.conversation_id,
            }),
            (None, None) => Err(ChatError::Backend("reply carried no message".to_string())),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ModelsResponse {
    #[serde(default)]
    pub models: Vec<String>,
    #[serde(default)]
    pub current_model: String,
}

impl From<ModelsResponse> for ModelCatalog {
    fn from(r: ModelsResponse) -> Self {
        ModelCatalog {
            models: r.models,
            current: r.current_model,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PersonaEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct PersonasResponse {
    #[serde(default)]
    pub personas: BTreeMap<String, PersonaEntry>,
    #[serde(default)]
    pub current_persona: String,
}

impl From<PersonasResponse> for PersonaCatalog {
    fn from(r: PersonasResponse) -> Self {
        PersonaCatalog {
            personas: r
                .personas
                .into_iter()
                .map(|(id, entry)| Persona {
                    name: if entry.name.is_empty() { id.clone() } else { entry.name },
                    id,
                    description: entry.description,
                })
                .collect(),
            current: r.current_persona,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CurrentModelResponse {
    pub current_model: String,
}

#[derive(Debug, Deserialize)]
pub struct CurrentPersonaResponse {
    pub current_persona: String,
}

#[derive(Debug, Deserialize)]
pub struct CreatedConversationResponse {
    pub conversation_id: String,
}

/// Either epoch seconds or an ISO-8601 string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireTimestamp {
    Epoch(f64),
    Text(String),
}

impl WireTimestamp {
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        match self {
            WireTimestamp::Epoch(secs) => {
                let millis = (secs * 1000.0).round() as i64;
                Utc.timestamp_millis_opt(millis).single()
            }
            WireTimestamp::Text(text) => DateTime::parse_from_rfc3339(text)
                .map(|t| t.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    // Naive ISO strings without an offset are taken as UTC.
                    chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
                        .ok()
                        .map(|naive| naive.and_utc())
                }),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SummaryEntry {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub updated_at: Option<WireTimestamp>,
}

#[derive(Debug, Deserialize)]
pub struct ConversationsResponse {
    #[serde(default)]
    pub conversations: BTreeMap<String, SummaryEntry>,
    #[serde(default)]
    pub current_conversation: Option<String>,
}

impl From<ConversationsResponse> for RemoteConversationList {
    fn from(r: ConversationsResponse) -> Self {
        let mut conversations: Vec<RemoteConversationSummary> = r
            .conversations
            .into_iter()
            .map(|(id, entry)| RemoteConversationSummary {
                id,
                title: entry.title.unwrap_or_else(|| "Untitled".to_string()),
                updated_at: entry.updated_at.as_ref().and_then(WireTimestamp::to_utc),
            })
            .collect();
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
        RemoteConversationList {
            conversations,
            current: r.current_conversation,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WireMessage {
    pub role: String,
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<WireTimestamp>,
}

#[derive(Debug, Deserialize)]
pub struct ConversationResponse {
    pub conversation_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub messages: Vec<WireMessage>,
}

impl From<ConversationResponse> for RemoteConversation {
    fn from(r: ConversationResponse) -> Self {
        let id = r.conversation_id;
        let messages = r
            .messages
            .into_iter()
            // The service keeps its system prompt in the history.
            .filter(|m| m.role != "system")
            .enumerate()
            .map(|(index, m)| {
                let mut message = Message::new(
                    format!("{}-{:06}", id, index),
                    Sender::from_role(&m.role),
                    m.content,
                )
                .in_conversation(id.clone());
                if let Some(at) = m.timestamp.as_ref().and_then(WireTimestamp::to_utc) {
                    message.timestamp = at;
                }
                message
            })
            .collect();
        RemoteConversation {
            title: r.title.unwrap_or_else(|| "Untitled".to_string()),
            id,
            messages,
        }
    }
}
