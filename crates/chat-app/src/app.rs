//! The application object handed to the host page.
//!
//! Every async operation returns a `Promise`; errors reject with a JS
//! `Error` whose `name` is the error kind (`Network`, `NotFound`, ...).

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use gloo_utils::format::JsValueSerdeExt;
use js_sys::Promise;
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{future_to_promise, spawn_local};

use chat_core::conversation_list::ConversationListViewModel;
use chat_core::event_bus::{EventBus, SubscriptionId};
use chat_core::ports::{ChatBackend, ConversationStore, StoragePort};
use chat_core::session::{SessionDeps, SessionManager};
use chat_platform::storage::{auto_detect_storage, select_conversation_store};
use chat_platform::{BrowserDirectory, BrowserTimer, HttpChatBackend};
use chat_types::{
    ChatError, ErrorKind,
    config::ChatConfig,
    conversation::ConversationSummary,
    event::{SessionEvent, SessionPhase},
    message::Message,
    persona::{ModelCatalog, PersonaCatalog},
};
use crate::download::{download_json, export_file_name};

pub(crate) const CONFIG_STORAGE_KEY: &str = "chat:config";

// ─── JS conversions ──────────────────────────────────────────

fn to_js_error(e: ChatError) -> JsValue {
    let error = js_sys::Error::new(&e.to_string());
    error.set_name(match e.kind() {
        ErrorKind::Network => "Network",
        ErrorKind::StorageUnavailable => "StorageUnavailable",
        ErrorKind::NotFound => "NotFound",
        ErrorKind::Validation => "Validation",
        ErrorKind::Other if e == ChatError::Busy => "Busy",
        ErrorKind::Other => "Error",
    });
    error.into()
}

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    JsValue::from_serde(value).map_err(|e| to_js_error(ChatError::Serialization(e.to_string())))
}

/// Snapshot of the session for rendering.
#[derive(Serialize)]
struct SessionView<'a> {
    active_conversation_id: Option<&'a str>,
    title: Option<&'a str>,
    messages: &'a [Message],
    loading: bool,
    phase: &'a SessionPhase,
    current_model: &'a str,
    current_persona: &'a str,
    input: &'a str,
    storage_backend: &'a str,
}

#[derive(Serialize)]
struct CatalogView {
    models: ModelCatalog,
    personas: PersonaCatalog,
}

// ─── Config ──────────────────────────────────────────────────

/// Explicit overrides win, then the saved config, then defaults.
pub(crate) fn parse_config(overrides: Option<&str>, saved: Option<&[u8]>) -> ChatConfig {
    if let Some(json) = overrides {
        match serde_json::from_str::<ChatConfig>(json) {
            Ok(config) => return config,
            Err(e) => log::warn!("Ignoring invalid config override: {}", e),
        }
    }
    if let Some(data) = saved {
        match serde_json::from_slice::<ChatConfig>(data) {
            Ok(config) => {
                log::info!("Config restored from storage");
                return config;
            }
            Err(e) => log::warn!("Saved config unreadable ({}), using defaults", e),
        }
    }
    ChatConfig::default()
}

async fn load_config(storage: &Rc<dyn StoragePort>, overrides: &JsValue) -> ChatConfig {
    let overrides = if overrides.is_undefined() || overrides.is_null() {
        None
    } else {
        js_sys::JSON::stringify(overrides).ok().and_then(|s| s.as_string())
    };
    let saved = match storage.get(CONFIG_STORAGE_KEY).await {
        Ok(saved) => saved,
        Err(e) => {
            log::warn!("Could not read saved config: {}", e);
            None
        }
    };
    parse_config(overrides.as_deref(), saved.as_deref())
}

/// Save config to storage (async, fire-and-forget)
fn save_config(storage: Rc<dyn StoragePort>, config: &ChatConfig) {
    if let Ok(json) = serde_json::to_vec(config) {
        spawn_local(async move {
            match storage.set(CONFIG_STORAGE_KEY, &json).await {
                Ok(()) => log::debug!("Config saved to storage"),
                Err(e) => log::warn!("Could not save config: {}", e),
            }
        });
    }
}

// ─── Entry points ────────────────────────────────────────────

/// Ask the user for a conversation directory. Resolves to a handle the
/// page may keep and later pass to `createApp`.
#[wasm_bindgen(js_name = pickDirectory)]
pub async fn pick_directory() -> Result<JsValue, JsValue> {
    let directory = BrowserDirectory::pick().await.map_err(to_js_error)?;
    directory.request_access().await.map_err(to_js_error)?;
    Ok(directory.handle())
}

/// Wire everything together and restore the last session.
///
/// `config` is an optional partial `ChatConfig` object; `directory` an
/// optional handle from `pickDirectory`.
#[wasm_bindgen(js_name = createApp)]
pub async fn create_app(config: JsValue, directory: JsValue) -> Result<ChatApp, JsValue> {
    let preferences = auto_detect_storage();
    let config = load_config(&preferences, &config).await;
    save_config(preferences.clone(), &config);

    let directory = if directory.is_undefined() || directory.is_null() {
        None
    } else {
        match BrowserDirectory::from_handle(directory) {
            Ok(directory) => Some(directory),
            Err(e) => {
                log::warn!("Ignoring conversation directory: {}", e);
                None
            }
        }
    };

    let event_bus = EventBus::new();
    let store = select_conversation_store(&config.storage, preferences.clone(), directory, &event_bus);
    let backend: Rc<dyn ChatBackend> = Rc::new(HttpChatBackend::new(&config.backend));
    let session = Rc::new(SessionManager::new(
        SessionDeps {
            store: store.clone(),
            backend: backend.clone(),
            timer: Rc::new(BrowserTimer::new()),
            preferences: preferences.clone(),
        },
        &config.session,
        event_bus.clone(),
    ));
    let list = Rc::new(ConversationListViewModel::new(store.clone()));

    // Keep the sidebar in step with the persisted record set.
    let refresh_list = list.clone();
    let list_subscription = event_bus.subscribe(move |event| {
        if ConversationListViewModel::needs_refresh(std::slice::from_ref(event)) {
            let list = refresh_list.clone();
            spawn_local(async move {
                if list.refresh().await.is_ok() {
                    log::debug!("Conversation list refreshed ({} items)", list.items().len());
                }
            });
        }
    });

    match session.restore().await {
        Ok(Some(id)) => log::info!("Resumed conversation {}", id),
        Ok(None) => {}
        Err(e) => log::warn!("Could not restore last conversation: {}", e),
    }
    if let Err(e) = list.refresh().await {
        log::warn!("Could not list conversations: {}", e);
    }

    log::info!(
        "Chat app ready (backend {}, store {})",
        config.backend.api_base,
        store.backend_name()
    );

    Ok(ChatApp {
        config: Rc::new(RefCell::new(config)),
        session,
        list,
        store,
        backend,
        preferences,
        event_bus,
        list_subscription,
        subscriptions: RefCell::new(HashMap::new()),
        next_subscription: Cell::new(1),
    })
}

// ─── ChatApp ─────────────────────────────────────────────────

#[wasm_bindgen]
pub struct ChatApp {
    config: Rc<RefCell<ChatConfig>>,
    session: Rc<SessionManager>,
    list: Rc<ConversationListViewModel>,
    store: Rc<dyn ConversationStore>,
    backend: Rc<dyn ChatBackend>,
    preferences: Rc<dyn StoragePort>,
    event_bus: EventBus,
    list_subscription: SubscriptionId,
    subscriptions: RefCell<HashMap<u32, SubscriptionId>>,
    next_subscription: Cell<u32>,
}

#[wasm_bindgen]
impl ChatApp {
    // ─── Session ─────────────────────────────────────────────

    /// Resolves to the reply message, or `null` when the reply arrived for
    /// a conversation that is no longer active.
    #[wasm_bindgen(js_name = sendMessage)]
    pub fn send_message(&self, content: String) -> Promise {
        let session = self.session.clone();
        future_to_promise(async move {
            let outcome = session.send_message(&content).await.map_err(to_js_error)?;
            to_js(&outcome.message())
        })
    }

    /// Send whatever is in the input buffer.
    #[wasm_bindgen(js_name = sendInput)]
    pub fn send_input(&self) -> Promise {
        let session = self.session.clone();
        future_to_promise(async move {
            let outcome = session.send_input().await.map_err(to_js_error)?;
            to_js(&outcome.message())
        })
    }

    #[wasm_bindgen(js_name = setInput)]
    pub fn set_input(&self, text: String) {
        self.session.set_input(text);
    }

    pub fn input(&self) -> String {
        self.session.input()
    }

    pub fn state(&self) -> Result<JsValue, JsValue> {
        let state = self.session.state();
        to_js(&SessionView {
            active_conversation_id: state.active_conversation_id(),
            title: state.conversation.as_ref().map(|c| c.title.as_str()),
            messages: state.messages(),
            loading: state.loading,
            phase: &state.phase,
            current_model: &state.current_model,
            current_persona: &state.current_persona,
            input: &state.input,
            storage_backend: self.store.backend_name(),
        })
    }

    pub fn messages(&self) -> Result<JsValue, JsValue> {
        to_js(&self.session.messages())
    }

    #[wasm_bindgen(js_name = newConversation)]
    pub fn new_conversation(&self) -> Promise {
        let (session, list) = (self.session.clone(), self.list.clone());
        future_to_promise(async move {
            list.create(&session).await.map_err(to_js_error)?;
            Ok(JsValue::UNDEFINED)
        })
    }

    #[wasm_bindgen(js_name = selectConversation)]
    pub fn select_conversation(&self, id: String) -> Promise {
        let (session, list) = (self.session.clone(), self.list.clone());
        future_to_promise(async move {
            list.select(&session, &id).await.map_err(to_js_error)?;
            Ok(JsValue::UNDEFINED)
        })
    }

    #[wasm_bindgen(js_name = deleteConversation)]
    pub fn delete_conversation(&self, id: String) -> Promise {
        let (session, list) = (self.session.clone(), self.list.clone());
        future_to_promise(async move {
            list.delete(&session, &id).await.map_err(to_js_error)?;
            Ok(JsValue::UNDEFINED)
        })
    }

    // ─── Conversation list ───────────────────────────────────

    /// Summaries newest first, narrowed by the current filter.
    pub fn conversations(&self) -> Result<JsValue, JsValue> {
        let items: Vec<ConversationSummary> = self.list.items();
        to_js(&items)
    }

    #[wasm_bindgen(js_name = setFilter)]
    pub fn set_filter(&self, text: String) {
        self.list.set_filter(&text);
    }

    #[wasm_bindgen(js_name = isListLoading)]
    pub fn is_list_loading(&self) -> bool {
        self.list.is_loading()
    }

    #[wasm_bindgen(js_name = refreshConversations)]
    pub fn refresh_conversations(&self) -> Promise {
        let list = self.list.clone();
        future_to_promise(async move {
            list.refresh().await.map_err(to_js_error)?;
            Ok(JsValue::UNDEFINED)
        })
    }

    // ─── Model / persona ─────────────────────────────────────

    /// Fetch models and personas, then apply the configured defaults if the
    /// backend offers them.
    #[wasm_bindgen(js_name = loadCatalog)]
    pub fn load_catalog(&self) -> Promise {
        let (session, config) = (self.session.clone(), self.config.clone());
        future_to_promise(async move {
            let (models, personas) = session.refresh_catalog().await.map_err(to_js_error)?;
            let (default_model, default_persona) = {
                let config = config.borrow();
                (config.backend.default_model.clone(), config.backend.default_persona.clone())
            };
            if let Some(model) = default_model.filter(|m| models.contains(m) && *m != models.current) {
                if let Err(e) = session.select_model(&model).await {
                    log::warn!("Could not apply default model {}: {}", model, e);
                }
            }
            if let Some(persona) = default_persona.filter(|p| personas.get(p).is_some() && *p != personas.current) {
                if let Err(e) = session.select_persona(&persona).await {
                    log::warn!("Could not apply default persona {}: {}", persona, e);
                }
            }
            to_js(&CatalogView { models, personas })
        })
    }

    /// Resolves to the model the backend settled on. The choice is kept as
    /// the default for the next visit.
    #[wasm_bindgen(js_name = selectModel)]
    pub fn select_model(&self, model: String) -> Promise {
        let (session, config, storage) = (self.session.clone(), self.config.clone(), self.preferences.clone());
        future_to_promise(async move {
            let resolved = session.select_model(&model).await.map_err(to_js_error)?;
            config.borrow_mut().backend.default_model = Some(resolved.clone());
            save_config(storage, &config.borrow());
            Ok(JsValue::from_str(&resolved))
        })
    }

    #[wasm_bindgen(js_name = selectPersona)]
    pub fn select_persona(&self, persona: String) -> Promise {
        let (session, config, storage) = (self.session.clone(), self.config.clone(), self.preferences.clone());
        future_to_promise(async move {
            let resolved = session.select_persona(&persona).await.map_err(to_js_error)?;
            config.borrow_mut().backend.default_persona = Some(resolved.clone());
            save_config(storage, &config.borrow());
            Ok(JsValue::from_str(&resolved))
        })
    }

    // ─── Backend-side history ────────────────────────────────

    /// Conversations as the chat service knows them.
    #[wasm_bindgen(js_name = remoteConversations)]
    pub fn remote_conversations(&self) -> Promise {
        let backend = self.backend.clone();
        future_to_promise(async move {
            let list = backend.list_conversations().await.map_err(to_js_error)?;
            to_js(&list)
        })
    }

    #[wasm_bindgen(js_name = remoteConversation)]
    pub fn remote_conversation(&self, id: String) -> Promise {
        let backend = self.backend.clone();
        future_to_promise(async move {
            let conversation = backend.get_conversation(&id).await.map_err(to_js_error)?;
            to_js(&conversation)
        })
    }

    /// Resolves to the new conversation's id on the service.
    #[wasm_bindgen(js_name = createRemoteConversation)]
    pub fn create_remote_conversation(&self) -> Promise {
        let backend = self.backend.clone();
        future_to_promise(async move {
            let id = backend.create_conversation().await.map_err(to_js_error)?;
            Ok(JsValue::from_str(&id))
        })
    }

    #[wasm_bindgen(js_name = clearServerHistory)]
    pub fn clear_server_history(&self) -> Promise {
        let backend = self.backend.clone();
        future_to_promise(async move {
            backend.clear_history().await.map_err(to_js_error)?;
            Ok(JsValue::UNDEFINED)
        })
    }

    // ─── Export / import ─────────────────────────────────────

    #[wasm_bindgen(js_name = exportConversations)]
    pub fn export_conversations(&self) -> Promise {
        let session = self.session.clone();
        future_to_promise(async move {
            let json = session.export_conversations().await.map_err(to_js_error)?;
            Ok(JsValue::from_str(&json))
        })
    }

    /// Resolves to the number of conversations imported.
    #[wasm_bindgen(js_name = importConversations)]
    pub fn import_conversations(&self, json: String) -> Promise {
        let session = self.session.clone();
        future_to_promise(async move {
            let count = session.import_conversations(&json).await.map_err(to_js_error)?;
            Ok(JsValue::from(count as u32))
        })
    }

    #[wasm_bindgen(js_name = downloadExport)]
    pub fn download_export(&self) -> Promise {
        let session = self.session.clone();
        future_to_promise(async move {
            let json = session.export_conversations().await.map_err(to_js_error)?;
            download_json(&export_file_name(chrono::Utc::now()), &json).map_err(to_js_error)?;
            Ok(JsValue::UNDEFINED)
        })
    }

    // ─── Events ──────────────────────────────────────────────

    /// Call `callback(event)` for every session event. Returns a handle for
    /// `unsubscribe`.
    pub fn subscribe(&self, callback: js_sys::Function) -> u32 {
        let id = self.event_bus.subscribe(move |event: &SessionEvent| {
            match JsValue::from_serde(event) {
                Ok(value) => {
                    if let Err(e) = callback.call1(&JsValue::NULL, &value) {
                        log::warn!("Event subscriber threw: {:?}", e);
                    }
                }
                Err(e) => log::error!("Could not serialize event: {}", e),
            }
        });
        let handle = self.next_subscription.get();
        self.next_subscription.set(handle + 1);
        self.subscriptions.borrow_mut().insert(handle, id);
        handle
    }

    pub fn unsubscribe(&self, handle: u32) -> bool {
        match self.subscriptions.borrow_mut().remove(&handle) {
            Some(id) => self.event_bus.unsubscribe(id),
            None => false,
        }
    }

    /// Events emitted since the last drain, for hosts that poll.
    #[wasm_bindgen(js_name = drainEvents)]
    pub fn drain_events(&self) -> Result<JsValue, JsValue> {
        to_js(&self.event_bus.drain())
    }

    /// Stop pending work before the page goes away.
    pub fn dispose(&self) {
        self.session.dispose();
        self.event_bus.unsubscribe(self.list_subscription);
        for (_, id) in self.subscriptions.borrow_mut().drain() {
            self.event_bus.unsubscribe(id);
        }
        log::info!("Chat app disposed");
    }
}
