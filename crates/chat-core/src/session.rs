//! Session manager: owns the in-memory session and drives its state machine.
//!
//! Transitions:
//! - idle → sending: `send_message` appends the user message immediately,
//!   then waits on the backend
//! - sending → idle: the reply (or a local fallback reply) is appended
//! - idle → switching → idle | erroring: `select_conversation`
//! - any → idle: `new_conversation`, or deleting the active conversation
//!
//! Every change to the active conversation schedules a debounced save that
//! captures a snapshot of the record, so a save can never write one
//! conversation's messages under another conversation's id.
//!
//! All state lives behind `RefCell`s and no borrow is ever held across an
//! await point or while events are dispatched.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use futures::future::FutureExt;
use chat_types::{
    ChatError, Result,
    config::SessionConfig,
    conversation::Conversation,
    event::{NotificationLevel, SessionEvent, SessionPhase},
    message::Message,
    persona::{ModelCatalog, PersonaCatalog},
    remote::{ChatReply, ChatRequest},
};
use crate::debounce::DebouncedTask;
use crate::event_bus::EventBus;
use crate::fallback::FallbackResponder;
use crate::ids::IdGenerator;
use crate::ports::{ChatBackend, ConversationStore, StoragePort, TimerPort};

/// Preference key holding the id of the active conversation across reloads
pub const ACTIVE_CONVERSATION_KEY: &str = "chat:active_conversation";

/// Collaborators the session manager talks to.
pub struct SessionDeps {
    pub store: Rc<dyn ConversationStore>,
    pub backend: Rc<dyn ChatBackend>,
    pub timer: Rc<dyn TimerPort>,
    /// Small settings storage, separate from the conversation records
    pub preferences: Rc<dyn StoragePort>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    /// Mirror of the active conversation's record; `None` until the first
    /// message of a new conversation is sent
    pub conversation: Option<Conversation>,
    pub phase: SessionPhase,
    pub loading: bool,
    pub current_model: String,
    pub current_persona: String,
    pub input: String,
}

impl SessionState {
    fn new() -> Self {
        Self {
            conversation: None,
            phase: SessionPhase::Idle,
            loading: false,
            current_model: String::new(),
            current_persona: String::new(),
            input: String::new(),
        }
    }

    pub fn active_conversation_id(&self) -> Option<&str> {
        self.conversation.as_ref().map(|c| c.id.as_str())
    }

    pub fn messages(&self) -> &[Message] {
        self.conversation
            .as_ref()
            .map(|c| c.messages.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// The backend answered
    Replied(Message),
    /// The backend failed; a locally generated reply was appended instead
    Fallback { message: Message, error: ChatError },
    /// The reply arrived after its conversation stopped being active
    Discarded,
}

impl SendOutcome {
    pub fn message(&self) -> Option<&Message> {
        match self {
            SendOutcome::Replied(message) | SendOutcome::Fallback { message, .. } => Some(message),
            SendOutcome::Discarded => None,
        }
    }
}

#[derive(Clone, Copy)]
enum Selection {
    Model,
    Persona,
}

/// Bookkeeping for one optimistic selection slot.
#[derive(Default)]
struct SelectionTracker {
    /// Bumped per request; the highest value is the latest request
    generation: Cell<u64>,
    in_flight: Cell<u32>,
    /// What the backend last reported for this slot
    confirmed: RefCell<String>,
}

pub struct SessionManager {
    state: RefCell<SessionState>,
    store: Rc<dyn ConversationStore>,
    backend: Rc<dyn ChatBackend>,
    preferences: Rc<dyn StoragePort>,
    event_bus: EventBus,
    pending_save: RefCell<DebouncedTask>,
    ids: IdGenerator,
    fallback: FallbackResponder,
    model: SelectionTracker,
    persona: SelectionTracker,
}

impl SessionManager {
    pub fn new(deps: SessionDeps, config: &SessionConfig, event_bus: EventBus) -> Self {
        Self {
            state: RefCell::new(SessionState::new()),
            store: deps.store,
            backend: deps.backend,
            preferences: deps.preferences,
            event_bus,
            pending_save: RefCell::new(DebouncedTask::new(deps.timer, config.save_debounce_ms)),
            ids: IdGenerator::new(),
            fallback: FallbackResponder::new(config.fallback),
            model: SelectionTracker::default(),
            persona: SelectionTracker::default(),
        }
    }

    // ─── Read access ─────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.state.borrow().messages().to_vec()
    }

    pub fn active_conversation_id(&self) -> Option<String> {
        self.state.borrow().active_conversation_id().map(String::from)
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.borrow().phase.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn current_model(&self) -> String {
        self.state.borrow().current_model.clone()
    }

    pub fn current_persona(&self) -> String {
        self.state.borrow().current_persona.clone()
    }

    pub fn input(&self) -> String {
        self.state.borrow().input.clone()
    }

    pub fn set_input(&self, text: impl Into<String>) {
        self.state.borrow_mut().input = text.into();
    }

    pub fn has_pending_save(&self) -> bool {
        self.pending_save.borrow().is_pending()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn store(&self) -> Rc<dyn ConversationStore> {
        self.store.clone()
    }

    // ─── Sending ─────────────────────────────────────────────

    /// Send the current input buffer.
    pub async fn send_input(&self) -> Result<SendOutcome> {
        let text = self.input();
        self.send_message(&text).await
    }

    /// Send one chat turn.
    ///
    /// Blank content is rejected before anything changes. While another
    /// send or a switch is in flight the call is rejected with
    /// `ChatError::Busy`. Backend failures never surface as `Err`: a local
    /// fallback reply is appended and the user's message is kept.
    pub async fn send_message(&self, content: &str) -> Result<SendOutcome> {
        let text = content.trim();
        if text.is_empty() {
            return Err(ChatError::Validation("message is empty".to_string()));
        }

        let (request, conversation_id, created) = self.begin_send(text)?;
        if created {
            self.remember_active(Some(&conversation_id)).await;
        }

        let result = self.backend.send_message(request).await;
        Ok(self.finish_send(&conversation_id, result).await)
    }

    fn begin_send(&self, text: &str) -> Result<(ChatRequest, String, bool)> {
        let mut events = Vec::new();
        let (request, conversation_id, created, snapshot) = {
            let mut state = self.state.borrow_mut();
            if state.loading || state.phase.is_busy() {
                return Err(ChatError::Busy);
            }

            let created = state.conversation.is_none();
            let model = state.current_model.clone();
            let conversation = state
                .conversation
                .get_or_insert_with(|| Conversation::new(self.ids.conversation_id()));
            let conversation_id = conversation.id.clone();
            if created {
                events.push(SessionEvent::ActiveConversationChanged {
                    conversation_id: Some(conversation_id.clone()),
                });
            }

            let message = Message::user(self.ids.message_id(), text)
                .in_conversation(conversation_id.clone());
            conversation.push(message.clone());
            let snapshot = conversation.clone();

            state.input.clear();
            state.loading = true;
            state.phase = SessionPhase::Sending;

            events.push(SessionEvent::MessageAppended {
                conversation_id: conversation_id.clone(),
                message,
            });
            events.push(SessionEvent::LoadingChanged { loading: true });
            events.push(SessionEvent::PhaseChanged { phase: SessionPhase::Sending });

            let request = ChatRequest {
                message: text.to_string(),
                model: Some(model).filter(|m| !m.is_empty()),
                conversation_id: Some(conversation_id.clone()),
            };
            (request, conversation_id, created, snapshot)
        };

        self.schedule_save(snapshot);
        self.emit_all(events);
        Ok((request, conversation_id, created))
    }

    async fn finish_send(&self, sent_id: &str, result: Result<ChatReply>) -> SendOutcome {
        let mut events = vec![SessionEvent::LoadingChanged { loading: false }];
        let mut rekeyed: Option<String> = None;
        let mut snapshot = None;
        let outcome = {
            let mut state = self.state.borrow_mut();
            state.loading = false;
            if state.phase == SessionPhase::Sending {
                state.phase = SessionPhase::Idle;
                events.push(SessionEvent::PhaseChanged { phase: SessionPhase::Idle });
            }

            match state.conversation.as_mut().filter(|c| c.id == sent_id) {
                None => {
                    log::info!(
                        "Discarding reply for conversation {}: it is no longer active",
                        sent_id
                    );
                    SendOutcome::Discarded
                }
                Some(conversation) => {
                    let (content, error) = match result {
                        Ok(reply) => {
                            if let Some(new_id) = reply
                                .conversation_id
                                .filter(|id| !id.is_empty() && id != sent_id)
                            {
                                log::info!("Backend assigned conversation id {} (was {})", new_id, sent_id);
                                conversation.rekey(new_id.clone());
                                events.push(SessionEvent::ActiveConversationChanged {
                                    conversation_id: Some(new_id.clone()),
                                });
                                rekeyed = Some(new_id);
                            }
                            (reply.reply_text, None)
                        }
                        Err(e) => {
                            log::warn!("Chat request failed, answering locally: {}", e);
                            (self.fallback.reply().to_string(), Some(e))
                        }
                    };

                    let message = Message::bot(self.ids.message_id(), content)
                        .in_conversation(conversation.id.clone());
                    conversation.push(message.clone());
                    events.push(SessionEvent::MessageAppended {
                        conversation_id: conversation.id.clone(),
                        message: message.clone(),
                    });
                    snapshot = Some(conversation.clone());

                    match error {
                        None => SendOutcome::Replied(message),
                        Some(error) => SendOutcome::Fallback { message, error },
                    }
                }
            }
        };

        self.emit_all(events);
        match (snapshot, rekeyed) {
            (Some(snapshot), Some(new_id)) => self.move_record(sent_id, &new_id, snapshot).await,
            (Some(snapshot), None) => self.schedule_save(snapshot),
            (None, _) => {}
        }

        outcome
    }

    /// Store the re-keyed conversation under its new id, then drop the
    /// record under the old one. There is always a record for the
    /// remembered id, even if the page goes away halfway through.
    async fn move_record(&self, old_id: &str, new_id: &str, snapshot: Conversation) {
        // Any pending save still targets the old id.
        self.pending_save.borrow_mut().cancel();
        if let Err(e) = self.store.save(&snapshot).await {
            log::warn!("Could not save conversation {} under its new id: {}", new_id, e);
            self.schedule_save(snapshot);
            return;
        }
        if self.active_conversation_id().as_deref() == Some(new_id) {
            self.remember_active(Some(new_id)).await;
        }
        match self.store.delete(old_id).await {
            Ok(()) | Err(ChatError::NotFound(_)) => {}
            Err(e) => log::warn!("Could not remove superseded record {}: {}", old_id, e),
        }
        self.event_bus.emit(SessionEvent::ConversationsChanged);
    }

    // ─── Switching ───────────────────────────────────────────

    /// Make a stored conversation active.
    ///
    /// On failure the session is left exactly as it was and the phase moves
    /// to `Erroring` until the next intent.
    pub async fn select_conversation(&self, id: &str) -> Result<()> {
        {
            let state = self.state.borrow();
            if state.loading || state.phase.is_busy() {
                return Err(ChatError::Busy);
            }
            if state.active_conversation_id() == Some(id) {
                return Ok(());
            }
        }

        self.set_phase(SessionPhase::Switching);
        match self.store.load(id).await {
            Ok(conversation) => {
                self.adopt(conversation);
                self.remember_active(Some(id)).await;
                Ok(())
            }
            Err(e) => {
                log::warn!("Could not switch to conversation {}: {}", id, e);
                self.set_phase(SessionPhase::Erroring(e.to_string()));
                self.notify(NotificationLevel::Error, format!("Could not open conversation: {}", e));
                Err(e)
            }
        }
    }

    /// Replace the active conversation wholesale.
    fn adopt(&self, conversation: Conversation) {
        self.pending_save.borrow_mut().cancel();
        let conversation_id = conversation.id.clone();
        let count = conversation.messages.len();
        {
            let mut state = self.state.borrow_mut();
            state.conversation = Some(conversation);
            state.phase = SessionPhase::Idle;
        }
        self.emit_all(vec![
            SessionEvent::ActiveConversationChanged {
                conversation_id: Some(conversation_id.clone()),
            },
            SessionEvent::MessagesReplaced {
                conversation_id: Some(conversation_id),
                count,
            },
            SessionEvent::PhaseChanged { phase: SessionPhase::Idle },
        ]);
    }

    /// Start over with no active conversation. The record is created lazily
    /// by the next `send_message`.
    pub async fn new_conversation(&self) {
        self.pending_save.borrow_mut().cancel();
        let phase = {
            let mut state = self.state.borrow_mut();
            state.conversation = None;
            state.phase = if state.loading {
                SessionPhase::Sending
            } else {
                SessionPhase::Idle
            };
            state.phase.clone()
        };
        self.emit_all(vec![
            SessionEvent::ActiveConversationChanged { conversation_id: None },
            SessionEvent::MessagesReplaced { conversation_id: None, count: 0 },
            SessionEvent::PhaseChanged { phase },
        ]);
        self.remember_active(None).await;
    }

    /// Remove a conversation. Deleting the active one also resets the
    /// session as `new_conversation` does.
    pub async fn delete_conversation(&self, id: &str) -> Result<()> {
        let was_active = self.active_conversation_id().as_deref() == Some(id);
        if was_active {
            self.new_conversation().await;
        }

        let result = match self.store.delete(id).await {
            Ok(()) => Ok(()),
            // The active conversation may not have been saved yet.
            Err(ChatError::NotFound(_)) if was_active => Ok(()),
            Err(e) => Err(e),
        };

        if let Err(e) = self.backend.delete_conversation(id).await {
            log::debug!("Backend did not delete conversation {}: {}", id, e);
        }

        match &result {
            Ok(()) => self.event_bus.emit(SessionEvent::ConversationsChanged),
            Err(e) => {
                log::warn!("Could not delete conversation {}: {}", id, e);
                self.notify(NotificationLevel::Error, format!("Could not delete conversation: {}", e));
            }
        }
        result
    }

    /// Re-open the conversation that was active before the last reload.
    /// A remembered id whose record is gone is forgotten quietly.
    pub async fn restore(&self) -> Result<Option<String>> {
        let remembered = match self.preferences.get(ACTIVE_CONVERSATION_KEY).await {
            Ok(bytes) => bytes
                .and_then(|b| String::from_utf8(b).ok())
                .filter(|id| !id.is_empty()),
            Err(e) => {
                log::warn!("Could not read remembered conversation: {}", e);
                None
            }
        };
        let Some(id) = remembered else {
            return Ok(None);
        };

        match self.store.load(&id).await {
            Ok(conversation) => {
                log::info!("Restored conversation {}", id);
                self.adopt(conversation);
                Ok(Some(id))
            }
            Err(ChatError::NotFound(_)) => {
                log::info!("Remembered conversation {} no longer exists", id);
                self.remember_active(None).await;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    // ─── Model / persona ─────────────────────────────────────

    /// Fetch the backend's models and personas and adopt its current picks.
    pub async fn refresh_catalog(&self) -> Result<(ModelCatalog, PersonaCatalog)> {
        let models = self.backend.list_models().await?;
        let personas = self.backend.list_personas().await?;
        for (kind, current) in [
            (Selection::Model, &models.current),
            (Selection::Persona, &personas.current),
        ] {
            if current.is_empty() {
                continue;
            }
            *self.tracker(kind).confirmed.borrow_mut() = current.clone();
            // A pending selection settles the slot itself.
            if self.tracker(kind).in_flight.get() == 0 {
                self.apply_selection(kind, current.clone());
            }
        }
        Ok((models, personas))
    }

    /// Switch model optimistically, then reconcile with the backend's answer.
    pub async fn select_model(&self, model: &str) -> Result<String> {
        self.select(Selection::Model, model).await
    }

    /// Switch persona optimistically, then reconcile with the backend's answer.
    pub async fn select_persona(&self, persona: &str) -> Result<String> {
        self.select(Selection::Persona, persona).await
    }

    /// Only the latest request, or the last one to finish, writes the
    /// slot. A failure shows the value the backend last confirmed, never an
    /// unconfirmed optimistic one.
    async fn select(&self, kind: Selection, requested: &str) -> Result<String> {
        let tracker = self.tracker(kind);
        if tracker.in_flight.get() == 0 {
            *tracker.confirmed.borrow_mut() = self.selection(kind);
        }
        let generation = tracker.generation.get() + 1;
        tracker.generation.set(generation);
        tracker.in_flight.set(tracker.in_flight.get() + 1);

        self.apply_selection(kind, requested.to_string());
        let result = match kind {
            Selection::Model => self.backend.set_model(requested).await,
            Selection::Persona => self.backend.set_persona(requested).await,
        };
        tracker.in_flight.set(tracker.in_flight.get() - 1);

        match &result {
            Ok(resolved) => *tracker.confirmed.borrow_mut() = resolved.clone(),
            Err(e) => log::warn!("Backend rejected selection {}: {}", requested, e),
        }
        let latest = tracker.generation.get() == generation;
        if latest || tracker.in_flight.get() == 0 {
            let confirmed = tracker.confirmed.borrow().clone();
            if confirmed != requested {
                log::info!("Selection reconciled with backend: {} -> {}", requested, confirmed);
            }
            self.apply_selection(kind, confirmed);
        }
        result
    }

    fn tracker(&self, kind: Selection) -> &SelectionTracker {
        match kind {
            Selection::Model => &self.model,
            Selection::Persona => &self.persona,
        }
    }

    fn selection(&self, kind: Selection) -> String {
        let state = self.state.borrow();
        match kind {
            Selection::Model => state.current_model.clone(),
            Selection::Persona => state.current_persona.clone(),
        }
    }

    /// Set the slot and emit if it changed.
    fn apply_selection(&self, kind: Selection, value: String) {
        let previous = {
            let mut state = self.state.borrow_mut();
            let slot = match kind {
                Selection::Model => &mut state.current_model,
                Selection::Persona => &mut state.current_persona,
            };
            std::mem::replace(slot, value.clone())
        };
        if previous != value {
            self.event_bus.emit(match kind {
                Selection::Model => SessionEvent::ModelChanged { model: value },
                Selection::Persona => SessionEvent::PersonaChanged { persona: value },
            });
        }
    }

    // ─── Export / import ─────────────────────────────────────

    /// Every stored conversation as a pretty-printed JSON array.
    pub async fn export_conversations(&self) -> Result<String> {
        let all = self.store.load_all().await?;
        Ok(serde_json::to_string_pretty(&all)?)
    }

    /// Upsert each record of a JSON array produced by `export_conversations`.
    /// The active conversation is never overwritten.
    pub async fn import_conversations(&self, json: &str) -> Result<usize> {
        let records: Vec<Conversation> = serde_json::from_str(json)?;
        let active = self.active_conversation_id();
        let mut imported = 0;
        for mut conversation in records {
            if active.as_deref() == Some(conversation.id.as_str()) {
                log::warn!("Skipping import of active conversation {}", conversation.id);
                continue;
            }
            conversation.normalize();
            self.store.save(&conversation).await?;
            imported += 1;
        }
        if imported > 0 {
            self.event_bus.emit(SessionEvent::ConversationsChanged);
        }
        Ok(imported)
    }

    // ─── Teardown ────────────────────────────────────────────

    /// Cancel any pending save. Called when the page unloads.
    pub fn dispose(&self) {
        if self.pending_save.borrow_mut().cancel() {
            log::debug!("Dropped pending save on dispose");
        }
    }

    // ─── Internals ───────────────────────────────────────────

    fn schedule_save(&self, snapshot: Conversation) {
        let task = persist(self.store.clone(), self.event_bus.clone(), snapshot).boxed_local();
        self.pending_save.borrow_mut().schedule(task);
    }

    async fn remember_active(&self, id: Option<&str>) {
        let result = match id {
            Some(id) => self.preferences.set(ACTIVE_CONVERSATION_KEY, id.as_bytes()).await,
            None => self.preferences.delete(ACTIVE_CONVERSATION_KEY).await,
        };
        if let Err(e) = result {
            log::warn!("Could not remember active conversation: {}", e);
        }
    }

    fn set_phase(&self, phase: SessionPhase) {
        let changed = {
            let mut state = self.state.borrow_mut();
            let changed = state.phase != phase;
            state.phase = phase.clone();
            changed
        };
        if changed {
            self.event_bus.emit(SessionEvent::PhaseChanged { phase });
        }
    }

    fn notify(&self, level: NotificationLevel, message: String) {
        self.event_bus.emit(SessionEvent::Notification { level, message });
    }

    fn emit_all(&self, events: Vec<SessionEvent>) {
        for event in events {
            self.event_bus.emit(event);
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Body of a debounced save. Owns its snapshot, so it writes exactly the
/// record that was current when it was scheduled.
async fn persist(store: Rc<dyn ConversationStore>, bus: EventBus, snapshot: Conversation) {
    match store.save(&snapshot).await {
        Ok(()) => {
            log::debug!(
                "Saved conversation {} ({} messages) to {}",
                snapshot.id,
                snapshot.messages.len(),
                store.backend_name()
            );
            bus.emit(SessionEvent::SaveCompleted {
                conversation_id: snapshot.id,
            });
        }
        Err(e) => {
            log::error!("Failed to save conversation {}: {}", snapshot.id, e);
            bus.emit(SessionEvent::Notification {
                level: NotificationLevel::Error,
                message: format!("Could not save conversation: {}", e),
            });
        }
    }
}
