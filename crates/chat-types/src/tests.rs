#[cfg(test)]
mod tests {
    use crate::message::*;
    use crate::conversation::*;
    use crate::persona::*;
    use crate::event::*;
    use crate::config::*;
    use crate::error::*;
    use chrono::{Duration, Utc};

    // ─── Message Tests ───────────────────────────────────────

    #[test]
    fn test_message_user() {
        let msg = Message::user("m1", "Hello");
        assert_eq!(msg.sender, Sender::User);
        assert_eq!(msg.content, "Hello");
        assert_eq!(msg.id, "m1");
        assert!(msg.conversation_id.is_none());
        assert!(msg.is_user());
    }

    #[test]
    fn test_message_bot() {
        let msg = Message::bot("m2", "Hi there").in_conversation("c1");
        assert_eq!(msg.sender, Sender::Bot);
        assert_eq!(msg.conversation_id.as_deref(), Some("c1"));
        assert!(!msg.is_user());
    }

    #[test]
    fn test_sender_serializes_as_role() {
        assert_eq!(serde_json::to_string(&Sender::User).unwrap(), r#""user""#);
        assert_eq!(serde_json::to_string(&Sender::Bot).unwrap(), r#""assistant""#);
    }

    #[test]
    fn test_sender_accepts_legacy_bot() {
        let sender: Sender = serde_json::from_str(r#""bot""#).unwrap();
        assert_eq!(sender, Sender::Bot);
    }

    #[test]
    fn test_sender_from_role() {
        assert_eq!(Sender::from_role("user"), Sender::User);
        assert_eq!(Sender::from_role("assistant"), Sender::Bot);
        assert_eq!(Sender::from_role("system"), Sender::Bot);
        assert_eq!(Sender::User.as_role(), "user");
    }

    #[test]
    fn test_message_persisted_shape() {
        let msg = Message::user("m1", "hey");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["role"], "user");
        assert_eq!(value["content"], "hey");
        assert!(value["timestamp"].is_string());
        assert!(value.get("conversation_id").is_none());
    }

    #[test]
    fn test_message_without_id_deserializes() {
        let json = r#"{"role":"assistant","content":"hi","timestamp":"2026-01-01T00:00:00Z"}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert!(msg.id.is_empty());
        assert_eq!(msg.sender, Sender::Bot);
    }

    // ─── Conversation Tests ──────────────────────────────────

    #[test]
    fn test_conversation_new() {
        let c = Conversation::new("c1");
        assert_eq!(c.id, "c1");
        assert_eq!(c.title, DEFAULT_TITLE);
        assert!(c.messages.is_empty());
        assert!(c.updated_at >= c.created_at);
    }

    #[test]
    fn test_first_user_message_sets_title() {
        let mut c = Conversation::new("c1");
        c.push(Message::user("m1", "Hello"));
        assert_eq!(c.title, "Hello");
        assert_eq!(c.messages[0].conversation_id.as_deref(), Some("c1"));
    }

    #[test]
    fn test_title_is_write_once() {
        let mut c = Conversation::new("c1");
        c.push(Message::user("m1", "First question"));
        c.push(Message::bot("m2", "Answer"));
        c.push(Message::user("m3", "Second question"));
        assert_eq!(c.title, "First question");
    }

    #[test]
    fn test_bot_message_does_not_set_title() {
        let mut c = Conversation::new("c1");
        c.push(Message::bot("m1", "Welcome back"));
        assert_eq!(c.title, DEFAULT_TITLE);
        c.push(Message::user("m2", "Thanks"));
        assert_eq!(c.title, "Thanks");
    }

    #[test]
    fn test_derive_title_truncates() {
        let long = "a".repeat(45);
        let title = derive_title(&long);
        assert_eq!(title, format!("{}...", "a".repeat(30)));
        assert_eq!(derive_title(&"b".repeat(30)), "b".repeat(30));
    }

    #[test]
    fn test_derive_title_counts_chars_not_bytes() {
        let text = "é".repeat(31);
        let title = derive_title(&text);
        assert_eq!(title.chars().count(), 33);
        assert!(title.ends_with("..."));
    }

    #[test]
    fn test_derive_title_blank() {
        assert_eq!(derive_title("   "), DEFAULT_TITLE);
    }

    #[test]
    fn test_conversation_rekey() {
        let mut c = Conversation::new("local");
        c.push(Message::user("m1", "hi"));
        c.rekey("server");
        assert_eq!(c.id, "server");
        assert_eq!(c.messages[0].conversation_id.as_deref(), Some("server"));
    }

    #[test]
    fn test_conversation_normalize_fills_ids() {
        let json = r#"{
            "id": "c9",
            "title": "Old",
            "messages": [{"role":"user","content":"hi","timestamp":"2026-01-01T00:00:00Z"}],
            "created_at": "2026-01-02T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z"
        }"#;
        let mut c: Conversation = serde_json::from_str(json).unwrap();
        c.normalize();
        assert_eq!(c.messages[0].id, "c9-000000");
        assert_eq!(c.messages[0].conversation_id.as_deref(), Some("c9"));
        assert!(c.updated_at >= c.created_at);
    }

    #[test]
    fn test_conversation_serialization_roundtrip() {
        let mut c = Conversation::new("c1");
        c.push(Message::user("m1", "Hello"));
        c.push(Message::bot("m2", "Hi"));
        let json = serde_json::to_string_pretty(&c).unwrap();
        let back: Conversation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn test_summary_and_sort() {
        let now = Utc::now();
        let mut summaries = vec![
            ConversationSummary { id: "old".into(), title: "a".into(), updated_at: now - Duration::hours(2), message_count: 1 },
            ConversationSummary { id: "new".into(), title: "b".into(), updated_at: now, message_count: 2 },
            ConversationSummary { id: "mid".into(), title: "c".into(), updated_at: now - Duration::hours(1), message_count: 3 },
        ];
        sort_summaries(&mut summaries);
        let ids: Vec<&str> = summaries.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }

    #[test]
    fn test_conversation_summary() {
        let mut c = Conversation::new("c1");
        c.push(Message::user("m1", "Hello"));
        let s = c.summary();
        assert_eq!(s.id, "c1");
        assert_eq!(s.title, "Hello");
        assert_eq!(s.message_count, 1);
        assert_eq!(s.updated_at, c.updated_at);
    }

    // ─── Persona Tests ───────────────────────────────────────

    #[test]
    fn test_catalog_lookup() {
        let models = ModelCatalog {
            models: vec!["a".into(), "b".into()],
            current: "a".into(),
        };
        assert!(models.contains("b"));
        assert!(!models.contains("c"));

        let personas = PersonaCatalog {
            personas: vec![Persona {
                id: "coach".into(),
                name: "Motivational Coach".into(),
                description: "Keeps you going".into(),
            }],
            current: "coach".into(),
        };
        assert_eq!(personas.get("coach").unwrap().name, "Motivational Coach");
        assert!(personas.get("friend").is_none());
    }

    // ─── Event Tests ─────────────────────────────────────────

    #[test]
    fn test_session_event_is_tagged() {
        let event = SessionEvent::LoadingChanged { loading: true };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "LoadingChanged");
        assert_eq!(value["loading"], true);
    }

    #[test]
    fn test_session_event_unit_variant() {
        let json = serde_json::to_string(&SessionEvent::ConversationsChanged).unwrap();
        let back: SessionEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SessionEvent::ConversationsChanged);
    }

    #[test]
    fn test_phase_busy() {
        assert!(!SessionPhase::Idle.is_busy());
        assert!(SessionPhase::Sending.is_busy());
        assert!(SessionPhase::Switching.is_busy());
        assert!(!SessionPhase::Erroring("x".into()).is_busy());
    }

    // ─── Config Tests ────────────────────────────────────────

    #[test]
    fn test_default_config() {
        let config = ChatConfig::default();
        assert_eq!(config.backend.api_base, "http://localhost:5000");
        assert!(config.backend.default_model.is_none());
        assert_eq!(config.storage.backend, StorageBackendType::Auto);
        assert_eq!(config.storage.storage_key, "conversations");
        assert_eq!(config.session.save_debounce_ms, 1000);
        assert_eq!(config.session.fallback, FallbackStyle::Pool);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: ChatConfig =
            serde_json::from_str(r#"{"backend":{"api_base":"https://chat.example"}}"#).unwrap();
        assert_eq!(config.backend.api_base, "https://chat.example");
        assert_eq!(config.session.save_debounce_ms, 1000);
        assert_eq!(config.storage.backend, StorageBackendType::Auto);
    }

    #[test]
    fn test_storage_backend_labels() {
        assert_eq!(StorageBackendType::Directory.label(), "Directory");
        assert_eq!(StorageBackendType::KeyValue.label(), "Local storage");
    }

    // ─── Error Tests ─────────────────────────────────────────

    #[test]
    fn test_error_display() {
        let err = ChatError::Network("HTTP 502".to_string());
        assert_eq!(err.to_string(), "Network error: HTTP 502");

        let err = ChatError::NotFound("abc".to_string());
        assert_eq!(err.to_string(), "Conversation not found: abc");

        let err = ChatError::StorageUnavailable("permission denied".to_string());
        assert_eq!(err.to_string(), "Storage unavailable: permission denied");
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(ChatError::Backend("x".into()).kind(), ErrorKind::Network);
        assert_eq!(ChatError::Validation("x".into()).kind(), ErrorKind::Validation);
        assert_eq!(ChatError::Busy.kind(), ErrorKind::Other);
        assert_eq!(ChatError::StorageUnavailable("x".into()).kind(), ErrorKind::StorageUnavailable);
    }

    #[test]
    fn test_error_from_serde() {
        let serde_err = serde_json::from_str::<serde_json::Value>("{{invalid}}").unwrap_err();
        let err: ChatError = serde_err.into();
        assert!(matches!(err, ChatError::Serialization(_)));
    }
}
