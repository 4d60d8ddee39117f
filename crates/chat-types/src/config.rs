use serde::{Deserialize, Serialize};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Origin of the chat backend; endpoints live under `/api`
    pub api_base: String,
    /// Model to request at startup instead of the server default
    pub default_model: Option<String>,
    pub default_persona: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:5000".to_string(),
            default_model: None,
            default_persona: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackendType,
    /// Key the key-value provider keeps its mapping under
    pub storage_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackendType::Auto,
            storage_key: "conversations".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageBackendType {
    /// The granted directory if there is one, otherwise key-value storage
    Auto,
    KeyValue,
    /// One file per conversation in a user-granted directory
    Directory,
    Memory,
}

impl StorageBackendType {
    pub fn label(&self) -> &str {
        match self {
            StorageBackendType::Auto => "Auto",
            StorageBackendType::KeyValue => "Local storage",
            StorageBackendType::Directory => "Directory",
            StorageBackendType::Memory => "Memory",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Quiet period before a scheduled save is written
    pub save_debounce_ms: u32,
    pub fallback: FallbackStyle,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            save_debounce_ms: 1000,
            fallback: FallbackStyle::Pool,
        }
    }
}

/// What the assistant says when the backend cannot be reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FallbackStyle {
    /// Rotate through a pool of supportive replies
    Pool,
    /// Always answer with the same apology
    Apology,
}
