pub mod memory;
pub mod local;
pub mod auto;

pub use memory::MemoryStorage;
pub use local::LocalStorage;
pub use auto::{auto_detect_storage, select_conversation_store};
