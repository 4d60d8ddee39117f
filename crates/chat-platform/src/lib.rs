//! Browser adapters for the chat-core ports: storage, the user-granted
//! conversation directory, the HTTP chat service, and event-loop timers.

pub mod storage;
pub mod directory;
pub mod backend;
pub mod timer;

pub use backend::HttpChatBackend;
pub use directory::BrowserDirectory;
pub use timer::BrowserTimer;
