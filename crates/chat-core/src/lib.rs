//! Platform-independent core of the chat client: the session manager, the
//! conversation stores, and the ports the browser adapters implement.

pub mod ports;
pub mod event_bus;
pub mod debounce;
pub mod ids;
pub mod fallback;
pub mod store;
pub mod session;
pub mod conversation_list;


pub use conversation_list::ConversationListViewModel;
pub use event_bus::EventBus;
pub use session::{SendOutcome, SessionDeps, SessionManager, SessionState};
