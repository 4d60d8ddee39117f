pub mod message;
pub mod conversation;
pub mod persona;
pub mod remote;
pub mod event;
pub mod config;
pub mod error;

#[cfg(test)]
mod tests;

pub use error::{ChatError, ErrorKind};
pub type Result<T> = std::result::Result<T, ChatError>;
