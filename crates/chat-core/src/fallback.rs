//! Local replies used when the backend cannot answer.

use std::cell::Cell;
use chat_types::config::FallbackStyle;

pub const APOLOGY: &str =
    "I'm having trouble connecting to my backend. Please try again later.";

pub const FALLBACK_POOL: &[&str] = &[
    "I'm here to listen and support you. How are you feeling today?",
    "That sounds challenging. Would you like to tell me more about what's going on?",
    "Thank you for sharing that with me. What do you think might help in this situation?",
    "It's normal to feel that way. Remember that your feelings are valid.",
    "I'm sorry to hear you're going through this. Remember to be kind to yourself.",
    "Would it help to try a quick breathing exercise together? We could take a few deep breaths.",
    "Is there someone in your life who might be able to offer additional support right now?",
];

pub struct FallbackResponder {
    style: FallbackStyle,
    next: Cell<usize>,
}

impl FallbackResponder {
    pub fn new(style: FallbackStyle) -> Self {
        Self {
            style,
            next: Cell::new(0),
        }
    }

    /// Next reply. `Pool` rotates so consecutive failures do not repeat.
    pub fn reply(&self) -> &'static str {
        match self.style {
            FallbackStyle::Apology => APOLOGY,
            FallbackStyle::Pool => {
                let index = self.next.get() % FALLBACK_POOL.len();
                self.next.set(index + 1);
                FALLBACK_POOL[index]
            }
        }
    }
}
