//! Id generation for messages and conversations.

use std::cell::Cell;
use chrono::Utc;

/// Message ids sort in generation order: a zero-padded millisecond
/// timestamp followed by a per-generator sequence number.
pub struct IdGenerator {
    seq: Cell<u64>,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self { seq: Cell::new(0) }
    }

    pub fn message_id(&self) -> String {
        let seq = self.seq.get();
        self.seq.set(seq + 1);
        format!("{:013}-{:06}", Utc::now().timestamp_millis(), seq)
    }

    pub fn conversation_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
