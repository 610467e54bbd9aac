//! Conversation history store.
//!
//! An insertion-ordered, append-only sequence of messages for the active
//! session. The store has no persistence coupling: callers persist and
//! refresh after every user-visible append.

use crate::types::{generate_message_id, Message};

/// Default number of recent messages sent with a completion request.
pub const DEFAULT_WINDOW: usize = 20;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationHistory {
    messages: Vec<Message>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing sequence (e.g. a loaded session).
    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// Append a message. Callers are responsible for id uniqueness.
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// The most recent `k` messages, oldest first.
    pub fn recent(&self, k: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(k);
        &self.messages[start..]
    }

    /// Find a message by id.
    pub fn find(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Give every message without an id a fresh one. Returns how many changed.
    ///
    /// This is the only in-place edit the store allows.
    pub fn repair_ids(&mut self) -> usize {
        let mut repaired = 0;
        for message in self.messages.iter_mut().filter(|m| m.id.is_empty()) {
            message.id = generate_message_id();
            repaired += 1;
        }
        repaired
    }
}
