//! Append-only conversation log.

use super::message::{Message, MessageId, Sender};
use chrono::Utc;

/// Ordered, append-only sequence of messages.
///
/// Insertion order is chronological order. Entries are never reordered or
/// removed individually; [`ConversationLog::clear`] is only reachable through
/// a session reset.
#[derive(Debug, Default, Clone)]
pub struct ConversationLog {
    messages: Vec<Message>,
    next_seq: u64,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new message and return a reference to it.
    pub fn append(&mut self, sender: Sender, text: impl Into<String>) -> &Message {
        let now = Utc::now();
        let id = MessageId::new(now, self.next_seq);
        self.next_seq += 1;
        self.messages.push(Message::new(id, sender, text.into(), now));
        // Just pushed, so `last` is always present.
        &self.messages[self.messages.len() - 1]
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Drop every entry. Only the session reset path calls this.
    pub(crate) fn clear(&mut self) {
        self.messages.clear();
    }
}
