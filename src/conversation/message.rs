//! Chat messages shown in the conversation log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

/// Unique message identifier: creation millis plus a per-log sequence number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub(crate) fn new(created_at: DateTime<Utc>, seq: u64) -> Self {
        Self(format!("{}-{seq}", created_at.timestamp_millis()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single chat message. Immutable once appended to a log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    id: MessageId,
    sender: Sender,
    /// Display-formatted text (may contain `<strong>` / `<br>` markup).
    text: String,
    timestamp: DateTime<Utc>,
}

impl Message {
    pub(crate) fn new(id: MessageId, sender: Sender, text: String, timestamp: DateTime<Utc>) -> Self {
        Self {
            id,
            sender,
            text,
            timestamp,
        }
    }

    pub fn id(&self) -> &MessageId {
        &self.id
    }

    pub fn sender(&self) -> Sender {
        self.sender
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}
