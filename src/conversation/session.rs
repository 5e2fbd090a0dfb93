//! Conversation session identity and state.

use super::log::ConversationLog;
use super::message::{Message, Sender};
use crate::language::LanguageCode;
use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

const SUFFIX_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const SUFFIX_LEN: usize = 9;

/// Opaque conversation identifier: `session-<millis>-<9 base36 chars>`.
///
/// Server-assigned ids are adopted verbatim, so no format is enforced on
/// values coming back from the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Mint a fresh client-side id.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
            .collect();
        Self(format!("session-{}-{suffix}", Utc::now().timestamp_millis()))
    }

    /// Mint an id guaranteed to differ from `previous`.
    pub fn generate_distinct(previous: Option<&SessionId>) -> Self {
        loop {
            let id = Self::generate();
            if Some(&id) != previous {
                return id;
            }
        }
    }

    /// Wrap an id handed out by the backend.
    pub fn from_server(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One continuous conversation with the backend.
///
/// Replacing the whole session is the only way to discard messages.
#[derive(Debug, Clone)]
pub struct ConversationSession {
    id: SessionId,
    language: LanguageCode,
    log: ConversationLog,
}

impl ConversationSession {
    pub fn new(language: LanguageCode) -> Self {
        Self {
            id: SessionId::generate(),
            language,
            log: ConversationLog::new(),
        }
    }

    /// Start over: new id (distinct from the current one), empty log.
    pub fn reset(&mut self) {
        self.id = SessionId::generate_distinct(Some(&self.id));
        self.log.clear();
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Server-assigned session continuation.
    pub fn adopt_id(&mut self, id: SessionId) {
        self.id = id;
    }

    pub fn language(&self) -> LanguageCode {
        self.language
    }

    pub fn set_language(&mut self, language: LanguageCode) {
        self.language = language;
    }

    pub fn append(&mut self, sender: Sender, text: impl Into<String>) -> &Message {
        self.log.append(sender, text)
    }

    pub fn messages(&self) -> &[Message] {
        self.log.messages()
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }
}
