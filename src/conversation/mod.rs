//! Conversation data model: messages, the append-only log, and sessions.

pub mod log;
pub mod message;
pub mod session;

pub use log::ConversationLog;
pub use message::{Message, MessageId, Sender};
pub use session::{ConversationSession, SessionId};
