//! GuideVoice: a conversational guidance assistant engine.
//!
//! One session engine sits behind every assistant surface (career guide,
//! query handler, role-based interviewer):
//! Voice/Text input → AI backend → Formatted log → Spoken reply
//!
//! # Architecture
//!
//! The [`session::SessionController`] is a single task that owns the
//! conversation and coordinates independent engines over async channels:
//! - **Speech capture**: turns a platform recognizer's events into one
//!   transcript per capture
//! - **Backend client**: posts each turn to the AI backend and adopts the
//!   session id it returns
//! - **Formatting**: renders replies for display and strips markup for speech
//! - **Speech output**: cloud synthesis with a local system-voice fallback,
//!   one utterance at a time
//!
//! Hosts drive a session through [`session::SessionHandle`] or, out of
//! process, through the newline-delimited JSON bridge in [`host`].

pub mod audio;
pub mod backend;
pub mod capture;
pub mod config;
pub mod conversation;
pub mod error;
pub mod format;
pub mod guide_dirs;
pub mod host;
pub mod language;
pub mod media;
pub mod session;
pub mod tts;

pub use config::AssistantConfig;
pub use conversation::{ConversationSession, Message, Sender, SessionId};
pub use error::{Result, SessionError};
pub use language::LanguageCode;
pub use session::{SessionController, SessionEvent, SessionHandle, SessionParts, SessionState};
