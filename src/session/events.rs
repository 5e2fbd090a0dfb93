//! What the session controller tells its host.

use crate::conversation::{Message, SessionId};
use crate::language::LanguageCode;
use crate::tts::UtteranceId;
use serde::{Deserialize, Serialize};

/// Turn-taking state of the controller.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Capturing,
    AwaitingResponse,
    Speaking,
}

/// Non-fatal problems the user should hear about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    /// No speech recognition; typing still works.
    CaptureUnsupported,
    /// Microphone missing or permission denied.
    CaptureDevice,
    /// Camera could not be opened for the interview self-view.
    CameraUnavailable,
}

/// Result of asking for voice input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceStart {
    Listening,
    /// Capture could not start; a notice was published.
    Unavailable,
}

/// Events published on the controller's broadcast channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    StateChanged {
        state: SessionState,
    },
    MessageAppended {
        session_id: SessionId,
        message: Message,
    },
    /// Live transcript preview while capturing. Display only.
    InterimTranscript {
        text: String,
    },
    /// Captured transcript offered for editing instead of auto-submitted.
    DraftReady {
        text: String,
    },
    SpeechStarted {
        utterance: UtteranceId,
    },
    SpeechFinished {
        utterance: UtteranceId,
    },
    /// The backend continued the conversation under a new id.
    SessionAdopted {
        session_id: SessionId,
    },
    ConversationReset {
        session_id: SessionId,
    },
    MutedChanged {
        muted: bool,
    },
    LanguageChanged {
        language: LanguageCode,
    },
    Notice {
        kind: NoticeKind,
        message: String,
    },
}

/// Everything a UI needs to render the assistant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub title: String,
    pub state: SessionState,
    /// `None` until the first interaction creates the session.
    pub session_id: Option<SessionId>,
    pub language: LanguageCode,
    pub muted: bool,
    pub messages: Vec<Message>,
    /// Placeholder shown while `messages` is empty.
    pub greeting: String,
    pub camera_active: bool,
}
