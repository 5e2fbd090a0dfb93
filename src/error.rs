//! Error types for the conversational session engine.
//!
//! Each variant carries a stable error code (SCREAMING_SNAKE_CASE) that
//! hosts can match on without parsing the Display output.

/// Stable error codes for programmatic error handling.
pub mod error_codes {
    /// The runtime has no speech-recognition capability.
    pub const CAPTURE_UNSUPPORTED: &str = "CAPTURE_UNSUPPORTED";
    /// Microphone unavailable or permission denied.
    pub const CAPTURE_DEVICE: &str = "CAPTURE_DEVICE";
    /// A capture is already running.
    pub const CAPTURE_BUSY: &str = "CAPTURE_BUSY";
    /// The AI backend could not be reached or its reply could not be parsed.
    pub const BACKEND_UNAVAILABLE: &str = "BACKEND_UNAVAILABLE";
    /// Speech synthesis failed on every path.
    pub const SYNTHESIS_FAILED: &str = "SYNTHESIS_FAILED";
    /// Audio playback failed.
    pub const PLAYBACK_FAILED: &str = "PLAYBACK_FAILED";
    /// A backend request is already in flight for this session.
    pub const REQUEST_IN_FLIGHT: &str = "REQUEST_IN_FLIGHT";
    /// Submitted text was empty after trimming.
    pub const EMPTY_MESSAGE: &str = "EMPTY_MESSAGE";
    /// Language cannot change while capture or output is active.
    pub const LANGUAGE_LOCKED: &str = "LANGUAGE_LOCKED";
    /// Language tag is not in the supported set.
    pub const UNKNOWN_LANGUAGE: &str = "UNKNOWN_LANGUAGE";
    /// Host command with a missing or malformed payload.
    pub const INVALID_COMMAND: &str = "INVALID_COMMAND";
    /// Invalid or unreadable configuration.
    pub const CONFIG_INVALID: &str = "CONFIG_INVALID";
    /// Internal channel closed (controller gone).
    pub const CHANNEL_CLOSED: &str = "CHANNEL_CLOSED";
    /// Filesystem or process I/O error.
    pub const IO_ERROR: &str = "IO_ERROR";
}

/// Top-level error type for the session engine.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Platform lacks speech recognition; text input remains available.
    #[error("[{}] speech recognition is not supported here", error_codes::CAPTURE_UNSUPPORTED)]
    CaptureUnsupported,

    /// Microphone unavailable or denied.
    #[error("[{}] {}", error_codes::CAPTURE_DEVICE, .0)]
    CaptureDevice(String),

    /// A second capture was requested while one is active.
    #[error("[{}] a capture is already active", error_codes::CAPTURE_BUSY)]
    CaptureBusy,

    /// Network, status or parse failure talking to the AI backend.
    #[error("[{}] {}", error_codes::BACKEND_UNAVAILABLE, .0)]
    BackendUnavailable(String),

    /// Cloud or local speech synthesis failed.
    #[error("[{}] {}", error_codes::SYNTHESIS_FAILED, .0)]
    SynthesisFailed(String),

    /// Audio playback error.
    #[error("[{}] {}", error_codes::PLAYBACK_FAILED, .0)]
    Playback(String),

    /// Input is disabled while a reply is awaited.
    #[error("[{}] a reply is still pending", error_codes::REQUEST_IN_FLIGHT)]
    RequestInFlight,

    /// Nothing to send.
    #[error("[{}] message is empty", error_codes::EMPTY_MESSAGE)]
    EmptyMessage,

    /// Language switch attempted mid-capture or mid-utterance.
    #[error("[{}] language cannot change while listening or speaking", error_codes::LANGUAGE_LOCKED)]
    LanguageLocked,

    /// Unsupported language tag.
    #[error("[{}] unsupported language: {}", error_codes::UNKNOWN_LANGUAGE, .0)]
    UnknownLanguage(String),

    /// Host command payload could not be understood.
    #[error("[{}] {}", error_codes::INVALID_COMMAND, .0)]
    InvalidCommand(String),

    /// Configuration error.
    #[error("[{}] {}", error_codes::CONFIG_INVALID, .0)]
    Config(String),

    /// Channel send/receive error.
    #[error("[{}] {}", error_codes::CHANNEL_CLOSED, .0)]
    Channel(String),

    /// I/O error.
    #[error("[{}] {}", error_codes::IO_ERROR, .0)]
    Io(#[from] std::io::Error),
}

impl SessionError {
    /// Returns the stable error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::CaptureUnsupported => error_codes::CAPTURE_UNSUPPORTED,
            Self::CaptureDevice(_) => error_codes::CAPTURE_DEVICE,
            Self::CaptureBusy => error_codes::CAPTURE_BUSY,
            Self::BackendUnavailable(_) => error_codes::BACKEND_UNAVAILABLE,
            Self::SynthesisFailed(_) => error_codes::SYNTHESIS_FAILED,
            Self::Playback(_) => error_codes::PLAYBACK_FAILED,
            Self::RequestInFlight => error_codes::REQUEST_IN_FLIGHT,
            Self::EmptyMessage => error_codes::EMPTY_MESSAGE,
            Self::LanguageLocked => error_codes::LANGUAGE_LOCKED,
            Self::UnknownLanguage(_) => error_codes::UNKNOWN_LANGUAGE,
            Self::InvalidCommand(_) => error_codes::INVALID_COMMAND,
            Self::Config(_) => error_codes::CONFIG_INVALID,
            Self::Channel(_) => error_codes::CHANNEL_CLOSED,
            Self::Io(_) => error_codes::IO_ERROR,
        }
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, SessionError>;
