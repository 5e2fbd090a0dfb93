//! Versioned command/response/event envelopes for the host shell.

use crate::session::SessionEvent;
use serde::{Deserialize, Serialize};

/// Contract version for host command/event envelopes.
pub const EVENT_VERSION: u32 = 1;

/// Commands a host shell may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandName {
    #[serde(rename = "host.ping")]
    HostPing,
    #[serde(rename = "host.version")]
    HostVersion,
    #[serde(rename = "session.send_text")]
    SessionSendText,
    #[serde(rename = "session.voice_start")]
    SessionVoiceStart,
    #[serde(rename = "session.voice_stop")]
    SessionVoiceStop,
    #[serde(rename = "session.mute_set")]
    SessionMuteSet,
    #[serde(rename = "session.language_set")]
    SessionLanguageSet,
    #[serde(rename = "session.new")]
    SessionNew,
    #[serde(rename = "session.status")]
    SessionStatus,
    #[serde(rename = "capture.feed")]
    CaptureFeed,
    #[serde(rename = "runtime.stop")]
    RuntimeStop,
}

impl CommandName {
    pub const ALL: [Self; 11] = [
        Self::HostPing,
        Self::HostVersion,
        Self::SessionSendText,
        Self::SessionVoiceStart,
        Self::SessionVoiceStop,
        Self::SessionMuteSet,
        Self::SessionLanguageSet,
        Self::SessionNew,
        Self::SessionStatus,
        Self::CaptureFeed,
        Self::RuntimeStop,
    ];

    /// Render command name to wire format.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HostPing => "host.ping",
            Self::HostVersion => "host.version",
            Self::SessionSendText => "session.send_text",
            Self::SessionVoiceStart => "session.voice_start",
            Self::SessionVoiceStop => "session.voice_stop",
            Self::SessionMuteSet => "session.mute_set",
            Self::SessionLanguageSet => "session.language_set",
            Self::SessionNew => "session.new",
            Self::SessionStatus => "session.status",
            Self::CaptureFeed => "capture.feed",
            Self::RuntimeStop => "runtime.stop",
        }
    }

    /// Parse a command name from wire format.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|name| name.as_str() == raw)
    }
}

/// A versioned response envelope from engine -> host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub v: u32,
    pub request_id: String,
    pub ok: bool,
    pub payload: serde_json::Value,
    pub error: Option<String>,
    /// Stable error code when `ok` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ResponseEnvelope {
    /// Build a successful response envelope.
    #[must_use]
    pub fn ok(request_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            v: EVENT_VERSION,
            request_id: request_id.into(),
            ok: true,
            payload,
            error: None,
            code: None,
        }
    }

    /// Build an error response envelope.
    #[must_use]
    pub fn error(request_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            v: EVENT_VERSION,
            request_id: request_id.into(),
            ok: false,
            payload: serde_json::Value::Null,
            error: Some(message.into()),
            code: None,
        }
    }

    /// Error response carrying the engine's stable code.
    #[must_use]
    pub fn from_error(request_id: impl Into<String>, err: &crate::SessionError) -> Self {
        Self {
            code: Some(err.code().to_owned()),
            ..Self::error(request_id, err.to_string())
        }
    }
}

/// A versioned command envelope from host -> engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub v: u32,
    pub request_id: String,
    pub command: CommandName,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl CommandEnvelope {
    /// Build a v1 command envelope.
    #[must_use]
    pub fn new(
        request_id: impl Into<String>,
        command: CommandName,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            v: EVENT_VERSION,
            request_id: request_id.into(),
            command,
            payload,
        }
    }

    /// Validate envelope version and required identifiers.
    pub fn validate(&self) -> Result<(), ContractError> {
        if self.v != EVENT_VERSION {
            return Err(ContractError::new(
                ContractErrorKind::UnsupportedVersion,
                format!(
                    "unsupported contract version {}; expected {}",
                    self.v, EVENT_VERSION
                ),
            ));
        }
        if self.request_id.trim().is_empty() {
            return Err(ContractError::new(
                ContractErrorKind::InvalidEnvelope,
                "request_id cannot be empty".to_owned(),
            ));
        }
        Ok(())
    }
}

/// A versioned event envelope from engine -> host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub v: u32,
    pub event_id: String,
    pub event: String,
    pub payload: serde_json::Value,
}

impl EventEnvelope {
    /// Build a v1 event envelope.
    #[must_use]
    pub fn new(
        event_id: impl Into<String>,
        event: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            v: EVENT_VERSION,
            event_id: event_id.into(),
            event: event.into(),
            payload,
        }
    }

    /// Wrap a session event as `session.<kind>`, numbered by `seq`.
    ///
    /// The event's own fields become the payload.
    pub fn from_session_event(seq: u64, event: &SessionEvent) -> serde_json::Result<Self> {
        let mut payload = serde_json::to_value(event)?;
        let kind = payload
            .as_object_mut()
            .and_then(|fields| fields.remove("event"))
            .and_then(|tag| tag.as_str().map(str::to_owned))
            .unwrap_or_else(|| "unknown".to_owned());
        Ok(Self::new(
            format!("evt-{seq}"),
            format!("session.{kind}"),
            payload,
        ))
    }
}

/// Contract validation error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractErrorKind {
    UnsupportedVersion,
    InvalidEnvelope,
}

/// Contract validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractError {
    pub kind: ContractErrorKind,
    pub message: String,
}

impl ContractError {
    #[must_use]
    pub fn new(kind: ContractErrorKind, message: String) -> Self {
        Self { kind, message }
    }
}

impl std::fmt::Display for ContractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ContractError {}
