//! Routes host command envelopes onto a running session.

use crate::capture::{RecognitionEvent, RecognitionFeed};
use crate::error::{Result, SessionError};
use crate::host::contract::{CommandEnvelope, CommandName, EVENT_VERSION, ResponseEnvelope};
use crate::language::LanguageCode;
use crate::session::{SessionHandle, VoiceStart};

/// Dispatches [`CommandEnvelope`]s to a [`SessionHandle`].
///
/// `capture.feed` needs a [`RecognitionFeed`]; without one the host is told
/// that nothing was delivered.
#[derive(Clone)]
pub struct HostRouter {
    session: SessionHandle,
    feed: Option<RecognitionFeed>,
}

impl HostRouter {
    pub fn new(session: SessionHandle, feed: Option<RecognitionFeed>) -> Self {
        Self { session, feed }
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// Route one envelope. Never fails: engine errors become error
    /// responses carrying their stable code.
    pub async fn dispatch(&self, envelope: &CommandEnvelope) -> ResponseEnvelope {
        if let Err(e) = envelope.validate() {
            return ResponseEnvelope::error(envelope.request_id.clone(), e.to_string());
        }
        match self.route(envelope).await {
            Ok(payload) => ResponseEnvelope::ok(envelope.request_id.clone(), payload),
            Err(e) => {
                tracing::debug!(
                    command = envelope.command.as_str(),
                    code = e.code(),
                    "host command rejected"
                );
                ResponseEnvelope::from_error(envelope.request_id.clone(), &e)
            }
        }
    }

    async fn route(&self, envelope: &CommandEnvelope) -> Result<serde_json::Value> {
        let payload = &envelope.payload;
        match envelope.command {
            CommandName::HostPing => Ok(serde_json::json!({"pong": true})),
            CommandName::HostVersion => Ok(serde_json::json!({
                "contract_version": EVENT_VERSION,
                "engine": env!("CARGO_PKG_VERSION"),
            })),
            CommandName::SessionSendText => {
                let text = parse_text(payload)?;
                self.session.send_text(text).await?;
                Ok(serde_json::json!({"accepted": true}))
            }
            CommandName::SessionVoiceStart => {
                let started = self.session.start_voice().await?;
                let options = match started {
                    VoiceStart::Listening => self.feed.as_ref().and_then(RecognitionFeed::active),
                    VoiceStart::Unavailable => None,
                };
                Ok(serde_json::json!({
                    "listening": started == VoiceStart::Listening,
                    "options": options,
                }))
            }
            CommandName::SessionVoiceStop => {
                self.session.stop_voice().await?;
                Ok(serde_json::json!({"accepted": true}))
            }
            CommandName::SessionMuteSet => {
                let muted = parse_muted(payload)?;
                self.session.set_muted(muted).await?;
                Ok(serde_json::json!({"muted": muted}))
            }
            CommandName::SessionLanguageSet => {
                let language = parse_language(payload)?;
                self.session.set_language(language).await?;
                Ok(serde_json::json!({"language": language}))
            }
            CommandName::SessionNew => {
                let session_id = self.session.new_conversation().await?;
                Ok(serde_json::json!({"session_id": session_id}))
            }
            CommandName::SessionStatus => {
                let snapshot = self.session.snapshot().await?;
                serde_json::to_value(snapshot)
                    .map_err(|e| SessionError::Channel(format!("snapshot not serializable: {e}")))
            }
            CommandName::CaptureFeed => {
                let event = parse_recognition_event(payload)?;
                let delivered = self.feed.as_ref().is_some_and(|feed| feed.push(event));
                Ok(serde_json::json!({"delivered": delivered}))
            }
            CommandName::RuntimeStop => {
                self.session.shutdown().await?;
                Ok(serde_json::json!({"stopped": true}))
            }
        }
    }
}

fn parse_text(payload: &serde_json::Value) -> Result<String> {
    let Some(text) = payload.get("text").and_then(serde_json::Value::as_str) else {
        return Err(SessionError::InvalidCommand(
            "session.send_text requires payload.text".to_owned(),
        ));
    };
    Ok(text.to_owned())
}

fn parse_muted(payload: &serde_json::Value) -> Result<bool> {
    let Some(muted) = payload.get("muted").and_then(serde_json::Value::as_bool) else {
        return Err(SessionError::InvalidCommand(
            "session.mute_set requires payload.muted (boolean)".to_owned(),
        ));
    };
    Ok(muted)
}

fn parse_language(payload: &serde_json::Value) -> Result<LanguageCode> {
    let Some(tag) = payload.get("language").and_then(serde_json::Value::as_str) else {
        return Err(SessionError::InvalidCommand(
            "session.language_set requires payload.language".to_owned(),
        ));
    };
    tag.trim().parse()
}

fn parse_recognition_event(payload: &serde_json::Value) -> Result<RecognitionEvent> {
    serde_json::from_value(payload.clone())
        .map_err(|e| SessionError::InvalidCommand(format!("capture.feed payload: {e}")))
}
