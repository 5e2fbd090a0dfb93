//! Wire format of the AI backend.
//!
//! Both directions wrap the real payload as a JSON *string* in a `body`
//! field: `{"body": "{\"message\": ...}"}`. The remote contract is fixed,
//! so the double encoding is reproduced exactly.

use crate::conversation::SessionId;
use crate::error::{Result, SessionError};
use crate::language::LanguageCode;
use serde::{Deserialize, Serialize};

/// One outbound chat turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendRequest {
    pub message: String,
    pub session_id: SessionId,
    /// `None` omits the `lang` field (interviewer surface).
    pub language: Option<LanguageCode>,
    /// Opaque user identity; empty when unknown.
    pub email: String,
}

/// The backend's answer to one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendReply {
    /// Raw reply text, possibly with markdown-ish emphasis.
    pub text: String,
    /// Server-assigned session continuation, if any.
    pub session_id: Option<SessionId>,
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    body: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestBody<'a> {
    message: &'a str,
    session_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    lang: Option<&'static str>,
    email: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReplyBody {
    response: String,
    #[serde(default)]
    session_id: Option<String>,
}

/// Serialize `request` into the double-encoded envelope.
///
/// # Errors
///
/// Serialization failures map to [`SessionError::BackendUnavailable`].
pub fn encode_request(request: &BackendRequest) -> Result<String> {
    let inner = RequestBody {
        message: &request.message,
        session_id: request.session_id.as_str(),
        lang: request.language.map(LanguageCode::as_tag),
        email: &request.email,
    };
    let body = serde_json::to_string(&inner).map_err(unavailable)?;
    serde_json::to_string(&Envelope { body }).map_err(unavailable)
}

/// Unwrap a double-encoded reply.
///
/// # Errors
///
/// Anything other than `{"body": "<json with a string response>"}` is
/// [`SessionError::BackendUnavailable`].
pub fn decode_reply(raw: &str) -> Result<BackendReply> {
    let envelope: Envelope = serde_json::from_str(raw)
        .map_err(|e| SessionError::BackendUnavailable(format!("bad reply envelope: {e}")))?;
    let body: ReplyBody = serde_json::from_str(&envelope.body)
        .map_err(|e| SessionError::BackendUnavailable(format!("bad reply body: {e}")))?;
    Ok(BackendReply {
        text: body.response,
        // An empty id means "no change".
        session_id: body
            .session_id
            .filter(|id| !id.is_empty())
            .map(SessionId::from_server),
    })
}

fn unavailable(e: serde_json::Error) -> SessionError {
    SessionError::BackendUnavailable(format!("cannot encode request: {e}"))
}
