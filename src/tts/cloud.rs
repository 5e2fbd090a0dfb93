//! Cloud speech synthesis.
//!
//! The provider is reached through an HTTP proxy that accepts the
//! SynthesizeSpeech parameters as JSON and answers with the encoded clip.

use crate::audio::{AudioAsset, AudioFormat};
use crate::error::{Result, SessionError};
use crate::language::LanguageCode;
use crate::tts::voices::VoiceSelection;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// One synthesis call.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    /// Speakable text (markup already removed).
    pub text: String,
    pub language: LanguageCode,
    pub voice: VoiceSelection,
    /// Provider output format name, e.g. `mp3`.
    pub output_format: String,
}

/// Primary speech path: text in, playable clip out.
#[async_trait]
pub trait CloudSynthesizer: Send + Sync {
    /// # Errors
    ///
    /// Any failure (transport, quota, unsupported voice, unplayable
    /// payload) is reported as [`SessionError::SynthesisFailed`].
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<AudioAsset>;
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct SynthesizeSpeechBody<'a> {
    text: &'a str,
    output_format: &'a str,
    voice_id: &'a str,
    engine: &'a str,
    language_code: &'a str,
}

impl<'a> From<&'a SynthesisRequest> for SynthesizeSpeechBody<'a> {
    fn from(req: &'a SynthesisRequest) -> Self {
        Self {
            text: &req.text,
            output_format: &req.output_format,
            voice_id: &req.voice.voice_id,
            engine: &req.voice.engine,
            language_code: req.language.as_tag(),
        }
    }
}

/// [`CloudSynthesizer`] over HTTP (reqwest).
#[derive(Debug, Clone)]
pub struct HttpSynthesizer {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSynthesizer {
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] if the HTTP client cannot be built.
    pub fn new(endpoint: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| SessionError::Config(format!("synthesis client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl CloudSynthesizer for HttpSynthesizer {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<AudioAsset> {
        let body = SynthesizeSpeechBody::from(request);
        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| SessionError::SynthesisFailed(format!("synthesis request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SessionError::SynthesisFailed(format!(
                "synthesis endpoint returned HTTP {}",
                status.as_u16()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SessionError::SynthesisFailed(format!("synthesis body: {e}")))?;
        debug!(bytes = bytes.len(), voice = %request.voice.voice_id, "cloud clip received");

        let asset = AudioAsset::new(bytes, AudioFormat::from_name(&request.output_format))?;
        asset.probe()?;
        Ok(asset)
    }
}
