//! HTTP transport for the AI backend.

use super::envelope::{BackendReply, BackendRequest, decode_reply, encode_request};
use crate::config::BackendConfig;
use crate::error::{Result, SessionError};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Sends one chat turn and returns the parsed reply.
///
/// A single attempt; failures surface as one
/// [`SessionError::BackendUnavailable`] with no partial result.
#[async_trait]
pub trait BackendClient: Send + Sync {
    async fn send(&self, request: &BackendRequest) -> Result<BackendReply>;
}

/// [`BackendClient`] over HTTP POST (reqwest).
#[derive(Debug, Clone)]
pub struct HttpBackendClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpBackendClient {
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] if the HTTP client cannot be built.
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| SessionError::Config(format!("backend client: {e}")))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl BackendClient for HttpBackendClient {
    async fn send(&self, request: &BackendRequest) -> Result<BackendReply> {
        let payload = encode_request(request)?;
        debug!(session_id = %request.session_id, endpoint = %self.endpoint, "posting chat turn");

        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await
            .map_err(|e| SessionError::BackendUnavailable(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SessionError::BackendUnavailable(format!(
                "HTTP error! status: {}",
                status.as_u16()
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| SessionError::BackendUnavailable(format!("reading reply: {e}")))?;
        decode_reply(&text)
    }
}
