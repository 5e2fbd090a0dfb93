//! Speech recognizer seam.
//!
//! A recognizer opens one platform recognition session and yields its raw
//! events. Accumulating finals, restarting in continuous mode and
//! guaranteeing a single terminal event are the capture engine's job.

use crate::error::{Result, SessionError};
use crate::language::LanguageCode;
use async_trait::async_trait;
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;

/// Options for one recognition session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionOptions {
    pub language: LanguageCode,
    pub interim_results: bool,
    pub continuous: bool,
}

/// Why the platform recognizer gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionErrorKind {
    /// No recognition capability.
    Unsupported,
    /// Microphone missing, busy or permission denied.
    Device,
}

/// Raw event from a platform recognition session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecognitionEvent {
    /// Text for the current segment. Interim text may still change.
    Result { text: String, is_final: bool },
    /// The platform heard nothing.
    NoSpeech,
    /// The platform failed.
    Error {
        kind: RecognitionErrorKind,
        #[serde(default)]
        message: String,
    },
    /// The platform closed the session.
    End,
}

/// Events of one recognition session. The stream ending counts as `End`.
pub type RecognitionStream = Pin<Box<dyn Stream<Item = RecognitionEvent> + Send>>;

/// Opens platform recognition sessions.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// # Errors
    ///
    /// [`SessionError::CaptureUnsupported`] when recognition is absent,
    /// [`SessionError::CaptureDevice`] when the microphone cannot be opened.
    async fn start(&self, options: &RecognitionOptions) -> Result<RecognitionStream>;
}

/// Recognizer for runtimes without speech recognition.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedRecognizer;

#[async_trait]
impl SpeechRecognizer for UnsupportedRecognizer {
    async fn start(&self, _options: &RecognitionOptions) -> Result<RecognitionStream> {
        Err(SessionError::CaptureUnsupported)
    }
}

#[derive(Default)]
struct FeedSlot {
    sender: Option<mpsc::UnboundedSender<RecognitionEvent>>,
    options: Option<RecognitionOptions>,
}

/// Recognizer fed from outside the process, e.g. by a UI shell that owns
/// the platform recognition API and forwards its results.
#[derive(Clone, Default)]
pub struct ChannelRecognizer {
    slot: Arc<Mutex<FeedSlot>>,
}

/// Producer side of a [`ChannelRecognizer`].
#[derive(Clone)]
pub struct RecognitionFeed {
    slot: Arc<Mutex<FeedSlot>>,
}

impl ChannelRecognizer {
    pub fn new() -> (Self, RecognitionFeed) {
        let recognizer = Self::default();
        let feed = RecognitionFeed {
            slot: Arc::clone(&recognizer.slot),
        };
        (recognizer, feed)
    }
}

#[async_trait]
impl SpeechRecognizer for ChannelRecognizer {
    async fn start(&self, options: &RecognitionOptions) -> Result<RecognitionStream> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| SessionError::CaptureDevice("recognition feed poisoned".into()))?;
        // Replacing the sender ends any previous session's stream.
        slot.sender = Some(tx);
        slot.options = Some(*options);
        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }
}

impl RecognitionFeed {
    /// Deliver an event to the open session. Returns false when nothing is
    /// listening, in which case the event is dropped.
    pub fn push(&self, event: RecognitionEvent) -> bool {
        let Ok(mut slot) = self.slot.lock() else {
            return false;
        };
        let Some(sender) = slot.sender.as_ref() else {
            debug!(?event, "recognition event with no open session dropped");
            return false;
        };
        if sender.send(event).is_ok() {
            return true;
        }
        slot.sender = None;
        slot.options = None;
        false
    }

    /// Options of the open session, if the engine is still listening.
    pub fn active(&self) -> Option<RecognitionOptions> {
        let slot = self.slot.lock().ok()?;
        match &slot.sender {
            Some(sender) if !sender.is_closed() => slot.options,
            _ => None,
        }
    }
}
