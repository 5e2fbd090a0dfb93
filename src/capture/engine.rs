//! Speech Capture Engine.
//!
//! Runs at most one capture at a time. A capture accumulates only final
//! recognition segments into its transcript; interim text is forwarded for
//! live display and never submitted. Every capture reports exactly one
//! terminal event, [`CaptureEvent::Ended`] or [`CaptureEvent::Failed`],
//! including when it is cut short by [`SpeechCapture::stop`].

use super::recognizer::{
    RecognitionErrorKind, RecognitionEvent, RecognitionOptions, RecognitionStream,
    SpeechRecognizer,
};
use crate::error::{Result, SessionError};
use futures_util::{FutureExt, StreamExt};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Continuous captures give up after this many back-to-back recognition
/// sessions that heard nothing.
const MAX_SILENT_RESTARTS: u32 = 20;

/// Identifies one capture from `start` to its terminal event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CaptureId(u64);

impl fmt::Display for CaptureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cap-{}", self.0)
    }
}

/// Why a capture failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureFailure {
    Unsupported,
    Device(String),
}

impl CaptureFailure {
    pub fn into_error(self) -> SessionError {
        match self {
            Self::Unsupported => SessionError::CaptureUnsupported,
            Self::Device(msg) => SessionError::CaptureDevice(msg),
        }
    }
}

/// Output of the capture engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// Live preview: settled text plus the current provisional segment.
    Interim { capture: CaptureId, text: String },
    /// Capture finished; `transcript` holds every final segment.
    Ended {
        capture: CaptureId,
        transcript: String,
    },
    /// Capture terminated by a recognizer failure.
    Failed {
        capture: CaptureId,
        failure: CaptureFailure,
    },
}

impl CaptureEvent {
    pub fn capture(&self) -> CaptureId {
        match self {
            Self::Interim { capture, .. }
            | Self::Ended { capture, .. }
            | Self::Failed { capture, .. } => *capture,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Interim { .. })
    }
}

struct ActiveCapture {
    id: CaptureId,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// The Speech Capture Engine.
pub struct SpeechCapture {
    recognizer: Arc<dyn SpeechRecognizer>,
    events: mpsc::UnboundedSender<CaptureEvent>,
    current: Option<ActiveCapture>,
    next_id: u64,
}

impl SpeechCapture {
    pub fn new(
        recognizer: Arc<dyn SpeechRecognizer>,
        events: mpsc::UnboundedSender<CaptureEvent>,
    ) -> Self {
        Self {
            recognizer,
            events,
            current: None,
            next_id: 0,
        }
    }

    /// Open the microphone and begin a capture.
    ///
    /// # Errors
    ///
    /// [`SessionError::CaptureBusy`] while another capture is running; the
    /// recognizer's own error when it cannot start.
    pub async fn start(&mut self, options: RecognitionOptions) -> Result<CaptureId> {
        if self.is_active() {
            return Err(SessionError::CaptureBusy);
        }
        // A finished capture may still be parked here; its task is done.
        self.current = None;

        let stream = self.recognizer.start(&options).await?;

        self.next_id += 1;
        let id = CaptureId(self.next_id);
        let cancel = CancellationToken::new();
        let task = CaptureTask {
            id,
            recognizer: Arc::clone(&self.recognizer),
            options,
            cancel: cancel.clone(),
            events: self.events.clone(),
            transcript: Transcript::default(),
        };
        info!(capture = %id, language = %options.language, continuous = options.continuous, "capture started");
        let task = tokio::spawn(task.run(stream));

        self.current = Some(ActiveCapture { id, cancel, task });
        Ok(id)
    }

    /// Stop the running capture. Its `Ended` event (carrying what was
    /// finalized so far) is sent before this returns. Safe when idle.
    pub async fn stop(&mut self) -> Option<CaptureId> {
        let active = self.current.take()?;
        active.cancel.cancel();
        if let Err(e) = active.task.await {
            warn!(capture = %active.id, "capture task failed: {e}");
        }
        Some(active.id)
    }

    /// The running capture, if any.
    pub fn current(&self) -> Option<CaptureId> {
        self.current
            .as_ref()
            .filter(|a| !a.task.is_finished())
            .map(|a| a.id)
    }

    pub fn is_active(&self) -> bool {
        self.current().is_some()
    }
}

impl Drop for SpeechCapture {
    fn drop(&mut self) {
        if let Some(active) = self.current.take() {
            active.cancel.cancel();
        }
    }
}

/// Final segments heard so far.
#[derive(Debug, Default)]
struct Transcript {
    settled: String,
}

impl Transcript {
    fn push_final(&mut self, segment: &str) {
        let segment = segment.trim();
        if segment.is_empty() {
            return;
        }
        if !self.settled.is_empty() {
            self.settled.push(' ');
        }
        self.settled.push_str(segment);
    }

    fn preview(&self, interim: &str) -> String {
        let interim = interim.trim();
        match (self.settled.is_empty(), interim.is_empty()) {
            (_, true) => self.settled.clone(),
            (true, false) => interim.to_owned(),
            (false, false) => format!("{} {interim}", self.settled),
        }
    }
}

struct CaptureTask {
    id: CaptureId,
    recognizer: Arc<dyn SpeechRecognizer>,
    options: RecognitionOptions,
    cancel: CancellationToken,
    events: mpsc::UnboundedSender<CaptureEvent>,
    transcript: Transcript,
}

impl CaptureTask {
    async fn run(mut self, mut stream: RecognitionStream) {
        let mut heard_since_restart = false;
        let mut silent_restarts = 0u32;

        let terminal = loop {
            let event = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!(capture = %self.id, "capture stopped");
                    self.take_queued_finals(&mut stream);
                    break self.ended();
                }
                event = stream.next() => event.unwrap_or(RecognitionEvent::End),
            };

            match event {
                RecognitionEvent::Result { text, is_final } => {
                    heard_since_restart = true;
                    if is_final {
                        self.transcript.push_final(&text);
                    } else if self.options.interim_results {
                        let preview = self.transcript.preview(&text);
                        let _ = self.events.send(CaptureEvent::Interim {
                            capture: self.id,
                            text: preview,
                        });
                    }
                }
                RecognitionEvent::NoSpeech => {
                    if !self.options.continuous {
                        break self.ended();
                    }
                    debug!(capture = %self.id, "no speech, still listening");
                }
                RecognitionEvent::Error { kind, message } => {
                    warn!(capture = %self.id, ?kind, "recognition failed: {message}");
                    let failure = match kind {
                        RecognitionErrorKind::Unsupported => CaptureFailure::Unsupported,
                        RecognitionErrorKind::Device => CaptureFailure::Device(message),
                    };
                    break CaptureEvent::Failed {
                        capture: self.id,
                        failure,
                    };
                }
                RecognitionEvent::End => {
                    if !self.options.continuous {
                        break self.ended();
                    }
                    if heard_since_restart {
                        silent_restarts = 0;
                    } else {
                        silent_restarts += 1;
                    }
                    if silent_restarts >= MAX_SILENT_RESTARTS {
                        info!(capture = %self.id, "long silence, ending continuous capture");
                        break self.ended();
                    }
                    heard_since_restart = false;
                    match self.restart().await {
                        Ok(Some(next)) => stream = next,
                        Ok(None) => break self.ended(),
                        Err(failure) => {
                            break CaptureEvent::Failed {
                                capture: self.id,
                                failure,
                            };
                        }
                    }
                }
            }
        };

        // Close the recognition session before reporting, so feeds see it gone.
        drop(stream);
        let _ = self.events.send(terminal);
    }

    /// Keep final segments the recognizer delivered before the stop.
    fn take_queued_finals(&mut self, stream: &mut RecognitionStream) {
        while let Some(Some(event)) = stream.next().now_or_never() {
            if let RecognitionEvent::Result {
                text,
                is_final: true,
            } = event
            {
                self.transcript.push_final(&text);
            }
        }
    }

    /// Reopen recognition for the next continuous segment. `Ok(None)` means
    /// the capture was stopped meanwhile.
    async fn restart(&self) -> std::result::Result<Option<RecognitionStream>, CaptureFailure> {
        debug!(capture = %self.id, "recognition segment ended, restarting");
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Ok(None),
            res = self.recognizer.start(&self.options) => match res {
                Ok(stream) => Ok(Some(stream)),
                Err(SessionError::CaptureUnsupported) => Err(CaptureFailure::Unsupported),
                Err(e) => Err(CaptureFailure::Device(e.to_string())),
            },
        }
    }

    fn ended(&mut self) -> CaptureEvent {
        let transcript = std::mem::take(&mut self.transcript.settled);
        info!(capture = %self.id, chars = transcript.len(), "capture ended");
        CaptureEvent::Ended {
            capture: self.id,
            transcript,
        }
    }
}
