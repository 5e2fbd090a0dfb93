//! Session Controller.
//!
//! A single task owns the conversation, both speech engines and the turn
//! state. Host commands arrive over an mpsc channel; engine and backend
//! completions arrive on their own channels, tagged with the capture,
//! utterance or session id they belong to. Completions whose tag no longer
//! matches the controller's view are stale and dropped.

use super::events::{NoticeKind, SessionEvent, SessionSnapshot, SessionState, VoiceStart};
use super::handle::SessionHandle;
use crate::backend::{BackendClient, BackendReply, BackendRequest, HttpBackendClient};
use crate::capture::{
    CaptureEvent, CaptureFailure, CaptureId, RecognitionOptions, SpeechCapture, SpeechRecognizer,
};
use crate::config::AssistantConfig;
use crate::conversation::{ConversationSession, Sender, SessionId};
use crate::error::{Result, SessionError};
use crate::format::format_for_display;
use crate::language::LanguageCode;
use crate::media::{CameraAccess, NoCamera};
use crate::tts::{OutputSettings, SpeechBackends, SpeechFinished, SpeechOutput, UtteranceId};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const COMMAND_CAPACITY: usize = 64;
const EVENT_CAPACITY: usize = 256;

/// Requests from a [`SessionHandle`].
pub(crate) enum Command {
    SendText {
        text: String,
        reply: oneshot::Sender<Result<()>>,
    },
    StartVoice {
        reply: oneshot::Sender<Result<VoiceStart>>,
    },
    StopVoice {
        reply: oneshot::Sender<Result<()>>,
    },
    SetMuted {
        muted: bool,
        reply: oneshot::Sender<Result<()>>,
    },
    SetLanguage {
        language: LanguageCode,
        reply: oneshot::Sender<Result<()>>,
    },
    NewConversation {
        reply: oneshot::Sender<Result<SessionId>>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Everything the controller talks to.
pub struct SessionParts {
    pub config: AssistantConfig,
    pub backend: Arc<dyn BackendClient>,
    pub recognizer: Arc<dyn SpeechRecognizer>,
    pub speech: SpeechBackends,
    pub camera: Arc<dyn CameraAccess>,
}

impl SessionParts {
    /// Production wiring: HTTP backend, system speech, no camera.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend client cannot be built.
    pub fn from_config(
        config: AssistantConfig,
        recognizer: Arc<dyn SpeechRecognizer>,
    ) -> Result<Self> {
        let backend = Arc::new(HttpBackendClient::new(&config.backend)?);
        let speech = SpeechBackends::from_config(&config.tts);
        Ok(Self {
            config,
            backend,
            recognizer,
            speech,
            camera: Arc::new(NoCamera),
        })
    }
}

struct BackendCompletion {
    /// Session id the request went out under.
    sent_with: SessionId,
    result: Result<BackendReply>,
}

/// The controller task's state.
pub struct SessionController {
    config: AssistantConfig,
    backend: Arc<dyn BackendClient>,
    camera: Arc<dyn CameraAccess>,
    capture: SpeechCapture,
    speech: SpeechOutput,

    session: Option<ConversationSession>,
    language: LanguageCode,
    muted: bool,
    state: SessionState,
    camera_held: bool,

    active_capture: Option<CaptureId>,
    active_utterance: Option<UtteranceId>,
    pending_request: Option<SessionId>,
    backend_task: Option<JoinHandle<()>>,

    events: broadcast::Sender<SessionEvent>,
    capture_rx: mpsc::UnboundedReceiver<CaptureEvent>,
    speech_rx: mpsc::UnboundedReceiver<SpeechFinished>,
    backend_tx: mpsc::UnboundedSender<BackendCompletion>,
    backend_rx: mpsc::UnboundedReceiver<BackendCompletion>,
}

impl SessionController {
    /// Start the controller task. It runs until [`SessionHandle::shutdown`]
    /// or until every handle is dropped.
    pub fn spawn(parts: SessionParts) -> (SessionHandle, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (capture_tx, capture_rx) = mpsc::unbounded_channel();
        let (speech_tx, speech_rx) = mpsc::unbounded_channel();
        let (backend_tx, backend_rx) = mpsc::unbounded_channel();

        let SessionParts {
            config,
            backend,
            recognizer,
            speech,
            camera,
        } = parts;

        let settings = OutputSettings::from(&config.tts);
        let language = config.profile.default_language;
        let controller = Self {
            capture: SpeechCapture::new(recognizer, capture_tx),
            speech: SpeechOutput::new(speech, settings, speech_tx),
            config,
            backend,
            camera,
            session: None,
            language,
            muted: false,
            state: SessionState::Idle,
            camera_held: false,
            active_capture: None,
            active_utterance: None,
            pending_request: None,
            backend_task: None,
            events: events.clone(),
            capture_rx,
            speech_rx,
            backend_tx,
            backend_rx,
        };

        let task = tokio::spawn(controller.run(command_rx));
        (SessionHandle::new(command_tx, events), task)
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        info!(profile = ?self.config.profile.kind, language = %self.language, "session controller started");
        self.acquire_camera().await;

        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(Command::Shutdown { reply }) => {
                        self.teardown().await;
                        let _ = reply.send(());
                        break;
                    }
                    Some(cmd) => self.handle_command(cmd).await,
                    None => {
                        debug!("all session handles dropped");
                        self.teardown().await;
                        break;
                    }
                },
                Some(event) = self.capture_rx.recv() => self.on_capture(event).await,
                Some(done) = self.speech_rx.recv() => self.on_speech_finished(done),
                Some(done) = self.backend_rx.recv() => self.on_backend(done).await,
            }
        }
        info!("session controller stopped");
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::SendText { text, reply } => {
                let _ = reply.send(self.send_text(text).await);
            }
            Command::StartVoice { reply } => {
                let _ = reply.send(self.start_voice().await);
            }
            Command::StopVoice { reply } => {
                let _ = reply.send(self.stop_voice().await);
            }
            Command::SetMuted { muted, reply } => {
                let _ = reply.send(self.set_muted(muted).await);
            }
            Command::SetLanguage { language, reply } => {
                let _ = reply.send(self.set_language(language));
            }
            Command::NewConversation { reply } => {
                let _ = reply.send(Ok(self.new_conversation().await));
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            // Handled by the run loop.
            Command::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }

    // ── Commands ───────────────────────────────────────────────

    async fn send_text(&mut self, text: String) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::EmptyMessage);
        }
        match self.state {
            SessionState::AwaitingResponse => return Err(SessionError::RequestInFlight),
            SessionState::Capturing => self.abandon_capture().await,
            SessionState::Speaking => self.silence().await,
            SessionState::Idle => {}
        }
        self.submit(text.to_owned());
        Ok(())
    }

    async fn start_voice(&mut self) -> Result<VoiceStart> {
        match self.state {
            SessionState::Capturing => return Err(SessionError::CaptureBusy),
            SessionState::AwaitingResponse => return Err(SessionError::RequestInFlight),
            SessionState::Speaking => self.silence().await,
            SessionState::Idle => {}
        }

        let options = RecognitionOptions {
            language: self.language,
            interim_results: self.config.capture.interim_results,
            continuous: self.config.capture.continuous,
        };
        match self.capture.start(options).await {
            Ok(id) => {
                self.active_capture = Some(id);
                self.set_state(SessionState::Capturing);
                Ok(VoiceStart::Listening)
            }
            Err(SessionError::CaptureUnsupported) => {
                self.notice(
                    NoticeKind::CaptureUnsupported,
                    "Speech recognition is not supported here. You can still type your message.",
                );
                Ok(VoiceStart::Unavailable)
            }
            Err(SessionError::CaptureBusy) => Err(SessionError::CaptureBusy),
            Err(e) => {
                warn!("capture failed to start: {e}");
                self.notice(
                    NoticeKind::CaptureDevice,
                    "The microphone is unavailable. You can still type your message.",
                );
                Ok(VoiceStart::Unavailable)
            }
        }
    }

    /// Ends listening and applies the capture's terminal event before
    /// returning, so the caller sees the settled turn.
    async fn stop_voice(&mut self) -> Result<()> {
        if self.state != SessionState::Capturing {
            return Ok(());
        }
        // The task has queued its terminal event by the time this returns.
        self.capture.stop().await;
        while self.active_capture.is_some() {
            let Ok(event) = self.capture_rx.try_recv() else {
                break;
            };
            self.on_capture(event).await;
        }
        if self.active_capture.take().is_some() {
            warn!("capture stopped without a terminal event");
            self.set_state(SessionState::Idle);
        }
        Ok(())
    }

    async fn set_muted(&mut self, muted: bool) -> Result<()> {
        if self.muted != muted {
            self.muted = muted;
            info!(muted, "mute changed");
            self.emit(SessionEvent::MutedChanged { muted });
        }
        if muted {
            self.silence().await;
        }
        Ok(())
    }

    fn set_language(&mut self, language: LanguageCode) -> Result<()> {
        if matches!(
            self.state,
            SessionState::Capturing | SessionState::Speaking
        ) {
            return Err(SessionError::LanguageLocked);
        }
        if self.language == language {
            return Ok(());
        }
        self.language = language;
        if let Some(session) = self.session.as_mut() {
            session.set_language(language);
        }
        info!(%language, "language changed");
        self.emit(SessionEvent::LanguageChanged { language });
        Ok(())
    }

    async fn new_conversation(&mut self) -> SessionId {
        self.abandon_capture().await;
        self.silence().await;
        if let Some(stale) = self.pending_request.take() {
            debug!(session_id = %stale, "in-flight reply will be ignored");
        }

        let language = self.language;
        let session = self
            .session
            .get_or_insert_with(|| ConversationSession::new(language));
        session.reset();
        session.set_language(language);
        let session_id = session.id().clone();
        info!(session_id = %session_id, "new conversation");

        self.set_state(SessionState::Idle);
        self.emit(SessionEvent::ConversationReset {
            session_id: session_id.clone(),
        });
        session_id
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            title: self.config.profile.title.clone(),
            state: self.state,
            session_id: self.session.as_ref().map(|s| s.id().clone()),
            language: self.language,
            muted: self.muted,
            messages: self
                .session
                .as_ref()
                .map(|s| s.messages().to_vec())
                .unwrap_or_default(),
            greeting: self.config.profile.greeting(self.language).to_owned(),
            camera_active: self.camera_held,
        }
    }

    // ── Turn flow ──────────────────────────────────────────────

    /// Append the user's message and send it. Caller guarantees no other
    /// request is in flight.
    fn submit(&mut self, text: String) {
        let language = self.language;
        let session = self
            .session
            .get_or_insert_with(|| ConversationSession::new(language));
        let session_id = session.id().clone();
        let message = session.append(Sender::User, text.clone()).clone();
        self.emit(SessionEvent::MessageAppended {
            session_id: session_id.clone(),
            message,
        });

        let request = BackendRequest {
            message: text,
            session_id: session_id.clone(),
            language: self.config.profile.send_language.then_some(language),
            email: self.config.identity.email.clone(),
        };
        info!(session_id = %session_id, "sending turn to backend");

        self.pending_request = Some(session_id.clone());
        self.set_state(SessionState::AwaitingResponse);

        let backend = Arc::clone(&self.backend);
        let done = self.backend_tx.clone();
        self.backend_task = Some(tokio::spawn(async move {
            let result = backend.send(&request).await;
            let _ = done.send(BackendCompletion {
                sent_with: session_id,
                result,
            });
        }));
    }

    async fn on_backend(&mut self, done: BackendCompletion) {
        if self.pending_request.as_ref() != Some(&done.sent_with) {
            debug!(session_id = %done.sent_with, "dropping stale backend reply");
            return;
        }
        self.pending_request = None;
        self.backend_task = None;

        let Some(session) = self.session.as_mut() else {
            return;
        };

        let reply = match done.result {
            Ok(reply) => reply,
            Err(e) => {
                warn!(session_id = %done.sent_with, "backend unavailable: {e}");
                let message = session
                    .append(Sender::Assistant, self.config.backend.apology_text.clone())
                    .clone();
                let session_id = session.id().clone();
                self.emit(SessionEvent::MessageAppended {
                    session_id,
                    message,
                });
                self.set_state(SessionState::Idle);
                return;
            }
        };

        if let Some(server_id) = reply.session_id {
            if &server_id != session.id() {
                info!(session_id = %server_id, "adopting server session id");
                session.adopt_id(server_id.clone());
                self.emit(SessionEvent::SessionAdopted {
                    session_id: server_id,
                });
            }
        }

        let Some(session) = self.session.as_mut() else {
            return;
        };
        let message = session
            .append(Sender::Assistant, format_for_display(&reply.text))
            .clone();
        let session_id = session.id().clone();
        self.emit(SessionEvent::MessageAppended {
            session_id,
            message,
        });

        if self.muted {
            self.set_state(SessionState::Idle);
            return;
        }
        let utterance = self.speech.speak(&reply.text, self.language).await;
        self.active_utterance = Some(utterance);
        self.set_state(SessionState::Speaking);
        self.emit(SessionEvent::SpeechStarted { utterance });
    }

    async fn on_capture(&mut self, event: CaptureEvent) {
        if self.active_capture != Some(event.capture()) {
            debug!(capture = %event.capture(), "dropping stale capture event");
            return;
        }
        match event {
            CaptureEvent::Interim { text, .. } => {
                self.emit(SessionEvent::InterimTranscript { text });
            }
            CaptureEvent::Ended { transcript, .. } => {
                self.active_capture = None;
                let transcript = transcript.trim();
                if transcript.is_empty() {
                    debug!("capture ended with nothing to send");
                    self.set_state(SessionState::Idle);
                } else if self.config.capture.auto_submit {
                    self.submit(transcript.to_owned());
                } else {
                    self.emit(SessionEvent::DraftReady {
                        text: transcript.to_owned(),
                    });
                    self.set_state(SessionState::Idle);
                }
            }
            CaptureEvent::Failed { failure, .. } => {
                self.active_capture = None;
                // Release the finished task's slot.
                self.capture.stop().await;
                let (kind, message) = match &failure {
                    CaptureFailure::Unsupported => (
                        NoticeKind::CaptureUnsupported,
                        "Speech recognition is not supported here. You can still type your message.",
                    ),
                    CaptureFailure::Device(_) => (
                        NoticeKind::CaptureDevice,
                        "The microphone is unavailable. You can still type your message.",
                    ),
                };
                warn!("capture failed: {}", failure.into_error());
                self.notice(kind, message);
                self.set_state(SessionState::Idle);
            }
        }
    }

    fn on_speech_finished(&mut self, done: SpeechFinished) {
        if self.active_utterance != Some(done.utterance) {
            return;
        }
        self.active_utterance = None;
        debug!(utterance = %done.utterance, outcome = ?done.outcome, "speech finished");
        self.emit(SessionEvent::SpeechFinished {
            utterance: done.utterance,
        });
        if self.state == SessionState::Speaking {
            self.set_state(SessionState::Idle);
        }
    }

    // ── Helpers ────────────────────────────────────────────────

    /// Stop capture and discard whatever it heard.
    async fn abandon_capture(&mut self) {
        self.active_capture = None;
        self.capture.stop().await;
        if self.state == SessionState::Capturing {
            self.set_state(SessionState::Idle);
        }
    }

    /// Stop any speech immediately.
    async fn silence(&mut self) {
        self.speech.stop().await;
        if let Some(utterance) = self.active_utterance.take() {
            self.emit(SessionEvent::SpeechFinished { utterance });
        }
        if self.state == SessionState::Speaking {
            self.set_state(SessionState::Idle);
        }
    }

    async fn acquire_camera(&mut self) {
        if !self.config.profile.requires_camera {
            return;
        }
        match self.camera.acquire().await {
            Ok(()) => {
                self.camera_held = true;
                info!("camera acquired");
            }
            Err(e) => {
                warn!("camera unavailable: {e}");
                self.notice(
                    NoticeKind::CameraUnavailable,
                    "The camera could not be started. The interview can continue without video.",
                );
            }
        }
    }

    async fn teardown(&mut self) {
        self.abandon_capture().await;
        self.silence().await;
        if let Some(task) = self.backend_task.take() {
            task.abort();
        }
        self.pending_request = None;
        if self.camera_held {
            self.camera.release().await;
            self.camera_held = false;
            info!("camera released");
        }
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            debug!(from = ?self.state, to = ?state, "state");
            self.state = state;
            self.emit(SessionEvent::StateChanged { state });
        }
    }

    fn notice(&self, kind: NoticeKind, message: &str) {
        self.emit(SessionEvent::Notice {
            kind,
            message: message.to_owned(),
        });
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
