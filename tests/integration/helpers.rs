//! Shared fakes and event helpers for integration tests.

use async_trait::async_trait;
use guidevoice::audio::PlaybackOutcome;
use guidevoice::backend::{BackendClient, BackendReply, BackendRequest};
use guidevoice::capture::{SpeechRecognizer, UnsupportedRecognizer};
use guidevoice::config::AssistantConfig;
use guidevoice::media::CameraAccess;
use guidevoice::session::{
    ProfileKind, SessionController, SessionEvent, SessionHandle, SessionParts, SessionState,
};
use guidevoice::tts::{LocalSynthesizer, LocalUtterance, SpeechBackends};
use guidevoice::{Result, SessionError, SessionId};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Semaphore, broadcast};
use tokio_util::sync::CancellationToken;

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

/// Backend that answers from a script and records every request.
///
/// When built with [`ScriptedBackend::held`], each reply waits for a permit
/// released through [`ScriptedBackend::release`].
pub(crate) struct ScriptedBackend {
    replies: Mutex<VecDeque<Result<BackendReply>>>,
    requests: Mutex<Vec<BackendRequest>>,
    gate: Option<Semaphore>,
}

impl ScriptedBackend {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            gate: None,
        })
    }

    pub(crate) fn held() -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            gate: Some(Semaphore::new(0)),
        })
    }

    pub(crate) fn reply(&self, text: &str, session_id: Option<&str>) {
        self.replies.lock().unwrap().push_back(Ok(BackendReply {
            text: text.to_owned(),
            session_id: session_id.map(SessionId::from_server),
        }));
    }

    pub(crate) fn fail(&self, reason: &str) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(SessionError::BackendUnavailable(reason.to_owned())));
    }

    /// Let one held reply through.
    pub(crate) fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    pub(crate) fn requests(&self) -> Vec<BackendRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl BackendClient for ScriptedBackend {
    async fn send(&self, request: &BackendRequest) -> Result<BackendReply> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(gate) = &self.gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|e| SessionError::BackendUnavailable(e.to_string()))?;
            permit.forget();
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(BackendReply {
                    text: "ok".to_owned(),
                    session_id: None,
                })
            })
    }
}

// ---------------------------------------------------------------------------
// Speech
// ---------------------------------------------------------------------------

/// Local voice that "speaks" for a fixed time and records what it said.
pub(crate) struct RecordingVoice {
    duration: Duration,
    spoken: Mutex<Vec<LocalUtterance>>,
    stopped: AtomicUsize,
}

impl RecordingVoice {
    pub(crate) fn new(duration: Duration) -> Arc<Self> {
        Arc::new(Self {
            duration,
            spoken: Mutex::new(Vec::new()),
            stopped: AtomicUsize::new(0),
        })
    }

    pub(crate) fn texts(&self) -> Vec<String> {
        self.spoken
            .lock()
            .unwrap()
            .iter()
            .map(|u| u.text.clone())
            .collect()
    }

    pub(crate) fn utterances(&self) -> Vec<LocalUtterance> {
        self.spoken.lock().unwrap().clone()
    }

    pub(crate) fn stopped(&self) -> usize {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LocalSynthesizer for RecordingVoice {
    async fn speak(
        &self,
        utterance: &LocalUtterance,
        cancel: CancellationToken,
    ) -> Result<PlaybackOutcome> {
        self.spoken.lock().unwrap().push(utterance.clone());
        tokio::select! {
            () = tokio::time::sleep(self.duration) => Ok(PlaybackOutcome::Completed),
            () = cancel.cancelled() => {
                self.stopped.fetch_add(1, Ordering::SeqCst);
                Ok(PlaybackOutcome::Stopped)
            }
        }
    }

    fn name(&self) -> &str {
        "recording"
    }
}

// ---------------------------------------------------------------------------
// Camera
// ---------------------------------------------------------------------------

#[derive(Default)]
pub(crate) struct FakeCamera {
    fail: bool,
    held: AtomicBool,
    acquired: AtomicUsize,
    released: AtomicUsize,
}

impl FakeCamera {
    pub(crate) fn working() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn broken() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }

    pub(crate) fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }

    pub(crate) fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub(crate) fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CameraAccess for FakeCamera {
    async fn acquire(&self) -> Result<()> {
        if self.fail {
            return Err(SessionError::CaptureDevice("camera permission denied".into()));
        }
        self.acquired.fetch_add(1, Ordering::SeqCst);
        self.held.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn release(&self) {
        if self.held.swap(false, Ordering::SeqCst) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }
}

// ---------------------------------------------------------------------------
// Session wiring
// ---------------------------------------------------------------------------

/// A running controller plus the fakes behind it.
pub(crate) struct Harness {
    pub(crate) handle: SessionHandle,
    pub(crate) events: broadcast::Receiver<SessionEvent>,
    pub(crate) backend: Arc<ScriptedBackend>,
    pub(crate) voice: Arc<RecordingVoice>,
    pub(crate) camera: Arc<FakeCamera>,
    pub(crate) task: tokio::task::JoinHandle<()>,
}

pub(crate) struct HarnessBuilder {
    config: AssistantConfig,
    backend: Arc<ScriptedBackend>,
    voice: Arc<RecordingVoice>,
    recognizer: Arc<dyn SpeechRecognizer>,
    camera: Arc<FakeCamera>,
}

impl HarnessBuilder {
    pub(crate) fn new(kind: ProfileKind) -> Self {
        Self {
            config: AssistantConfig::for_profile(kind),
            backend: ScriptedBackend::new(),
            voice: RecordingVoice::new(Duration::from_millis(20)),
            recognizer: Arc::new(UnsupportedRecognizer),
            camera: FakeCamera::working(),
        }
    }

    pub(crate) fn backend(mut self, backend: Arc<ScriptedBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub(crate) fn voice(mut self, voice: Arc<RecordingVoice>) -> Self {
        self.voice = voice;
        self
    }

    pub(crate) fn recognizer(mut self, recognizer: Arc<dyn SpeechRecognizer>) -> Self {
        self.recognizer = recognizer;
        self
    }

    pub(crate) fn camera(mut self, camera: Arc<FakeCamera>) -> Self {
        self.camera = camera;
        self
    }

    pub(crate) fn config(mut self, edit: impl FnOnce(&mut AssistantConfig)) -> Self {
        edit(&mut self.config);
        self
    }

    pub(crate) fn spawn(self) -> Harness {
        let local: Arc<dyn LocalSynthesizer> = self.voice.clone();
        let parts = SessionParts {
            config: self.config,
            backend: self.backend.clone(),
            recognizer: self.recognizer,
            speech: SpeechBackends {
                cloud: None,
                player: None,
                local: Some(local),
            },
            camera: self.camera.clone(),
        };
        let (handle, task) = SessionController::spawn(parts);
        let events = handle.subscribe();
        Harness {
            handle,
            events,
            backend: self.backend,
            voice: self.voice,
            camera: self.camera,
            task,
        }
    }
}

impl Harness {
    /// Next event matching `pred`, skipping others.
    pub(crate) async fn expect(&mut self, pred: impl Fn(&SessionEvent) -> bool) -> SessionEvent {
        next_matching(&mut self.events, pred).await
    }

    pub(crate) async fn expect_state(&mut self, state: SessionState) {
        self.expect(|e| matches!(e, SessionEvent::StateChanged { state: s } if *s == state))
            .await;
    }

    /// Everything already published, without waiting.
    pub(crate) fn drain(&mut self) -> Vec<SessionEvent> {
        drain_events(&mut self.events)
    }

    pub(crate) async fn shutdown(self) {
        self.handle.shutdown().await.expect("shutdown");
        self.task.await.expect("controller task");
    }
}

pub(crate) async fn next_matching(
    rx: &mut broadcast::Receiver<SessionEvent>,
    pred: impl Fn(&SessionEvent) -> bool,
) -> SessionEvent {
    tokio::time::timeout(EVENT_TIMEOUT, async {
        loop {
            match rx.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for session event")
}

/// Drain all pending events from the broadcast receiver into a Vec.
pub(crate) fn drain_events(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(evt) = rx.try_recv() {
        events.push(evt);
    }
    events
}

/// Give background tasks a moment to (not) do something.
pub(crate) async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}
