//! Cloneable front door to a running session controller.

use super::controller::Command;
use super::events::{SessionEvent, SessionSnapshot, VoiceStart};
use crate::conversation::SessionId;
use crate::error::{Result, SessionError};
use crate::language::LanguageCode;
use tokio::sync::{broadcast, mpsc, oneshot};

/// Sends commands to the controller task and subscribes to its events.
///
/// The controller tears down (stops capture and speech, releases the
/// camera) when [`shutdown`](Self::shutdown) is called or when the last
/// handle is dropped.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    pub(crate) fn new(
        commands: mpsc::Sender<Command>,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self { commands, events }
    }

    /// Receive every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Submit typed text as the user's next turn. Stops any capture or
    /// speech first.
    ///
    /// # Errors
    ///
    /// [`SessionError::EmptyMessage`] for blank text,
    /// [`SessionError::RequestInFlight`] while a reply is pending.
    pub async fn send_text(&self, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        self.request(|reply| Command::SendText { text, reply })
            .await?
    }

    /// Begin voice input. An unavailable microphone or recognizer is not an
    /// error: a notice is published and [`VoiceStart::Unavailable`] returned.
    ///
    /// # Errors
    ///
    /// [`SessionError::CaptureBusy`] while already listening,
    /// [`SessionError::RequestInFlight`] while a reply is pending.
    pub async fn start_voice(&self) -> Result<VoiceStart> {
        self.request(|reply| Command::StartVoice { reply }).await?
    }

    /// Stop listening. What was heard is submitted (or offered as a draft).
    pub async fn stop_voice(&self) -> Result<()> {
        self.request(|reply| Command::StopVoice { reply }).await?
    }

    /// Muting silences current speech at once and keeps replies silent.
    pub async fn set_muted(&self, muted: bool) -> Result<()> {
        self.request(|reply| Command::SetMuted { muted, reply })
            .await?
    }

    /// # Errors
    ///
    /// [`SessionError::LanguageLocked`] while listening or speaking.
    pub async fn set_language(&self, language: LanguageCode) -> Result<()> {
        self.request(|reply| Command::SetLanguage { language, reply })
            .await?
    }

    /// Cancel everything, clear the log and start under a fresh session id.
    pub async fn new_conversation(&self) -> Result<SessionId> {
        self.request(|reply| Command::NewConversation { reply })
            .await?
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Tear the controller down and wait until it has released everything.
    pub async fn shutdown(&self) -> Result<()> {
        self.request(|reply| Command::Shutdown { reply }).await
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| SessionError::Channel("session controller stopped".into()))?;
        rx.await
            .map_err(|_| SessionError::Channel("session controller dropped the request".into()))
    }
}
