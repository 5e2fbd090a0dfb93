//! Speech Output Engine.
//!
//! Owns the handle of the utterance currently being voiced. At most one
//! utterance is active: [`SpeechOutput::speak`] stops (and waits for) the
//! previous one before starting. Every utterance reports exactly one
//! [`SpeechFinished`] on the events channel.

use crate::audio::{AudioPlayer, PlaybackOutcome, build_player};
use crate::config::TtsConfig;
use crate::format::speakable_text;
use crate::language::LanguageCode;
use crate::tts::cloud::{CloudSynthesizer, HttpSynthesizer, SynthesisRequest};
use crate::tts::local::{LocalSynthesizer, LocalUtterance, SystemSpeech};
use crate::tts::voices::{VoiceSelection, resolve_voice};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Identifies one `speak` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct UtteranceId(u64);

impl fmt::Display for UtteranceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "utt-{}", self.0)
    }
}

/// Which synthesizer voiced an utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechPath {
    Cloud,
    Local,
}

/// How an utterance ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechOutcome {
    /// Played to the end.
    Spoken(SpeechPath),
    /// Cut short by `stop` or by a newer utterance.
    Stopped,
    /// Nothing speakable remained after removing markup.
    Skipped,
    /// Both synthesis paths failed; the text stays visible only.
    Failed(String),
}

/// Completion report for one utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechFinished {
    pub utterance: UtteranceId,
    pub outcome: SpeechOutcome,
}

/// The synthesizers and player available to the engine. Any of them may be
/// missing; the engine degrades down the fallback chain.
#[derive(Clone, Default)]
pub struct SpeechBackends {
    pub cloud: Option<Arc<dyn CloudSynthesizer>>,
    pub player: Option<Arc<dyn AudioPlayer>>,
    pub local: Option<Arc<dyn LocalSynthesizer>>,
}

impl SpeechBackends {
    /// Build from configuration, logging and skipping whatever is not
    /// available on this machine.
    pub fn from_config(config: &TtsConfig) -> Self {
        let cloud = config.cloud_endpoint.as_ref().and_then(|endpoint| {
            match HttpSynthesizer::new(endpoint.clone(), None) {
                Ok(s) => Some(Arc::new(s) as Arc<dyn CloudSynthesizer>),
                Err(e) => {
                    warn!("cloud synthesis disabled: {e}");
                    None
                }
            }
        });

        let player = if cloud.is_some() {
            match build_player(config) {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!("cloud audio playback disabled: {e}");
                    None
                }
            }
        } else {
            None
        };

        let local = match SystemSpeech::discover(config.local_command.as_deref()) {
            Ok(s) => Some(Arc::new(s) as Arc<dyn LocalSynthesizer>),
            Err(e) => {
                warn!("local speech fallback disabled: {e}");
                None
            }
        };

        Self {
            cloud,
            player,
            local,
        }
    }
}

/// Voice and prosody settings applied to every utterance.
#[derive(Debug, Clone)]
pub struct OutputSettings {
    pub output_format: String,
    pub local_rate: f32,
    pub local_pitch: f32,
    pub local_volume: f32,
    pub voices: BTreeMap<String, VoiceSelection>,
}

impl From<&TtsConfig> for OutputSettings {
    fn from(config: &TtsConfig) -> Self {
        Self {
            output_format: config.output_format.clone(),
            local_rate: config.local_rate,
            local_pitch: config.local_pitch,
            local_volume: config.local_volume,
            voices: config.voices.clone(),
        }
    }
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self::from(&TtsConfig::default())
    }
}

struct ActiveUtterance {
    id: UtteranceId,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// The Speech Output Engine.
pub struct SpeechOutput {
    backends: SpeechBackends,
    settings: Arc<OutputSettings>,
    events: mpsc::UnboundedSender<SpeechFinished>,
    current: Option<ActiveUtterance>,
    next_id: u64,
}

impl SpeechOutput {
    pub fn new(
        backends: SpeechBackends,
        settings: OutputSettings,
        events: mpsc::UnboundedSender<SpeechFinished>,
    ) -> Self {
        Self {
            backends,
            settings: Arc::new(settings),
            events,
            current: None,
            next_id: 0,
        }
    }

    /// Start voicing `text`. Markup is stripped first. Any utterance
    /// already playing is stopped and awaited before this one starts.
    pub async fn speak(&mut self, text: &str, language: LanguageCode) -> UtteranceId {
        self.stop().await;

        self.next_id += 1;
        let id = UtteranceId(self.next_id);
        let cancel = CancellationToken::new();
        let job = Utterance {
            id,
            text: speakable_text(text),
            language,
            backends: self.backends.clone(),
            settings: Arc::clone(&self.settings),
            cancel: cancel.clone(),
        };
        let events = self.events.clone();

        let task = tokio::spawn(async move {
            let outcome = job.run().await;
            debug!(utterance = %id, ?outcome, "utterance finished");
            let _ = events.send(SpeechFinished {
                utterance: id,
                outcome,
            });
        });

        self.current = Some(ActiveUtterance { id, cancel, task });
        id
    }

    /// Halt whatever is playing on either path and wait for its output
    /// handle to be released. Safe to call when idle.
    pub async fn stop(&mut self) {
        if let Some(active) = self.current.take() {
            if !active.task.is_finished() {
                info!(utterance = %active.id, "stopping speech");
            }
            active.cancel.cancel();
            if let Err(e) = active.task.await {
                warn!(utterance = %active.id, "utterance task failed: {e}");
            }
        }
    }

    /// The utterance started most recently, if it is still running.
    pub fn current(&self) -> Option<UtteranceId> {
        self.current
            .as_ref()
            .filter(|a| !a.task.is_finished())
            .map(|a| a.id)
    }

    pub fn is_speaking(&self) -> bool {
        self.current().is_some()
    }
}

impl Drop for SpeechOutput {
    fn drop(&mut self) {
        if let Some(active) = self.current.take() {
            active.cancel.cancel();
        }
    }
}

struct Utterance {
    id: UtteranceId,
    text: String,
    language: LanguageCode,
    backends: SpeechBackends,
    settings: Arc<OutputSettings>,
    cancel: CancellationToken,
}

impl Utterance {
    async fn run(self) -> SpeechOutcome {
        if self.text.is_empty() {
            return SpeechOutcome::Skipped;
        }

        if let (Some(cloud), Some(player)) = (&self.backends.cloud, &self.backends.player) {
            match self.try_cloud(cloud.as_ref(), player.as_ref()).await {
                Some(outcome) => return outcome,
                None => debug!(utterance = %self.id, "falling back to local synthesis"),
            }
        }

        if self.cancel.is_cancelled() {
            return SpeechOutcome::Stopped;
        }

        let Some(local) = &self.backends.local else {
            warn!(utterance = %self.id, "no speech synthesizer available, skipping");
            return SpeechOutcome::Failed("no speech synthesizer available".into());
        };

        let utterance = LocalUtterance {
            text: self.text.clone(),
            language: self.language,
            rate: self.settings.local_rate,
            pitch: self.settings.local_pitch,
            volume: self.settings.local_volume,
        };
        match local.speak(&utterance, self.cancel.clone()).await {
            Ok(PlaybackOutcome::Completed) => SpeechOutcome::Spoken(SpeechPath::Local),
            Ok(PlaybackOutcome::Stopped) => SpeechOutcome::Stopped,
            Err(e) => {
                warn!(utterance = %self.id, synthesizer = local.name(), "local speech failed: {e}");
                SpeechOutcome::Failed(e.to_string())
            }
        }
    }

    /// `None` means the cloud path failed and the local path should run.
    async fn try_cloud(
        &self,
        cloud: &dyn CloudSynthesizer,
        player: &dyn AudioPlayer,
    ) -> Option<SpeechOutcome> {
        let request = SynthesisRequest {
            text: self.text.clone(),
            language: self.language,
            voice: resolve_voice(&self.settings.voices, self.language),
            output_format: self.settings.output_format.clone(),
        };

        let asset = tokio::select! {
            res = cloud.synthesize(&request) => res,
            _ = self.cancel.cancelled() => return Some(SpeechOutcome::Stopped),
        };
        let asset = match asset {
            Ok(asset) => asset,
            Err(e) => {
                info!(utterance = %self.id, "cloud synthesis failed: {e}");
                return None;
            }
        };

        match player.play(&asset, self.cancel.clone()).await {
            Ok(PlaybackOutcome::Completed) => Some(SpeechOutcome::Spoken(SpeechPath::Cloud)),
            Ok(PlaybackOutcome::Stopped) => Some(SpeechOutcome::Stopped),
            Err(e) => {
                info!(utterance = %self.id, player = player.name(), "cloud clip playback failed: {e}");
                None
            }
        }
    }
}
