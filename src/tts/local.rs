//! Local fallback speech via the platform synthesizer command.

use crate::audio::PlaybackOutcome;
use crate::audio::playback::wait_or_kill;
use crate::error::{Result, SessionError};
use crate::language::LanguageCode;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// espeak's default speaking rate in words per minute; `say` uses the same.
const BASE_WPM: f32 = 175.0;

/// Text and voice parameters for one local utterance.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalUtterance {
    pub text: String,
    pub language: LanguageCode,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

/// Fallback speech path. Speaks directly; there is no asset to play.
#[async_trait]
pub trait LocalSynthesizer: Send + Sync {
    async fn speak(
        &self,
        utterance: &LocalUtterance,
        cancel: CancellationToken,
    ) -> Result<PlaybackOutcome>;

    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flavor {
    /// macOS `say`.
    Say,
    /// `espeak-ng` / `espeak`.
    Espeak,
}

const CANDIDATES: &[(&str, Flavor)] = &[
    ("say", Flavor::Say),
    ("espeak-ng", Flavor::Espeak),
    ("espeak", Flavor::Espeak),
];

/// [`LocalSynthesizer`] that runs the system speech command. The process is
/// killed when the utterance is stopped.
#[derive(Debug, Clone)]
pub struct SystemSpeech {
    program: PathBuf,
    flavor: Flavor,
}

impl SystemSpeech {
    /// Locate `say`, `espeak-ng` or `espeak`, or resolve `command`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::SynthesisFailed`] when no synthesizer exists.
    pub fn discover(command: Option<&Path>) -> Result<Self> {
        if let Some(command) = command {
            let program = which::which(command).map_err(|e| {
                SessionError::SynthesisFailed(format!(
                    "speech command {} not found: {e}",
                    command.display()
                ))
            })?;
            let flavor = flavor_of(&program);
            return Ok(Self { program, flavor });
        }

        for (name, flavor) in CANDIDATES {
            if let Ok(program) = which::which(name) {
                info!(synthesizer = %program.display(), "using local speech synthesizer");
                return Ok(Self {
                    program,
                    flavor: *flavor,
                });
            }
        }
        Err(SessionError::SynthesisFailed(
            "no local speech synthesizer found (tried say, espeak-ng, espeak)".into(),
        ))
    }

    fn args(&self, u: &LocalUtterance) -> Vec<String> {
        let wpm = (BASE_WPM * u.rate).round().max(1.0) as u32;
        match self.flavor {
            Flavor::Say => {
                let mut args = Vec::new();
                if let Some(voice) = say_voice(u.language) {
                    args.extend(["-v".to_owned(), voice.to_owned()]);
                }
                args.extend(["-r".to_owned(), wpm.to_string(), "--".to_owned()]);
                args.push(u.text.clone());
                args
            }
            Flavor::Espeak => {
                let pitch = (50.0 * u.pitch).round().clamp(0.0, 99.0) as u32;
                let amplitude = (100.0 * u.volume).round().clamp(0.0, 200.0) as u32;
                vec![
                    "-v".to_owned(),
                    espeak_voice(u.language).to_owned(),
                    "-s".to_owned(),
                    wpm.to_string(),
                    "-p".to_owned(),
                    pitch.to_string(),
                    "-a".to_owned(),
                    amplitude.to_string(),
                    "--".to_owned(),
                    u.text.clone(),
                ]
            }
        }
    }
}

#[async_trait]
impl LocalSynthesizer for SystemSpeech {
    async fn speak(
        &self,
        utterance: &LocalUtterance,
        cancel: CancellationToken,
    ) -> Result<PlaybackOutcome> {
        let child = tokio::process::Command::new(&self.program)
            .args(self.args(utterance))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                SessionError::SynthesisFailed(format!(
                    "failed to start {}: {e}",
                    self.program.display()
                ))
            })?;
        wait_or_kill(child, &cancel, "local synthesizer")
            .await
            .map_err(|e| SessionError::SynthesisFailed(e.to_string()))
    }

    fn name(&self) -> &str {
        match self.flavor {
            Flavor::Say => "say",
            Flavor::Espeak => "espeak",
        }
    }
}

fn flavor_of(program: &Path) -> Flavor {
    match program.file_stem().and_then(|s| s.to_str()) {
        Some("say") => Flavor::Say,
        _ => Flavor::Espeak,
    }
}

fn espeak_voice(language: LanguageCode) -> &'static str {
    match language {
        LanguageCode::EnUs => "en-us",
        LanguageCode::HiIn => "hi",
        LanguageCode::TeIn => "te",
        LanguageCode::KnIn => "kn",
    }
}

/// `say` selects language through the voice name.
fn say_voice(language: LanguageCode) -> Option<&'static str> {
    match language {
        LanguageCode::EnUs => Some("Samantha"),
        LanguageCode::HiIn => Some("Lekha"),
        LanguageCode::TeIn | LanguageCode::KnIn => None,
    }
}
