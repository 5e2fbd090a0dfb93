//! Configuration types for the assistant session engine.

use crate::error::{Result, SessionError};
use crate::session::profile::{AssistantProfile, ProfileKind};
use crate::tts::voices::VoiceSelection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Apology shown in place of a reply when the backend cannot be reached.
pub const DEFAULT_APOLOGY: &str =
    "I apologize, but I'm having trouble connecting right now. Please try again in a moment.";

/// Top-level configuration for one assistant surface.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Which assistant this is and how it presents itself.
    pub profile: AssistantProfile,
    /// Remote AI endpoint settings.
    pub backend: BackendConfig,
    /// Speech capture behaviour.
    pub capture: CaptureConfig,
    /// Speech output settings.
    pub tts: TtsConfig,
    /// User identity attached to outbound messages.
    pub identity: IdentityConfig,
}

/// AI backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Chat endpoint URL (HTTP POST).
    pub endpoint: String,
    /// Request timeout. `None` leaves it to the transport default.
    pub request_timeout_secs: Option<u64>,
    /// Assistant text appended when a turn fails.
    pub apology_text: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:3000/chat".to_owned(),
            request_timeout_secs: None,
            apology_text: DEFAULT_APOLOGY.to_owned(),
        }
    }
}

/// Speech capture settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Submit the final transcript as soon as capture ends.
    ///
    /// When false the transcript is offered to the host as a draft.
    pub auto_submit: bool,
    /// Keep listening across recogniser segment boundaries until stopped.
    pub continuous: bool,
    /// Forward interim transcripts for live display.
    pub interim_results: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            auto_submit: true,
            continuous: false,
            interim_results: true,
        }
    }
}

/// Where synthesized cloud audio is played.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerBackend {
    /// External player command (`afplay`, `paplay`, `aplay`, `ffplay`).
    #[default]
    System,
    /// Output device via cpal (requires the `device-audio` feature).
    Device,
}

/// Speech output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    /// Cloud synthesis endpoint. Without one every utterance goes straight
    /// to the local synthesizer.
    pub cloud_endpoint: Option<String>,
    /// Audio format requested from the cloud provider.
    pub output_format: String,
    /// Local synthesizer speaking rate (1.0 = normal).
    pub local_rate: f32,
    /// Local synthesizer pitch (1.0 = normal).
    pub local_pitch: f32,
    /// Local synthesizer volume in \[0, 1\].
    pub local_volume: f32,
    /// Explicit local synthesizer binary (None = discover on PATH).
    pub local_command: Option<PathBuf>,
    /// How cloud audio is played.
    pub player: PlayerBackend,
    /// Explicit player binary for [`PlayerBackend::System`].
    pub player_command: Option<PathBuf>,
    /// Per-language voice overrides keyed by language tag.
    pub voices: BTreeMap<String, VoiceSelection>,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            cloud_endpoint: None,
            output_format: "mp3".to_owned(),
            local_rate: 0.9,
            local_pitch: 1.0,
            local_volume: 1.0,
            local_command: None,
            player: PlayerBackend::default(),
            player_command: None,
            voices: BTreeMap::new(),
        }
    }
}

/// Host-supplied user identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Opaque identity (usually an email address). Empty when unknown.
    pub email: String,
}

impl AssistantConfig {
    /// Preset configuration for one of the built-in assistant surfaces.
    pub fn for_profile(kind: ProfileKind) -> Self {
        let capture = match kind {
            ProfileKind::CareerGuide => CaptureConfig::default(),
            ProfileKind::QueryHandler | ProfileKind::RoleBasedInterviewer => CaptureConfig {
                auto_submit: false,
                continuous: true,
                interim_results: true,
            },
        };
        Self {
            profile: AssistantProfile::preset(kind),
            capture,
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&content).map_err(|e| SessionError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| SessionError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> PathBuf {
        crate::guide_dirs::config_file()
    }

    /// Reject values the engine cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.backend.endpoint.trim().is_empty() {
            return Err(SessionError::Config("backend.endpoint is empty".into()));
        }
        if self.backend.apology_text.trim().is_empty() {
            return Err(SessionError::Config("backend.apology_text is empty".into()));
        }
        if self.backend.request_timeout_secs == Some(0) {
            return Err(SessionError::Config(
                "backend.request_timeout_secs must be positive".into(),
            ));
        }
        if !(self.tts.local_rate > 0.0 && self.tts.local_rate <= 10.0) {
            return Err(SessionError::Config(format!(
                "tts.local_rate out of range: {}",
                self.tts.local_rate
            )));
        }
        if !(self.tts.local_pitch > 0.0 && self.tts.local_pitch <= 2.0) {
            return Err(SessionError::Config(format!(
                "tts.local_pitch out of range: {}",
                self.tts.local_pitch
            )));
        }
        if !(0.0..=1.0).contains(&self.tts.local_volume) {
            return Err(SessionError::Config(format!(
                "tts.local_volume out of range: {}",
                self.tts.local_volume
            )));
        }
        for tag in self.tts.voices.keys() {
            if crate::language::LanguageCode::parse(tag).is_none() {
                return Err(SessionError::Config(format!(
                    "tts.voices has unsupported language: {tag}"
                )));
            }
        }
        Ok(())
    }
}
