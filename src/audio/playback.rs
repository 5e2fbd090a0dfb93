//! Audio players.
//!
//! [`SystemPlayer`] hands the encoded clip to a platform player command via a
//! scratch file. `CpalPlayer` (feature `device-audio`) decodes the clip and
//! writes samples to the output device directly.

use super::asset::AudioAsset;
use super::player::{AudioPlayer, PlaybackOutcome};
use crate::config::{PlayerBackend, TtsConfig};
use crate::error::{Result, SessionError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Child;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Player commands in preference order, with the arguments each needs to
/// play a file and exit.
const PLAYER_CANDIDATES: &[(&str, &[&str])] = &[
    ("afplay", &[]),
    ("ffplay", &["-nodisp", "-autoexit", "-loglevel", "quiet"]),
    ("paplay", &[]),
    ("aplay", &["-q"]),
];

/// Build the player selected by `config.player`.
///
/// # Errors
///
/// Returns an error if no usable player exists on this machine.
pub fn build_player(config: &TtsConfig) -> Result<Arc<dyn AudioPlayer>> {
    match config.player {
        PlayerBackend::System => Ok(Arc::new(SystemPlayer::discover(
            config.player_command.as_deref(),
        )?)),
        #[cfg(feature = "device-audio")]
        PlayerBackend::Device => Ok(Arc::new(CpalPlayer::new(None))),
        #[cfg(not(feature = "device-audio"))]
        PlayerBackend::Device => Err(SessionError::Config(
            "tts.player = \"device\" requires the device-audio feature".into(),
        )),
    }
}

/// Plays clips through an external player process.
#[derive(Debug, Clone)]
pub struct SystemPlayer {
    program: PathBuf,
    args: Vec<String>,
    scratch_dir: PathBuf,
}

impl SystemPlayer {
    /// Locate a player on `PATH`, or resolve the explicit `command`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Playback`] if nothing suitable is installed.
    pub fn discover(command: Option<&Path>) -> Result<Self> {
        if let Some(command) = command {
            let program = which::which(command).map_err(|e| {
                SessionError::Playback(format!("player {} not found: {e}", command.display()))
            })?;
            let args = known_args(&program);
            return Ok(Self::with_command(program, args));
        }

        for (name, args) in PLAYER_CANDIDATES {
            if let Ok(program) = which::which(name) {
                info!(player = %program.display(), "using system audio player");
                let args = args.iter().map(|a| (*a).to_owned()).collect();
                return Ok(Self::with_command(program, args));
            }
        }
        Err(SessionError::Playback(
            "no audio player found (tried afplay, ffplay, paplay, aplay)".into(),
        ))
    }

    /// Use `program` with `args`; the clip path is appended last.
    pub fn with_command(program: PathBuf, args: Vec<String>) -> Self {
        Self {
            program,
            args,
            scratch_dir: crate::guide_dirs::audio_scratch_dir(),
        }
    }

    /// Write scratch clips somewhere other than the cache directory.
    pub fn with_scratch_dir(mut self, dir: PathBuf) -> Self {
        self.scratch_dir = dir;
        self
    }

    async fn run(&self, clip: &Path, cancel: &CancellationToken) -> Result<PlaybackOutcome> {
        let child = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .arg(clip)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                SessionError::Playback(format!("failed to start {}: {e}", self.program.display()))
            })?;
        wait_or_kill(child, cancel, "audio player").await
    }
}

#[async_trait]
impl AudioPlayer for SystemPlayer {
    async fn play(
        &self,
        asset: &AudioAsset,
        cancel: CancellationToken,
    ) -> Result<PlaybackOutcome> {
        tokio::fs::create_dir_all(&self.scratch_dir).await?;
        let clip = self.scratch_dir.join(format!(
            "{}.{}",
            uuid::Uuid::new_v4(),
            asset.format().extension()
        ));
        tokio::fs::write(&clip, asset.bytes()).await?;

        let outcome = self.run(&clip, &cancel).await;

        if let Err(e) = tokio::fs::remove_file(&clip).await {
            debug!(clip = %clip.display(), "scratch clip not removed: {e}");
        }
        outcome
    }

    fn name(&self) -> &str {
        "system"
    }
}

fn known_args(program: &Path) -> Vec<String> {
    let stem = program
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    PLAYER_CANDIDATES
        .iter()
        .find(|(name, _)| *name == stem)
        .map(|(_, args)| args.iter().map(|a| (*a).to_owned()).collect())
        .unwrap_or_default()
}

/// Wait for `child` to exit, killing it if `cancel` fires first.
pub(crate) async fn wait_or_kill(
    mut child: Child,
    cancel: &CancellationToken,
    what: &str,
) -> Result<PlaybackOutcome> {
    tokio::select! {
        status = child.wait() => {
            let status = status?;
            if status.success() {
                Ok(PlaybackOutcome::Completed)
            } else {
                Err(SessionError::Playback(format!("{what} exited with {status}")))
            }
        }
        _ = cancel.cancelled() => {
            if let Err(e) = child.kill().await {
                debug!("{what} already gone: {e}");
            }
            Ok(PlaybackOutcome::Stopped)
        }
    }
}

#[cfg(feature = "device-audio")]
pub use device::CpalPlayer;

#[cfg(feature = "device-audio")]
mod device {
    use super::{AudioAsset, AudioPlayer, PlaybackOutcome};
    use crate::audio::asset::DecodedAudio;
    use crate::error::{Result, SessionError};
    use async_trait::async_trait;
    use cpal::StreamConfig;
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio_util::sync::CancellationToken;
    use tracing::{error, info};

    /// Audio playback to system speakers via cpal.
    #[derive(Debug, Clone, Default)]
    pub struct CpalPlayer {
        output_device: Option<String>,
    }

    impl CpalPlayer {
        /// `output_device` selects a device by name; `None` uses the default.
        pub fn new(output_device: Option<String>) -> Self {
            Self { output_device }
        }
    }

    #[async_trait]
    impl AudioPlayer for CpalPlayer {
        async fn play(
            &self,
            asset: &AudioAsset,
            cancel: CancellationToken,
        ) -> Result<PlaybackOutcome> {
            let asset = asset.clone();
            let device_name = self.output_device.clone();
            let stop = Arc::new(AtomicBool::new(false));
            let stop_flag = Arc::clone(&stop);

            let mut task = tokio::task::spawn_blocking(move || {
                let audio = asset.decode()?;
                play_blocking(device_name.as_deref(), &audio, &stop_flag)
            });

            tokio::select! {
                res = &mut task => {
                    res.map_err(|e| SessionError::Playback(format!("playback task failed: {e}")))?
                }
                _ = cancel.cancelled() => {
                    stop.store(true, Ordering::SeqCst);
                    // The stream is dropped on the blocking thread.
                    let _ = task.await;
                    Ok(PlaybackOutcome::Stopped)
                }
            }
        }

        fn name(&self) -> &str {
            "device"
        }
    }

    fn open_device(name: Option<&str>) -> Result<cpal::Device> {
        let host = cpal::default_host();
        let device = if let Some(name) = name {
            host.output_devices()
                .map_err(|e| SessionError::Playback(format!("cannot enumerate devices: {e}")))?
                .find(|d| {
                    d.description()
                        .ok()
                        .map(|desc| desc.name() == name)
                        .unwrap_or(false)
                })
                .ok_or_else(|| {
                    SessionError::Playback(format!("output device '{name}' not found"))
                })?
        } else {
            host.default_output_device()
                .ok_or_else(|| SessionError::Playback("no default output device".into()))?
        };

        let device_name = device
            .description()
            .map(|d| d.name().to_owned())
            .unwrap_or_else(|_| "<unknown>".into());
        info!("using output device: {device_name}");
        Ok(device)
    }

    /// Blocks until every sample has been written or `stop` is raised.
    fn play_blocking(
        device_name: Option<&str>,
        audio: &DecodedAudio,
        stop: &AtomicBool,
    ) -> Result<PlaybackOutcome> {
        let device = open_device(device_name)?;
        let stream_config = StreamConfig {
            channels: 1,
            sample_rate: audio.sample_rate,
            buffer_size: cpal::BufferSize::Default,
        };

        let buffer = Arc::new(Mutex::new(PlaybackBuffer {
            samples: audio.samples.clone(),
            position: 0,
            finished: false,
        }));
        let buffer_clone = Arc::clone(&buffer);

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                    let mut buf = match buffer_clone.lock() {
                        Ok(b) => b,
                        Err(_) => return,
                    };
                    for sample in data.iter_mut() {
                        if buf.position < buf.samples.len() {
                            *sample = buf.samples[buf.position];
                            buf.position += 1;
                        } else {
                            *sample = 0.0;
                            buf.finished = true;
                        }
                    }
                },
                move |err| {
                    error!("audio output stream error: {err}");
                },
                None,
            )
            .map_err(|e| SessionError::Playback(format!("failed to build output stream: {e}")))?;

        stream
            .play()
            .map_err(|e| SessionError::Playback(format!("failed to start output stream: {e}")))?;

        let outcome = loop {
            std::thread::sleep(std::time::Duration::from_millis(10));
            if stop.load(Ordering::SeqCst) {
                break PlaybackOutcome::Stopped;
            }
            let buf = buffer.lock().map_err(|e| {
                SessionError::Playback(format!("playback buffer lock poisoned: {e}"))
            })?;
            if buf.finished {
                break PlaybackOutcome::Completed;
            }
        };

        drop(stream);
        Ok(outcome)
    }

    struct PlaybackBuffer {
        samples: Vec<f32>,
        position: usize,
        finished: bool,
    }
}
