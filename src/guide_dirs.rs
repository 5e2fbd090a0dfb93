//! Application directory paths.
//!
//! Uses the [`dirs`] crate for platform-appropriate resolution.
//!
//! # Environment Overrides
//!
//! - `GUIDEVOICE_CONFIG_DIR` overrides [`config_dir`]
//! - `GUIDEVOICE_CACHE_DIR` overrides [`cache_dir`]

use std::path::PathBuf;

const APP_DIR: &str = "guidevoice";

/// Application config directory (holds `config.toml`).
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("GUIDEVOICE_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| std::env::temp_dir().join("guidevoice-config"))
}

/// Cache directory for expendable data such as synthesized audio clips
/// awaiting playback.
#[must_use]
pub fn cache_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("GUIDEVOICE_CACHE_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::cache_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| std::env::temp_dir().join("guidevoice-cache"))
}

/// Scratch directory for audio clips handed to a system player.
#[must_use]
pub fn audio_scratch_dir() -> PathBuf {
    cache_dir().join("audio")
}

/// Default config file path.
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}
