//! Synthesized audio: encoded assets and the players that voice them.

pub mod asset;
pub mod playback;
pub mod player;

pub use asset::{AudioAsset, AudioFormat, DecodedAudio};
#[cfg(feature = "device-audio")]
pub use playback::CpalPlayer;
pub use playback::{SystemPlayer, build_player};
pub use player::{AudioPlayer, PlaybackOutcome};
