//! Audio output seam.

use super::asset::AudioAsset;
use crate::error::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// How a playback (or local utterance) ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// Played to the end.
    Completed,
    /// Cut short by a cancellation.
    Stopped,
}

/// Something that can play an encoded clip to the user.
///
/// `play` resolves when the clip finishes or, promptly, when `cancel` fires.
/// Implementations must release their output handle on both paths.
#[async_trait]
pub trait AudioPlayer: Send + Sync {
    async fn play(&self, asset: &AudioAsset, cancel: CancellationToken)
    -> Result<PlaybackOutcome>;

    /// Short name for logs.
    fn name(&self) -> &str;
}
