//! Camera access for surfaces that show the user's video (interviewer).
//!
//! The engine never processes frames; it only holds the device for as long
//! as the controller runs so the host can show a self-view.

use crate::error::Result;
use async_trait::async_trait;

/// Acquire/release seam for the camera.
#[async_trait]
pub trait CameraAccess: Send + Sync {
    /// # Errors
    ///
    /// Returns [`crate::error::SessionError::CaptureDevice`] when the camera
    /// is missing or permission is denied.
    async fn acquire(&self) -> Result<()>;

    /// Release the camera. Idempotent.
    async fn release(&self);
}

/// Camera stand-in for hosts without video; acquiring always succeeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCamera;

#[async_trait]
impl CameraAccess for NoCamera {
    async fn acquire(&self) -> Result<()> {
        Ok(())
    }

    async fn release(&self) {}
}
