use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::workflows::scholarship::intake::session::CancelFlag;

/// Visible countdown before the frame is taken.
pub const COUNTDOWN_SECS: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("camera unavailable: {0}")]
    CameraUnavailable(String),
    #[error("frame capture failed: {0}")]
    Frame(String),
    #[error("capture cancelled")]
    Cancelled,
}

#[async_trait]
pub trait Camera: Send + Sync {
    async fn start(&self) -> Result<(), CaptureError>;
    async fn capture_frame(&self) -> Result<Vec<u8>, CaptureError>;
    async fn stop(&self);
}

/// Start camera, count down, grab one frame, stop camera.
#[derive(Debug, Clone, Copy)]
pub struct CaptureProtocol {
    countdown_secs: u32,
    tick: Duration,
}

impl Default for CaptureProtocol {
    fn default() -> Self {
        Self {
            countdown_secs: COUNTDOWN_SECS,
            tick: Duration::from_secs(1),
        }
    }
}

impl CaptureProtocol {
    /// `on_tick` receives the seconds remaining, from the full countdown down to 1.
    pub async fn run(
        &self,
        camera: &dyn Camera,
        cancel: &CancelFlag,
        on_tick: &(dyn Fn(u32) + Send + Sync),
    ) -> Result<Vec<u8>, CaptureError> {
        camera.start().await?;
        let outcome = self.count_down_and_capture(camera, cancel, on_tick).await;
        camera.stop().await;

        if let Err(err) = &outcome {
            warn!(error = %err, "face capture did not produce a frame");
        }
        outcome
    }

    async fn count_down_and_capture(
        &self,
        camera: &dyn Camera,
        cancel: &CancelFlag,
        on_tick: &(dyn Fn(u32) + Send + Sync),
    ) -> Result<Vec<u8>, CaptureError> {
        for remaining in (1..=self.countdown_secs).rev() {
            on_tick(remaining);
            tokio::time::sleep(self.tick).await;
            if cancel.is_cancelled() {
                return Err(CaptureError::Cancelled);
            }
        }

        let frame = camera.capture_frame().await?;
        if cancel.is_cancelled() {
            return Err(CaptureError::Cancelled);
        }
        Ok(frame)
    }
}
