//! Capture device API: constraints, live streams and the owning handle.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use crate::frame::Frame;

/// Fixed user-facing message for any camera acquisition failure.
pub const CAPTURE_FAILED_MESSAGE: &str =
    "Failed to access camera. Please ensure camera permissions are granted.";

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("device busy")]
    DeviceBusy,
    #[error("format negotiation failed: {0}")]
    FormatNegotiationFailed(String),
    #[error("streaming not supported")]
    StreamingNotSupported,
}

/// Which way the requested camera should face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Front-facing, towards the user.
    User,
    Environment,
}

/// What the session asks the capture device for.
///
/// Width and height are preferences; the device may negotiate something
/// else and the session accepts whatever it gets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptureConstraints {
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub facing: FacingMode,
    pub audio: bool,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            ideal_width: 1280,
            ideal_height: 720,
            facing: FacingMode::User,
            audio: true,
        }
    }
}

/// Parameters the device actually settled on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamSettings {
    pub width: u32,
    pub height: u32,
    pub has_audio: bool,
}

impl StreamSettings {
    pub fn matches(&self, constraints: &CaptureConstraints) -> bool {
        self.width == constraints.ideal_width && self.height == constraints.ideal_height
    }
}

/// A live audio/video stream.
///
/// Readers (preview, detection, recording) share it through `Arc`; only the
/// [`CaptureHandle`] stops it.
pub trait MediaStream: Send + Sync {
    /// Stable identifier, used in logs.
    fn id(&self) -> &str;

    fn settings(&self) -> StreamSettings;

    /// Most recent video frame, if one has arrived yet.
    fn latest_frame(&self) -> Option<Frame>;

    /// False once the tracks have been stopped or the device went away.
    fn is_live(&self) -> bool;

    /// Stop every track. Idempotent.
    fn stop_tracks(&self);
}

#[async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Request combined audio+video access with the given constraints.
    async fn open(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Arc<dyn MediaStream>, CaptureError>;
}

/// Exclusive owner of an acquired stream.
///
/// Dropping the handle stops all tracks, so every exit path releases the
/// camera and microphone.
pub struct CaptureHandle {
    stream: Arc<dyn MediaStream>,
}

impl CaptureHandle {
    pub async fn acquire(
        device: &dyn CaptureDevice,
        constraints: &CaptureConstraints,
    ) -> Result<Self, CaptureError> {
        let stream = device.open(constraints).await?;
        let settings = stream.settings();
        if !settings.matches(constraints) {
            tracing::info!(
                requested_width = constraints.ideal_width,
                requested_height = constraints.ideal_height,
                width = settings.width,
                height = settings.height,
                "device negotiated fallback resolution"
            );
        }
        if constraints.audio && !settings.has_audio {
            tracing::warn!(stream = stream.id(), "audio requested but stream is video-only");
        }
        tracing::info!(
            stream = stream.id(),
            width = settings.width,
            height = settings.height,
            audio = settings.has_audio,
            "capture acquired"
        );
        Ok(Self { stream })
    }

    pub fn stream(&self) -> &Arc<dyn MediaStream> {
        &self.stream
    }

    pub fn is_live(&self) -> bool {
        self.stream.is_live()
    }

    /// Stop all tracks and give up ownership.
    pub fn release(self) {
        // Drop does the work.
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.stream.stop_tracks();
        tracing::info!(stream = self.stream.id(), "capture released");
    }
}
