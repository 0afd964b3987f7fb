use facetrack_core::MODEL_LOAD_FAILED_MESSAGE;
use facetrack_hw::{CaptureError, CAPTURE_FAILED_MESSAGE};
use thiserror::Error;

use crate::recording::{DownloadError, RecordingError, RECORDING_FAILED_MESSAGE};
use crate::state::UserError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("face analysis models unavailable: {0}")]
    ModelsUnavailable(String),
    #[error("models not ready")]
    NotReady,
    #[error("camera error: {0}")]
    Capture(#[from] CaptureError),
    #[error("recording error: {0}")]
    Recording(#[from] RecordingError),
    #[error("download error: {0}")]
    Download(#[from] DownloadError),
    #[error("gallery storage error: {0}")]
    Store(#[from] StoreError),
    #[error("session task exited")]
    ChannelClosed,
}

impl SessionError {
    /// Fatal errors disable the session until a full reload.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SessionError::ModelsUnavailable(_) | SessionError::Capture(_)
        )
    }

    /// Text shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            SessionError::ModelsUnavailable(_) | SessionError::NotReady => {
                MODEL_LOAD_FAILED_MESSAGE.to_string()
            }
            SessionError::Capture(_) => CAPTURE_FAILED_MESSAGE.to_string(),
            SessionError::Recording(RecordingError::Setup(_)) => {
                RECORDING_FAILED_MESSAGE.to_string()
            }
            other => other.to_string(),
        }
    }

    pub fn to_user_error(&self) -> UserError {
        UserError {
            message: self.user_message(),
            fatal: self.is_fatal(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facetrack_hw::RecorderError;

    #[test]
    fn test_fixed_messages() {
        let capture = SessionError::from(CaptureError::DeviceBusy);
        assert!(capture.is_fatal());
        assert_eq!(
            capture.user_message(),
            "Failed to access camera. Please ensure camera permissions are granted."
        );

        let models = SessionError::ModelsUnavailable("x".into());
        assert!(models.is_fatal());
        assert_eq!(models.user_message(), "Failed to load face detection models");

        let rec = SessionError::from(RecordingError::Setup(RecorderError::StreamInactive));
        assert!(!rec.is_fatal());
        assert_eq!(rec.to_user_error().message, "Failed to start recording");
    }
}
