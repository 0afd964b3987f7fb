//! Observable session state.
//!
//! Every field has exactly one writer: readiness, capture and error belong to
//! the controller, face presence and overlay to the detection loop, recording
//! state and gallery to the recording manager. Readers get a [`SessionView`].

use facetrack_core::{DetectionFrame, Dimensions, Overlay};
use tokio::sync::watch;

use crate::gallery::ClipRecord;

/// Whether the face analysis models are usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadinessState {
    Loading,
    Ready,
    Failed(String),
}

impl ReadinessState {
    pub fn is_ready(&self) -> bool {
        matches!(self, ReadinessState::Ready)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    Idle,
    Active,
}

/// An error shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserError {
    pub message: String,
    /// Fatal errors leave only a full reload as recovery.
    pub fatal: bool,
}

/// Writer half for the detection loop's outputs.
pub struct DetectionOutputs {
    face_detected: watch::Sender<bool>,
    overlay: watch::Sender<Overlay>,
    display: Option<Dimensions>,
}

impl DetectionOutputs {
    pub(crate) fn new(display: Option<Dimensions>) -> (Self, DetectionReaders) {
        let (face_tx, face_rx) = watch::channel(false);
        let (overlay_tx, overlay_rx) = watch::channel(Overlay::empty(Dimensions::new(0, 0)));
        (
            Self {
                face_detected: face_tx,
                overlay: overlay_tx,
                display,
            },
            DetectionReaders {
                face_detected: face_rx,
                overlay: overlay_rx,
            },
        )
    }

    /// Publish one tick's results. The overlay is rescaled to the configured
    /// display size, or kept in frame coordinates when none is set.
    pub fn publish(&self, frame: &DetectionFrame) {
        let display = self.display.unwrap_or(frame.source);
        self.face_detected.send_replace(frame.face_present());
        self.overlay
            .send_replace(Overlay::from_detections(frame, display));
    }

    pub fn clear(&self) {
        self.face_detected.send_replace(false);
        self.overlay
            .send_replace(Overlay::empty(Dimensions::new(0, 0)));
    }
}

pub(crate) struct DetectionReaders {
    pub face_detected: watch::Receiver<bool>,
    pub overlay: watch::Receiver<Overlay>,
}

/// Read-only, cloneable view of the session for the presentation layer.
#[derive(Clone)]
pub struct SessionView {
    pub(crate) readiness: watch::Receiver<ReadinessState>,
    pub(crate) capture_live: watch::Receiver<bool>,
    pub(crate) face_detected: watch::Receiver<bool>,
    pub(crate) overlay: watch::Receiver<Overlay>,
    pub(crate) recording: watch::Receiver<RecordingState>,
    pub(crate) gallery: watch::Receiver<Vec<ClipRecord>>,
    pub(crate) error: watch::Receiver<Option<UserError>>,
}

impl SessionView {
    pub fn readiness(&self) -> ReadinessState {
        self.readiness.borrow().clone()
    }

    pub fn capture_live(&self) -> bool {
        *self.capture_live.borrow()
    }

    pub fn face_detected(&self) -> bool {
        *self.face_detected.borrow()
    }

    pub fn overlay(&self) -> Overlay {
        self.overlay.borrow().clone()
    }

    pub fn recording(&self) -> RecordingState {
        *self.recording.borrow()
    }

    pub fn gallery(&self) -> Vec<ClipRecord> {
        self.gallery.borrow().clone()
    }

    pub fn error(&self) -> Option<UserError> {
        self.error.borrow().clone()
    }

    /// Receiver that wakes on every overlay update.
    pub fn subscribe_overlay(&self) -> watch::Receiver<Overlay> {
        self.overlay.clone()
    }

    pub fn subscribe_face_detected(&self) -> watch::Receiver<bool> {
        self.face_detected.clone()
    }

    pub fn subscribe_gallery(&self) -> watch::Receiver<Vec<ClipRecord>> {
        self.gallery.clone()
    }
}
