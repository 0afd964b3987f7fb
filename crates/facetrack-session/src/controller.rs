//! Session controller: readiness gate → capture → detection and recording.

use facetrack_core::{Dimensions, FaceAnalyzer};
use facetrack_hw::{
    CaptureConstraints, CaptureDevice, CaptureHandle, MediaStream, RecorderBackend,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::detection::{DetectionLoop, DEFAULT_DETECT_INTERVAL};
use crate::error::SessionError;
use crate::gallery::ClipId;
use crate::readiness::ModelGate;
use crate::recording::RecordingManager;
use crate::state::{DetectionOutputs, ReadinessState, SessionView, UserError};
use crate::store::KeyValueStore;

/// Tunables for one session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub model_dir: PathBuf,
    pub constraints: CaptureConstraints,
    pub detect_interval: Duration,
    /// Overlay size; `None` keeps frame coordinates.
    pub display: Option<Dimensions>,
    pub video_bitrate: u32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            model_dir: facetrack_core::default_model_dir(),
            constraints: CaptureConstraints::default(),
            detect_interval: DEFAULT_DETECT_INTERVAL,
            display: None,
            video_bitrate: facetrack_hw::recorder::DEFAULT_VIDEO_BITRATE,
        }
    }
}

/// External capabilities the session drives.
pub struct Collaborators {
    pub analyzer: Arc<dyn FaceAnalyzer>,
    pub device: Arc<dyn CaptureDevice>,
    pub recorder: Arc<dyn RecorderBackend>,
    pub store: Arc<dyn KeyValueStore>,
}

pub struct SessionController {
    settings: SessionSettings,
    analyzer: Arc<dyn FaceAnalyzer>,
    device: Arc<dyn CaptureDevice>,
    gate: ModelGate,
    capture: Option<CaptureHandle>,
    capture_tx: watch::Sender<bool>,
    detection: Option<DetectionLoop>,
    detection_out: Arc<DetectionOutputs>,
    recording: RecordingManager,
    error_tx: watch::Sender<Option<UserError>>,
    view: SessionView,
}

impl SessionController {
    /// Build the session. The gallery is hydrated here; nothing else starts
    /// until [`SessionController::start`]. Fails when the store cannot be read.
    pub fn new(
        settings: SessionSettings,
        collaborators: Collaborators,
    ) -> Result<Self, SessionError> {
        let Collaborators {
            analyzer,
            device,
            recorder,
            store,
        } = collaborators;

        let (gate, readiness_rx) = ModelGate::new(settings.model_dir.clone());
        let (capture_tx, capture_rx) = watch::channel(false);
        let (error_tx, error_rx) = watch::channel(None);
        let (detection_out, detection_rx) = DetectionOutputs::new(settings.display);
        let (recording, recording_rx, gallery_rx) =
            RecordingManager::new(recorder, store, settings.video_bitrate)?;

        let view = SessionView {
            readiness: readiness_rx,
            capture_live: capture_rx,
            face_detected: detection_rx.face_detected,
            overlay: detection_rx.overlay,
            recording: recording_rx,
            gallery: gallery_rx,
            error: error_rx,
        };

        Ok(Self {
            settings,
            analyzer,
            device,
            gate,
            capture: None,
            capture_tx,
            detection: None,
            detection_out: Arc::new(detection_out),
            recording,
            error_tx,
            view,
        })
    }

    pub fn view(&self) -> SessionView {
        self.view.clone()
    }

    pub fn readiness(&self) -> ReadinessState {
        self.gate.state()
    }

    pub fn recording(&self) -> &RecordingManager {
        &self.recording
    }

    /// Load models once. A failure is fatal to the session.
    pub async fn initialize(&mut self) -> ReadinessState {
        let state = self.gate.initialize(self.analyzer.as_ref()).await;
        if let ReadinessState::Failed(reason) = &state {
            self.report(&SessionError::ModelsUnavailable(reason.clone()));
        }
        state
    }

    /// Initialize, acquire the camera and start detection.
    pub async fn start(&mut self) -> Result<(), SessionError> {
        match self.initialize().await {
            ReadinessState::Ready => self.acquire_capture().await,
            ReadinessState::Failed(reason) => Err(SessionError::ModelsUnavailable(reason)),
            ReadinessState::Loading => Err(SessionError::NotReady),
        }
    }

    /// Acquire the capture stream and start detection on it.
    ///
    /// Refused while models are not ready; the device is never touched then.
    pub async fn acquire_capture(&mut self) -> Result<(), SessionError> {
        if !self.gate.is_ready() {
            return Err(SessionError::NotReady);
        }
        if self.capture.as_ref().is_some_and(CaptureHandle::is_live) {
            self.ensure_detection();
            return Ok(());
        }
        // A dead handle still owns the stream; drop it before reopening.
        self.drop_capture().await;

        match CaptureHandle::acquire(self.device.as_ref(), &self.settings.constraints).await {
            Ok(handle) => {
                self.capture = Some(handle);
                self.capture_tx.send_replace(true);
                self.ensure_detection();
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "error accessing camera");
                let err = SessionError::from(e);
                self.report(&err);
                Err(err)
            }
        }
    }

    /// Stop detection, finalize any active recording, then release the stream.
    pub async fn release_capture(&mut self) {
        if self.recording.state() == crate::state::RecordingState::Active {
            if let Err(e) = self.recording.stop().await {
                tracing::warn!(error = %e, "failed to finalize recording during release");
            }
        }
        self.drop_capture().await;
    }

    async fn drop_capture(&mut self) {
        if let Some(detection) = self.detection.take() {
            detection.stop().await;
        }
        self.detection_out.clear();
        if let Some(handle) = self.capture.take() {
            handle.release();
        }
        self.capture_tx.send_replace(false);
    }

    fn live_stream(&self) -> Option<Arc<dyn MediaStream>> {
        self.capture
            .as_ref()
            .filter(|h| h.is_live())
            .map(|h| h.stream().clone())
    }

    /// Start the detection loop if models are ready, a stream is live and no
    /// loop is running.
    fn ensure_detection(&mut self) {
        if !self.gate.is_ready() {
            return;
        }
        let Some(stream) = self.live_stream() else {
            return;
        };
        if self.detection.as_ref().is_some_and(|d| !d.is_finished()) {
            return;
        }
        self.detection = Some(DetectionLoop::spawn(
            self.analyzer.clone(),
            stream,
            self.detection_out.clone(),
            self.settings.detect_interval,
        ));
    }

    pub fn is_detecting(&self) -> bool {
        self.detection.as_ref().is_some_and(|d| !d.is_finished())
    }

    /// Begin recording. Without a live capture this does nothing.
    pub fn start_recording(&mut self) -> Result<(), SessionError> {
        let stream = self.live_stream();
        match self.recording.start(stream) {
            Ok(()) => {
                if self.error_tx.borrow().as_ref().is_some_and(|e| !e.fatal) {
                    self.error_tx.send_replace(None);
                }
                Ok(())
            }
            Err(e) => {
                let err = SessionError::from(e);
                self.report(&err);
                Err(err)
            }
        }
    }

    pub async fn stop_recording(&mut self) -> Result<Option<ClipId>, SessionError> {
        Ok(self.recording.stop().await?)
    }

    /// Start when idle, stop when recording.
    pub async fn toggle_recording(&mut self) -> Result<Option<ClipId>, SessionError> {
        match self.recording.state() {
            crate::state::RecordingState::Idle => {
                self.start_recording()?;
                Ok(None)
            }
            crate::state::RecordingState::Active => self.stop_recording().await,
        }
    }

    pub async fn download(&self, id: ClipId, dir: &Path) -> Result<PathBuf, SessionError> {
        Ok(self.recording.download(id, dir).await?)
    }

    pub fn delete(&mut self, id: ClipId) -> Result<bool, SessionError> {
        Ok(self.recording.delete(id)?)
    }

    /// Tear down: finalize recording, stop detection and release the camera.
    pub async fn shutdown(mut self) {
        self.release_capture().await;
        tracing::info!("session shut down");
    }

    fn report(&self, err: &SessionError) {
        self.error_tx.send_replace(Some(err.to_user_error()));
    }
}
