//! In-process collaborators for unit tests.

use async_trait::async_trait;
use bytes::Bytes;
use facetrack_core::{
    BoundingBox, DetectionError, Expression, ExpressionScores, FaceAnalyzer, FaceObservation,
    ModelKind, ModelLoadError, Point, RgbFrame,
};
use facetrack_hw::recorder::{FALLBACK_MIME_TYPE, PREFERRED_MIME_TYPE};
use facetrack_hw::{
    ActiveRecorder, CaptureConstraints, CaptureDevice, CaptureError, ChunkSink, Frame,
    MediaStream, RecorderBackend, RecorderError, RecorderOptions, StreamSettings,
};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn happy_face() -> FaceObservation {
    FaceObservation {
        bounding_box: BoundingBox::new(10.0, 20.0, 30.0, 30.0),
        score: 0.95,
        landmarks: vec![Point::new(20.0, 30.0), Point::new(30.0, 30.0)],
        expressions: ExpressionScores::default()
            .with(Expression::Happy, 0.92)
            .with(Expression::Neutral, 0.05)
            .with(Expression::Sad, 0.03),
    }
}

pub struct FakeAnalyzer {
    pub load_calls: AtomicUsize,
    pub detect_calls: AtomicUsize,
    pub fail_detect: AtomicBool,
    fail_load: Option<ModelKind>,
    faces: Mutex<Vec<FaceObservation>>,
    detect_delay: Option<Duration>,
}

impl FakeAnalyzer {
    pub fn new() -> Self {
        Self {
            load_calls: AtomicUsize::new(0),
            detect_calls: AtomicUsize::new(0),
            fail_detect: AtomicBool::new(false),
            fail_load: None,
            faces: Mutex::new(Vec::new()),
            detect_delay: None,
        }
    }

    pub fn failing_load(kind: ModelKind) -> Self {
        Self {
            fail_load: Some(kind),
            ..Self::new()
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            detect_delay: Some(delay),
            ..Self::new()
        }
    }

    pub fn set_faces(&self, faces: Vec<FaceObservation>) {
        *self.faces.lock().unwrap() = faces;
    }

    pub fn detect_calls(&self) -> usize {
        self.detect_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FaceAnalyzer for FakeAnalyzer {
    async fn load_model(&self, kind: ModelKind, _dir: &Path) -> Result<(), ModelLoadError> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_load == Some(kind) {
            return Err(ModelLoadError::Backend {
                kind,
                message: "404".into(),
            });
        }
        Ok(())
    }

    async fn detect(&self, _frame: RgbFrame<'_>) -> Result<Vec<FaceObservation>, DetectionError> {
        self.detect_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.detect_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_detect.load(Ordering::SeqCst) {
            return Err(DetectionError::InferenceFailed("backend hiccup".into()));
        }
        Ok(self.faces.lock().unwrap().clone())
    }
}

pub struct FakeStream {
    pub live: AtomicBool,
    pub stops: AtomicUsize,
    frame: Frame,
}

impl FakeStream {
    pub fn new() -> Self {
        Self {
            live: AtomicBool::new(true),
            stops: AtomicUsize::new(0),
            frame: Frame {
                data: vec![128; 64 * 48 * 3],
                width: 64,
                height: 48,
                timestamp: std::time::Instant::now(),
                sequence: 0,
            },
        }
    }
}

impl MediaStream for FakeStream {
    fn id(&self) -> &str {
        "fake"
    }

    fn settings(&self) -> StreamSettings {
        StreamSettings {
            width: 64,
            height: 48,
            has_audio: true,
        }
    }

    fn latest_frame(&self) -> Option<Frame> {
        self.is_live().then(|| self.frame.clone())
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    fn stop_tracks(&self) {
        self.live.store(false, Ordering::SeqCst);
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct FakeDevice {
    pub opens: AtomicUsize,
    pub fail: AtomicBool,
    pub streams: Mutex<Vec<Arc<FakeStream>>>,
}

impl FakeDevice {
    pub fn new() -> Self {
        Self {
            opens: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            streams: Mutex::new(Vec::new()),
        }
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn last_stream(&self) -> Option<Arc<FakeStream>> {
        self.streams.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl CaptureDevice for FakeDevice {
    async fn open(
        &self,
        _constraints: &CaptureConstraints,
    ) -> Result<Arc<dyn MediaStream>, CaptureError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(CaptureError::PermissionDenied("NotAllowedError".into()));
        }
        let stream = Arc::new(FakeStream::new());
        self.streams.lock().unwrap().push(stream.clone());
        Ok(stream)
    }
}

pub struct FakeRecorderBackend {
    pub starts: AtomicUsize,
    pub fail_start: AtomicBool,
    pub vp9: bool,
    pub last_options: Mutex<Option<RecorderOptions>>,
}

impl FakeRecorderBackend {
    pub fn new() -> Self {
        Self {
            starts: AtomicUsize::new(0),
            fail_start: AtomicBool::new(false),
            vp9: true,
            last_options: Mutex::new(None),
        }
    }

    pub fn without_vp9() -> Self {
        Self {
            vp9: false,
            ..Self::new()
        }
    }
}

impl RecorderBackend for FakeRecorderBackend {
    fn is_type_supported(&self, mime_type: &str) -> bool {
        mime_type == FALLBACK_MIME_TYPE || (self.vp9 && mime_type == PREFERRED_MIME_TYPE)
    }

    fn start(
        &self,
        stream: Arc<dyn MediaStream>,
        options: &RecorderOptions,
        sink: ChunkSink,
    ) -> Result<Box<dyn ActiveRecorder>, RecorderError> {
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(RecorderError::Encoder("NotSupportedError".into()));
        }
        if !stream.is_live() {
            return Err(RecorderError::StreamInactive);
        }
        self.starts.fetch_add(1, Ordering::SeqCst);
        *self.last_options.lock().unwrap() = Some(options.clone());
        let _ = sink.send(Bytes::from_static(b"head-"));
        Ok(Box::new(FakeRecorder { sink }))
    }
}

struct FakeRecorder {
    sink: ChunkSink,
}

#[async_trait]
impl ActiveRecorder for FakeRecorder {
    async fn stop(self: Box<Self>) -> Result<(), RecorderError> {
        let _ = self.sink.send(Bytes::new());
        let _ = self.sink.send(Bytes::from_static(b"tail"));
        Ok(())
    }
}
