//! facetrack-hw — Capture and recording collaborators.
//!
//! Provides the capture device API with a V4L2 backend, frame conversion,
//! and the recording API the session drives.

pub mod camera;
pub mod frame;
pub mod recorder;
pub mod stream;

pub use camera::{DeviceInfo, V4lCamera};
pub use frame::Frame;
pub use recorder::{ActiveRecorder, ChunkSink, RecorderBackend, RecorderError, RecorderOptions};
pub use stream::{
    CaptureConstraints, CaptureDevice, CaptureError, CaptureHandle, FacingMode, MediaStream,
    StreamSettings, CAPTURE_FAILED_MESSAGE,
};
