//! V4L2 capture backend via the `v4l` crate.
//!
//! Each opened stream owns a capture thread that keeps the most recent frame
//! available to readers until the tracks are stopped.

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

use crate::frame::{self, Frame};
use crate::stream::{CaptureConstraints, CaptureDevice, CaptureError, MediaStream, StreamSettings};

const MMAP_BUFFERS: u32 = 4;
/// Upper bound on how long the capture thread waits for a frame before it
/// re-checks whether the stream was stopped.
const DEQUEUE_TIMEOUT: Duration = Duration::from_millis(200);

/// Info about a discovered V4L2 device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
    pub driver: String,
    pub bus: String,
}

/// A V4L2 video device that opens [`V4lStream`]s.
pub struct V4lCamera {
    device_path: String,
}

impl V4lCamera {
    pub fn new(device_path: impl Into<String>) -> Self {
        Self {
            device_path: device_path.into(),
        }
    }

    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Open the device and negotiate YUYV at the preferred size.
    fn open_device(
        device_path: &str,
        constraints: &CaptureConstraints,
    ) -> Result<(Device, u32, u32), CaptureError> {
        if !Path::new(device_path).exists() {
            return Err(CaptureError::DeviceNotFound(device_path.to_string()));
        }

        let device = Device::with_path(device_path).map_err(|e| {
            let msg = e.to_string();
            if e.kind() == std::io::ErrorKind::PermissionDenied {
                CaptureError::PermissionDenied(format!("{device_path}: {msg}"))
            } else if msg.contains("busy") || msg.contains("EBUSY") {
                CaptureError::DeviceBusy
            } else {
                CaptureError::DeviceNotFound(format!("{device_path}: {msg}"))
            }
        })?;

        let caps = device.query_caps().map_err(|e| {
            CaptureError::CaptureFailed(format!("failed to query capabilities: {e}"))
        })?;

        tracing::info!(
            device = device_path,
            driver = %caps.driver,
            card = %caps.card,
            "opened camera"
        );

        if !caps
            .capabilities
            .contains(v4l::capability::Flags::VIDEO_CAPTURE)
        {
            return Err(CaptureError::StreamingNotSupported);
        }

        let mut fmt = device.format().map_err(|e| {
            CaptureError::FormatNegotiationFailed(format!("failed to get format: {e}"))
        })?;
        fmt.fourcc = FourCC::new(b"YUYV");
        fmt.width = constraints.ideal_width;
        fmt.height = constraints.ideal_height;

        let negotiated = device.set_format(&fmt).map_err(|e| {
            CaptureError::FormatNegotiationFailed(format!("failed to set format: {e}"))
        })?;

        if negotiated.fourcc != FourCC::new(b"YUYV") {
            return Err(CaptureError::FormatNegotiationFailed(format!(
                "unsupported pixel format: {:?} (need YUYV)",
                negotiated.fourcc
            )));
        }

        tracing::info!(
            width = negotiated.width,
            height = negotiated.height,
            fourcc = ?negotiated.fourcc,
            "negotiated format"
        );

        Ok((device, negotiated.width, negotiated.height))
    }

    /// List available V4L2 video capture devices.
    pub fn list_devices() -> Vec<DeviceInfo> {
        let mut devices = Vec::new();

        for i in 0..16 {
            let path = format!("/dev/video{i}");
            if !Path::new(&path).exists() {
                continue;
            }
            let Ok(dev) = Device::with_path(&path) else {
                continue;
            };
            let Ok(caps) = dev.query_caps() else {
                continue;
            };
            if !caps
                .capabilities
                .contains(v4l::capability::Flags::VIDEO_CAPTURE)
            {
                continue;
            }
            devices.push(DeviceInfo {
                path,
                name: caps.card.clone(),
                driver: caps.driver.clone(),
                bus: caps.bus.clone(),
            });
        }

        devices
    }
}

#[async_trait]
impl CaptureDevice for V4lCamera {
    async fn open(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Arc<dyn MediaStream>, CaptureError> {
        let path = self.device_path.clone();
        let constraints = constraints.clone();
        let stream = tokio::task::spawn_blocking(move || V4lStream::start(&path, &constraints))
            .await
            .map_err(|e| CaptureError::CaptureFailed(format!("capture setup task failed: {e}")))??;
        Ok(Arc::new(stream))
    }
}

struct Shared {
    latest: Mutex<Option<Frame>>,
    live: AtomicBool,
}

/// A running V4L2 stream. Video only: V4L2 carries no audio track.
pub struct V4lStream {
    id: String,
    width: u32,
    height: u32,
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl V4lStream {
    fn start(device_path: &str, constraints: &CaptureConstraints) -> Result<Self, CaptureError> {
        let (device, width, height) = V4lCamera::open_device(device_path, constraints)?;
        let shared = Arc::new(Shared {
            latest: Mutex::new(None),
            live: AtomicBool::new(true),
        });

        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), CaptureError>>();
        let thread_shared = shared.clone();
        let worker = std::thread::Builder::new()
            .name("facetrack-capture".into())
            .spawn(move || capture_thread(device, width, height, thread_shared, ready_tx))
            .map_err(|e| {
                CaptureError::CaptureFailed(format!("failed to spawn capture thread: {e}"))
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = worker.join();
                return Err(e);
            }
            Err(_) => {
                let _ = worker.join();
                return Err(CaptureError::CaptureFailed(
                    "capture thread exited during setup".into(),
                ));
            }
        }

        Ok(Self {
            id: device_path.to_string(),
            width,
            height,
            shared,
            worker: Mutex::new(Some(worker)),
        })
    }
}

fn capture_thread(
    device: Device,
    width: u32,
    height: u32,
    shared: Arc<Shared>,
    ready: mpsc::Sender<Result<(), CaptureError>>,
) {
    let mut stream = match MmapStream::with_buffers(&device, BufType::VideoCapture, MMAP_BUFFERS) {
        Ok(s) => s,
        Err(e) => {
            shared.live.store(false, Ordering::SeqCst);
            let _ = ready.send(Err(CaptureError::CaptureFailed(format!(
                "failed to create mmap stream: {e}"
            ))));
            return;
        }
    };
    stream.set_timeout(DEQUEUE_TIMEOUT);
    let _ = ready.send(Ok(()));
    tracing::debug!(width, height, "capture thread started");

    while shared.live.load(Ordering::SeqCst) {
        let (buf, meta) = match stream.next() {
            Ok(next) => next,
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
            Err(e) => {
                tracing::warn!(error = %e, "failed to dequeue buffer; stopping stream");
                shared.live.store(false, Ordering::SeqCst);
                break;
            }
        };
        match frame::yuyv_to_rgb(buf, width, height) {
            Ok(rgb) => {
                let frame = Frame {
                    data: rgb,
                    width,
                    height,
                    timestamp: std::time::Instant::now(),
                    sequence: meta.sequence,
                };
                if let Ok(mut latest) = shared.latest.lock() {
                    *latest = Some(frame);
                }
            }
            Err(e) => tracing::debug!(seq = meta.sequence, error = %e, "dropping short frame"),
        }
    }
    tracing::debug!("capture thread exiting");
}

impl MediaStream for V4lStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn settings(&self) -> StreamSettings {
        StreamSettings {
            width: self.width,
            height: self.height,
            has_audio: false,
        }
    }

    fn latest_frame(&self) -> Option<Frame> {
        self.shared.latest.lock().ok().and_then(|f| f.clone())
    }

    fn is_live(&self) -> bool {
        self.shared.live.load(Ordering::SeqCst)
    }

    /// Never blocks: the capture thread notices the cleared flag after its
    /// current dequeue and is joined in the background.
    fn stop_tracks(&self) {
        self.shared.live.store(false, Ordering::SeqCst);
        let worker = self.worker.lock().ok().and_then(|mut w| w.take());
        if let Some(worker) = worker {
            reap_in_background(worker, self.id.clone());
        }
        if let Ok(mut latest) = self.shared.latest.lock() {
            *latest = None;
        }
    }
}

/// Join `worker` on a short-lived thread so the caller (often an async
/// task) does not wait for an in-flight dequeue.
fn reap_in_background(worker: JoinHandle<()>, stream: String) {
    let spawned = std::thread::Builder::new()
        .name("facetrack-capture-reap".into())
        .spawn(move || {
            if worker.join().is_err() {
                tracing::warn!(%stream, "capture thread panicked");
            }
        });
    if let Err(e) = spawned {
        // Dropping the handle detaches the capture thread; it still exits on
        // its next loop check.
        tracing::warn!(error = %e, "failed to spawn capture reaper; detaching");
    }
}

impl Drop for V4lStream {
    fn drop(&mut self) {
        self.stop_tracks();
    }
}
