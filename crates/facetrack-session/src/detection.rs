//! Fixed-cadence detection loop over the live stream.

use facetrack_core::{DetectionFrame, FaceAnalyzer};
use facetrack_hw::MediaStream;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::state::DetectionOutputs;

/// Default poll period (10 Hz).
pub const DEFAULT_DETECT_INTERVAL: Duration = Duration::from_millis(100);

/// A running detection task.
///
/// At most one detection is in flight: each tick awaits its detection
/// before the next tick, and ticks missed during a slow pass are skipped.
/// Dropping the loop cancels it.
pub struct DetectionLoop {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl DetectionLoop {
    pub fn spawn(
        analyzer: Arc<dyn FaceAnalyzer>,
        stream: Arc<dyn MediaStream>,
        outputs: Arc<DetectionOutputs>,
        period: Duration,
    ) -> Self {
        let token = CancellationToken::new();
        let handle = tokio::spawn(detection_loop(
            analyzer,
            stream,
            outputs,
            period,
            token.clone(),
        ));
        Self {
            token,
            handle: Some(handle),
        }
    }

    /// True once the task has exited on its own (stream went away).
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Cancel and wait for the task to exit. Nothing is published after this
    /// returns.
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "detection task ended abnormally");
            }
        }
    }
}

impl Drop for DetectionLoop {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn detection_loop(
    analyzer: Arc<dyn FaceAnalyzer>,
    stream: Arc<dyn MediaStream>,
    outputs: Arc<DetectionOutputs>,
    period: Duration,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tracing::info!(
        stream = stream.id(),
        period_ms = period.as_millis() as u64,
        "detection loop started"
    );

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if !stream.is_live() {
            tracing::info!(stream = stream.id(), "stream ended, stopping detection");
            break;
        }

        let Some(frame) = stream.latest_frame() else {
            tracing::trace!("no frame available yet");
            continue;
        };

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            r = analyzer.detect(frame.as_rgb()) => r,
        };

        match result {
            Ok(faces) => {
                let detections = DetectionFrame::new(frame.dimensions(), faces);
                tracing::trace!(faces = detections.len(), seq = frame.sequence, "detection tick");
                outputs.publish(&detections);
            }
            Err(e) => tracing::warn!(error = %e, "face detection error"),
        }
    }

    tracing::info!("detection loop stopped");
}
