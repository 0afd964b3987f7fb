//! Clone-safe handle to a session running on its own task.

use std::path::PathBuf;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::controller::SessionController;
use crate::error::SessionError;
use crate::gallery::ClipId;
use crate::state::SessionView;

type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

/// Messages sent from handles to the session task.
enum SessionRequest {
    Start { reply: Reply<()> },
    AcquireCapture { reply: Reply<()> },
    ReleaseCapture { reply: Reply<()> },
    StartRecording { reply: Reply<()> },
    StopRecording { reply: Reply<Option<ClipId>> },
    ToggleRecording { reply: Reply<Option<ClipId>> },
    Download {
        id: ClipId,
        dir: PathBuf,
        reply: Reply<PathBuf>,
    },
    Delete { id: ClipId, reply: Reply<bool> },
}

#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionRequest>,
    view: SessionView,
}

impl SessionHandle {
    pub fn view(&self) -> &SessionView {
        &self.view
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> SessionRequest,
    ) -> Result<T, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| SessionError::ChannelClosed)?;
        reply_rx.await.map_err(|_| SessionError::ChannelClosed)?
    }

    /// Load models, then acquire the camera and start detection.
    pub async fn start(&self) -> Result<(), SessionError> {
        self.request(|reply| SessionRequest::Start { reply }).await
    }

    pub async fn acquire_capture(&self) -> Result<(), SessionError> {
        self.request(|reply| SessionRequest::AcquireCapture { reply })
            .await
    }

    pub async fn release_capture(&self) -> Result<(), SessionError> {
        self.request(|reply| SessionRequest::ReleaseCapture { reply })
            .await
    }

    pub async fn start_recording(&self) -> Result<(), SessionError> {
        self.request(|reply| SessionRequest::StartRecording { reply })
            .await
    }

    pub async fn stop_recording(&self) -> Result<Option<ClipId>, SessionError> {
        self.request(|reply| SessionRequest::StopRecording { reply })
            .await
    }

    pub async fn toggle_recording(&self) -> Result<Option<ClipId>, SessionError> {
        self.request(|reply| SessionRequest::ToggleRecording { reply })
            .await
    }

    pub async fn download(&self, id: ClipId, dir: PathBuf) -> Result<PathBuf, SessionError> {
        self.request(|reply| SessionRequest::Download { id, dir, reply })
            .await
    }

    pub async fn delete(&self, id: ClipId) -> Result<bool, SessionError> {
        self.request(|reply| SessionRequest::Delete { id, reply })
            .await
    }
}

/// Move `controller` onto a task that serves requests in order.
///
/// The task tears the session down (finalizing any recording and releasing
/// the camera) once every handle has been dropped. Await the returned
/// `JoinHandle` to wait for that.
pub fn spawn_session(controller: SessionController) -> (SessionHandle, JoinHandle<()>) {
    let view = controller.view();
    let (tx, mut rx) = mpsc::channel::<SessionRequest>(8);

    let task = tokio::spawn(async move {
        let mut controller = controller;
        tracing::info!("session task started");
        while let Some(req) = rx.recv().await {
            match req {
                SessionRequest::Start { reply } => {
                    let _ = reply.send(controller.start().await);
                }
                SessionRequest::AcquireCapture { reply } => {
                    let _ = reply.send(controller.acquire_capture().await);
                }
                SessionRequest::ReleaseCapture { reply } => {
                    controller.release_capture().await;
                    let _ = reply.send(Ok(()));
                }
                SessionRequest::StartRecording { reply } => {
                    let _ = reply.send(controller.start_recording());
                }
                SessionRequest::StopRecording { reply } => {
                    let _ = reply.send(controller.stop_recording().await);
                }
                SessionRequest::ToggleRecording { reply } => {
                    let _ = reply.send(controller.toggle_recording().await);
                }
                SessionRequest::Download { id, dir, reply } => {
                    let _ = reply.send(controller.download(id, &dir).await);
                }
                SessionRequest::Delete { id, reply } => {
                    let _ = reply.send(controller.delete(id));
                }
            }
        }
        controller.shutdown().await;
        tracing::info!("session task exiting");
    });

    (SessionHandle { tx, view }, task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{Collaborators, SessionSettings};
    use crate::state::RecordingState;
    use crate::store::MemoryStore;
    use crate::testing::{FakeAnalyzer, FakeDevice, FakeRecorderBackend};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    fn spawn(device: Arc<FakeDevice>) -> (SessionHandle, JoinHandle<()>) {
        let controller = SessionController::new(
            SessionSettings::default(),
            Collaborators {
                analyzer: Arc::new(FakeAnalyzer::new()),
                device,
                recorder: Arc::new(FakeRecorderBackend::new()),
                store: Arc::new(MemoryStore::new()),
            },
        )
        .unwrap();
        spawn_session(controller)
    }

    #[tokio::test(start_paused = true)]
    async fn test_requests_are_served_in_order() {
        let device = Arc::new(FakeDevice::new());
        let (handle, task) = spawn(device.clone());

        handle.start().await.unwrap();
        assert!(handle.view().capture_live());

        assert_eq!(handle.toggle_recording().await.unwrap(), None);
        assert_eq!(handle.view().recording(), RecordingState::Active);
        let id = handle.toggle_recording().await.unwrap().unwrap();
        assert_eq!(handle.view().gallery().len(), 1);

        assert!(handle.delete(id).await.unwrap());
        assert!(handle.view().gallery().is_empty());

        handle.release_capture().await.unwrap();
        assert!(!handle.view().capture_live());

        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handles_releases_camera() {
        let device = Arc::new(FakeDevice::new());
        let (handle, task) = spawn(device.clone());
        let view = handle.view().clone();
        handle.start().await.unwrap();
        handle.start_recording().await.unwrap();

        drop(handle);
        task.await.unwrap();

        assert!(!view.capture_live());
        assert_eq!(view.recording(), RecordingState::Idle);
        assert_eq!(view.gallery().len(), 1);
        let stream = device.last_stream().unwrap();
        assert_eq!(stream.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_session_reports_channel_closed() {
        let (handle, task) = spawn(Arc::new(FakeDevice::new()));
        task.abort();
        let _ = task.await;
        assert!(matches!(
            handle.start().await,
            Err(SessionError::ChannelClosed)
        ));
    }
}
