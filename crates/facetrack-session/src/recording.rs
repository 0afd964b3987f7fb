//! Recording lifecycle and the persisted clip gallery.

use bytes::{Bytes, BytesMut};
use chrono::Local;
use facetrack_hw::{
    ActiveRecorder, MediaStream, RecorderBackend, RecorderError, RecorderOptions,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch};

use crate::gallery::{
    display_name_at, now_millis, ClipGallery, ClipId, ClipIdGenerator, ClipMedia, ClipRecord,
};
use crate::state::RecordingState;
use crate::store::{load_projection, save_projection, KeyValueStore, StoreError};

/// Fixed user-facing message for recording setup failures.
pub const RECORDING_FAILED_MESSAGE: &str = "Failed to start recording";

#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("recording setup failed: {0}")]
    Setup(#[source] RecorderError),
    #[error("failed to persist gallery: {0}")]
    Persist(#[from] StoreError),
    #[error("no clip ids left above {0}")]
    IdsExhausted(ClipId),
}

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("no clip with id {0}")]
    NotFound(ClipId),
    #[error("clip {0} has no media in this session")]
    MediaUnavailable(ClipId),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

struct ActiveRecording {
    recorder: Box<dyn ActiveRecorder>,
    chunks: mpsc::UnboundedReceiver<Bytes>,
    options: RecorderOptions,
    started: std::time::Instant,
}

/// Owns the recording state machine and the gallery.
pub struct RecordingManager {
    backend: Arc<dyn RecorderBackend>,
    store: Arc<dyn KeyValueStore>,
    video_bitrate: u32,
    gallery: ClipGallery,
    ids: ClipIdGenerator,
    active: Option<ActiveRecording>,
    state_tx: watch::Sender<RecordingState>,
    gallery_tx: watch::Sender<Vec<ClipRecord>>,
}

impl RecordingManager {
    /// Create the manager and hydrate the gallery from `store`.
    ///
    /// Hydrated entries have no media. Metadata that does not parse is
    /// logged and treated as an empty gallery; the next mutation overwrites
    /// it. Any other storage error is returned so a failed read never leads
    /// to the stored history being overwritten.
    pub fn new(
        backend: Arc<dyn RecorderBackend>,
        store: Arc<dyn KeyValueStore>,
        video_bitrate: u32,
    ) -> Result<
        (
            Self,
            watch::Receiver<RecordingState>,
            watch::Receiver<Vec<ClipRecord>>,
        ),
        StoreError,
    > {
        let gallery = match load_projection(store.as_ref()) {
            Ok(entries) => {
                tracing::info!(clips = entries.len(), "gallery hydrated from storage");
                ClipGallery::from_projection(entries)
            }
            Err(StoreError::Malformed(e)) => {
                tracing::warn!(error = %e, "ignoring unparsable gallery metadata");
                ClipGallery::new()
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to read gallery metadata");
                return Err(e);
            }
        };
        let ids = ClipIdGenerator::after(gallery.max_id());
        let (state_tx, state_rx) = watch::channel(RecordingState::Idle);
        let (gallery_tx, gallery_rx) = watch::channel(gallery.clips().to_vec());
        Ok((
            Self {
                backend,
                store,
                video_bitrate,
                gallery,
                ids,
                active: None,
                state_tx,
                gallery_tx,
            },
            state_rx,
            gallery_rx,
        ))
    }

    pub fn state(&self) -> RecordingState {
        if self.active.is_some() {
            RecordingState::Active
        } else {
            RecordingState::Idle
        }
    }

    pub fn gallery(&self) -> &ClipGallery {
        &self.gallery
    }

    /// Start recording `stream`. Without a stream, or while already
    /// recording, this does nothing.
    pub fn start(&mut self, stream: Option<Arc<dyn MediaStream>>) -> Result<(), RecordingError> {
        let Some(stream) = stream else {
            tracing::debug!("start recording ignored: no capture");
            return Ok(());
        };
        if self.active.is_some() {
            tracing::debug!("start recording ignored: already recording");
            return Ok(());
        }

        let options = RecorderOptions::negotiate(self.backend.as_ref(), self.video_bitrate);
        let (sink, chunks) = mpsc::unbounded_channel();
        let recorder = self
            .backend
            .start(stream, &options, sink)
            .map_err(|e| {
                tracing::error!(error = %e, "error starting recording");
                RecordingError::Setup(e)
            })?;

        tracing::info!(
            mime = %options.mime_type,
            bitrate = options.video_bits_per_second,
            "recording started"
        );
        self.active = Some(ActiveRecording {
            recorder,
            chunks,
            options,
            started: std::time::Instant::now(),
        });
        self.state_tx.send_replace(RecordingState::Active);
        Ok(())
    }

    /// Stop recording and finalize the clip. Returns `None` when idle.
    pub async fn stop(&mut self) -> Result<Option<ClipId>, RecordingError> {
        let Some(active) = self.active.take() else {
            return Ok(None);
        };
        self.state_tx.send_replace(RecordingState::Idle);

        let ActiveRecording {
            recorder,
            mut chunks,
            options,
            started,
        } = active;

        if let Err(e) = recorder.stop().await {
            tracing::warn!(
                error = %e,
                "recorder reported an error while stopping; keeping data received so far"
            );
        }

        let mut blob = BytesMut::new();
        let mut count = 0usize;
        while let Ok(chunk) = chunks.try_recv() {
            if chunk.is_empty() {
                continue;
            }
            blob.extend_from_slice(&chunk);
            count += 1;
        }

        let created_at = now_millis();
        let Some(id) = self.ids.next(created_at.timestamp_millis().max(0) as u64) else {
            let newest = self.gallery.max_id().unwrap_or(ClipId(u64::MAX));
            tracing::error!(
                %newest,
                chunks = count,
                "clip id space exhausted; discarding recording"
            );
            return Err(RecordingError::IdsExhausted(newest));
        };
        let clip = ClipRecord {
            id,
            created_at,
            display_name: display_name_at(created_at.with_timezone(&Local)),
            media: Some(ClipMedia::new(blob.freeze(), options.container_mime())),
        };
        tracing::info!(
            id = %clip.id,
            name = %clip.display_name,
            chunks = count,
            bytes = clip.media.as_ref().map_or(0, |m| m.len()),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "recording finalized"
        );

        self.gallery.append(clip);
        self.publish();
        self.persist()?;
        Ok(Some(id))
    }

    /// Remove the clip with `id`. Returns whether anything was removed;
    /// nothing is written when the id is unknown.
    pub fn delete(&mut self, id: ClipId) -> Result<bool, RecordingError> {
        let Some(removed) = self.gallery.remove(id) else {
            tracing::debug!(%id, "delete ignored: unknown clip");
            return Ok(false);
        };
        tracing::info!(id = %removed.id, name = %removed.display_name, "clip deleted");
        self.publish();
        self.persist()?;
        Ok(true)
    }

    /// Save the clip's media to `dir` as `<display name>.<ext>`.
    pub async fn download(&self, id: ClipId, dir: &Path) -> Result<PathBuf, DownloadError> {
        let clip = self.gallery.get(id).ok_or(DownloadError::NotFound(id))?;
        let media = clip
            .media
            .as_ref()
            .ok_or(DownloadError::MediaUnavailable(id))?;
        let ext = facetrack_hw::recorder::container_extension(&media.mime_type);
        let path = dir.join(clip.file_name(ext));
        tokio::fs::create_dir_all(dir).await?;
        tokio::fs::write(&path, &media.blob).await?;
        tracing::info!(%id, path = %path.display(), bytes = media.len(), "clip saved");
        Ok(path)
    }

    fn publish(&self) {
        self.gallery_tx.send_replace(self.gallery.clips().to_vec());
    }

    fn persist(&self) -> Result<(), StoreError> {
        save_projection(self.store.as_ref(), &self.gallery.projection()).map_err(|e| {
            tracing::error!(error = %e, "failed to persist gallery metadata");
            e
        })
    }
}
