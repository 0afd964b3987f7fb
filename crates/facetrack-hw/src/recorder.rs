//! Recording API: encodes a live stream into incremental binary chunks.
//!
//! The encoder is an external collaborator. The session hands it a stream,
//! the negotiated options and a chunk sink, and later asks it to stop.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::stream::MediaStream;

/// Higher-efficiency codec tried first.
pub const PREFERRED_MIME_TYPE: &str = "video/webm;codecs=vp9";
/// Baseline container every backend must accept.
pub const FALLBACK_MIME_TYPE: &str = "video/webm";
/// Target video bitrate, 2.5 Mbps.
pub const DEFAULT_VIDEO_BITRATE: u32 = 2_500_000;

/// Where an active recorder delivers encoded data as it becomes available.
pub type ChunkSink = mpsc::UnboundedSender<Bytes>;

#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("unsupported mime type: {0}")]
    UnsupportedType(String),
    #[error("stream is not live")]
    StreamInactive,
    #[error("encoder failed: {0}")]
    Encoder(String),
}

/// Encoding parameters for one recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecorderOptions {
    pub mime_type: String,
    pub video_bits_per_second: u32,
}

impl RecorderOptions {
    /// Prefer VP9 and fall back to plain WebM when the backend can't do it.
    pub fn negotiate(backend: &dyn RecorderBackend, video_bits_per_second: u32) -> Self {
        let mime_type = if backend.is_type_supported(PREFERRED_MIME_TYPE) {
            PREFERRED_MIME_TYPE
        } else {
            tracing::debug!(
                preferred = PREFERRED_MIME_TYPE,
                fallback = FALLBACK_MIME_TYPE,
                "preferred codec unsupported, falling back"
            );
            FALLBACK_MIME_TYPE
        };
        Self {
            mime_type: mime_type.to_string(),
            video_bits_per_second,
        }
    }

    /// Mime type without codec parameters, e.g. `video/webm`.
    pub fn container_mime(&self) -> &str {
        container_mime(&self.mime_type)
    }

    /// File extension for the container, e.g. `webm`.
    pub fn extension(&self) -> &str {
        container_extension(&self.mime_type)
    }
}

pub fn container_mime(mime: &str) -> &str {
    mime.split(';').next().unwrap_or(mime).trim()
}

pub fn container_extension(mime: &str) -> &str {
    let container = container_mime(mime);
    container
        .split_once('/')
        .map(|(_, sub)| sub)
        .filter(|sub| !sub.is_empty())
        .unwrap_or("bin")
}

pub trait RecorderBackend: Send + Sync {
    fn is_type_supported(&self, mime_type: &str) -> bool;

    /// Begin encoding `stream`. Chunks go to `sink` until [`ActiveRecorder::stop`].
    fn start(
        &self,
        stream: Arc<dyn MediaStream>,
        options: &RecorderOptions,
        sink: ChunkSink,
    ) -> Result<Box<dyn ActiveRecorder>, RecorderError>;
}

#[async_trait]
pub trait ActiveRecorder: Send + Sync {
    /// Flush any buffered data into the sink and stop. No chunks are sent
    /// after this returns.
    async fn stop(self: Box<Self>) -> Result<(), RecorderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Support(&'static [&'static str]);

    impl RecorderBackend for Support {
        fn is_type_supported(&self, mime_type: &str) -> bool {
            self.0.iter().any(|m| *m == mime_type)
        }

        fn start(
            &self,
            _stream: Arc<dyn MediaStream>,
            _options: &RecorderOptions,
            _sink: ChunkSink,
        ) -> Result<Box<dyn ActiveRecorder>, RecorderError> {
            Err(RecorderError::Encoder("not used".into()))
        }
    }

    #[test]
    fn test_negotiate_prefers_vp9() {
        let opts = RecorderOptions::negotiate(
            &Support(&[PREFERRED_MIME_TYPE, FALLBACK_MIME_TYPE]),
            DEFAULT_VIDEO_BITRATE,
        );
        assert_eq!(opts.mime_type, "video/webm;codecs=vp9");
        assert_eq!(opts.video_bits_per_second, 2_500_000);
    }

    #[test]
    fn test_negotiate_falls_back() {
        let opts =
            RecorderOptions::negotiate(&Support(&[FALLBACK_MIME_TYPE]), DEFAULT_VIDEO_BITRATE);
        assert_eq!(opts.mime_type, "video/webm");
    }

    #[test]
    fn test_container_helpers() {
        assert_eq!(container_mime("video/webm;codecs=vp9"), "video/webm");
        assert_eq!(container_extension("video/webm;codecs=vp9"), "webm");
        assert_eq!(container_extension("video/mp4"), "mp4");
        assert_eq!(container_extension("garbage"), "bin");
    }
}
