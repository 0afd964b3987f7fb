//! The face analysis capability consumed by the session.
//!
//! Localization, landmark extraction and expression classification are
//! provided by a backend behind [`FaceAnalyzer`]. One `detect` call runs all
//! three stages so the localization pass is shared.

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

use crate::models::{verify_artifact, ModelKind, ModelLoadError};
use crate::types::{Dimensions, FaceObservation};

/// Borrowed packed RGB8 image, row-major, `width * height * 3` bytes.
#[derive(Debug, Clone, Copy)]
pub struct RgbFrame<'a> {
    pub data: &'a [u8],
    pub width: u32,
    pub height: u32,
}

impl<'a> RgbFrame<'a> {
    pub fn new(data: &'a [u8], width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
        }
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }
}

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("models not loaded")]
    NotReady,
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
}

#[async_trait]
pub trait FaceAnalyzer: Send + Sync {
    /// Load one network from `dir`.
    ///
    /// The default only verifies that the artifact is present and
    /// consistent; backends that hold weights in memory override it.
    async fn load_model(&self, kind: ModelKind, dir: &Path) -> Result<(), ModelLoadError> {
        let bytes = verify_artifact(kind, dir)?;
        tracing::info!(model = %kind, bytes, "model artifact verified");
        Ok(())
    }

    /// Locate faces, then extract landmarks and expression scores for each.
    async fn detect(&self, frame: RgbFrame<'_>) -> Result<Vec<FaceObservation>, DetectionError>;
}
