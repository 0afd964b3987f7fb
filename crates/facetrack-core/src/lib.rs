//! facetrack-core — Detection data model and overlay description.
//!
//! Face analysis itself is an external capability behind [`FaceAnalyzer`];
//! this crate defines what it returns and how results become an overlay.

pub mod analyzer;
pub mod expression;
pub mod models;
pub mod overlay;
pub mod types;

pub use analyzer::{DetectionError, FaceAnalyzer, RgbFrame};
pub use expression::{Expression, ExpressionLabel, ExpressionScores};
pub use models::{default_model_dir, ModelKind, ModelLoadError, MODEL_LOAD_FAILED_MESSAGE};
pub use overlay::{Overlay, OverlayFace};
pub use types::{BoundingBox, DetectionFrame, Dimensions, FaceObservation, Point};
