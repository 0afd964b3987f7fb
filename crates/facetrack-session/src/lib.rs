//! facetrack-session — Recording session for the face-tracking recorder.
//!
//! A [`SessionController`] gates everything on model readiness, owns the
//! camera, runs the detection loop and manages recordings and the persisted
//! clip gallery. [`spawn_session`] moves a controller onto its own task.

pub mod config;
pub mod controller;
pub mod detection;
pub mod error;
pub mod gallery;
pub mod handle;
pub mod readiness;
pub mod recording;
pub mod state;
pub mod store;

#[cfg(test)]
mod testing;

pub use config::{Config, ConfigError};
pub use controller::{Collaborators, SessionController, SessionSettings};
pub use detection::{DetectionLoop, DEFAULT_DETECT_INTERVAL};
pub use error::SessionError;
pub use gallery::{ClipGallery, ClipId, ClipMetadata, ClipRecord};
pub use handle::{spawn_session, SessionHandle};
pub use readiness::ModelGate;
pub use recording::{DownloadError, RecordingError, RecordingManager};
pub use state::{ReadinessState, RecordingState, SessionView, UserError};
pub use store::{KeyValueStore, MemoryStore, SqliteStore, StoreError, GALLERY_KEY};
