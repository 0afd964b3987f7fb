//! Model readiness gate.

use facetrack_core::{FaceAnalyzer, ModelKind, ModelLoadError, MODEL_LOAD_FAILED_MESSAGE};
use std::path::{Path, PathBuf};
use tokio::sync::watch;

use crate::state::ReadinessState;

/// Load all four networks concurrently, failing on the first error.
pub async fn load_all(analyzer: &dyn FaceAnalyzer, dir: &Path) -> Result<(), ModelLoadError> {
    let [detector, landmarks, recognition, expressions] = ModelKind::ALL;
    tokio::try_join!(
        analyzer.load_model(detector, dir),
        analyzer.load_model(landmarks, dir),
        analyzer.load_model(recognition, dir),
        analyzer.load_model(expressions, dir),
    )?;
    Ok(())
}

/// Owns [`ReadinessState`]. Settles once; later calls return the settled state.
pub struct ModelGate {
    model_dir: PathBuf,
    state: watch::Sender<ReadinessState>,
}

impl ModelGate {
    pub fn new(model_dir: PathBuf) -> (Self, watch::Receiver<ReadinessState>) {
        let (state, rx) = watch::channel(ReadinessState::Loading);
        (Self { model_dir, state }, rx)
    }

    pub fn state(&self) -> ReadinessState {
        self.state.borrow().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.state.borrow().is_ready()
    }

    pub async fn initialize(&self, analyzer: &dyn FaceAnalyzer) -> ReadinessState {
        if !matches!(*self.state.borrow(), ReadinessState::Loading) {
            return self.state();
        }

        tracing::info!(dir = %self.model_dir.display(), "loading face analysis models");
        let next = match load_all(analyzer, &self.model_dir).await {
            Ok(()) => {
                tracing::info!("face analysis models ready");
                ReadinessState::Ready
            }
            Err(e) => {
                tracing::error!(error = %e, "error loading models");
                ReadinessState::Failed(MODEL_LOAD_FAILED_MESSAGE.to_string())
            }
        };
        self.state.send_replace(next.clone());
        next
    }
}
