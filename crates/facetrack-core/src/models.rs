//! Model artifacts consumed by the face analyzer.
//!
//! Each of the four networks ships as a TensorFlow.js weights manifest plus
//! one or more binary shards in a single directory. This module only checks
//! that an artifact is present and internally consistent; interpreting the
//! weights is the analyzer's business.

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// System-wide model directory used when nothing else is configured.
pub const DEFAULT_MODEL_DIR: &str = "/usr/share/facetrack/models";

/// Fixed user-facing message for any model load failure.
pub const MODEL_LOAD_FAILED_MESSAGE: &str = "Failed to load face detection models";

pub fn default_model_dir() -> PathBuf {
    PathBuf::from(DEFAULT_MODEL_DIR)
}

/// The four networks that must load before anything else runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    /// Compact face locator.
    TinyFaceDetector,
    /// 68-point landmark extractor.
    FaceLandmark68,
    /// Face embedding extractor.
    FaceRecognition,
    /// Expression classifier.
    FaceExpression,
}

impl ModelKind {
    pub const ALL: [ModelKind; 4] = [
        ModelKind::TinyFaceDetector,
        ModelKind::FaceLandmark68,
        ModelKind::FaceRecognition,
        ModelKind::FaceExpression,
    ];

    /// File stem shared by the manifest and its shards.
    pub fn stem(&self) -> &'static str {
        match self {
            ModelKind::TinyFaceDetector => "tiny_face_detector_model",
            ModelKind::FaceLandmark68 => "face_landmark_68_model",
            ModelKind::FaceRecognition => "face_recognition_model",
            ModelKind::FaceExpression => "face_expression_model",
        }
    }

    pub fn manifest_file_name(&self) -> String {
        format!("{}-weights_manifest.json", self.stem())
    }

    pub fn manifest_path(&self, dir: &Path) -> PathBuf {
        dir.join(self.manifest_file_name())
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stem())
    }
}

#[derive(Error, Debug)]
pub enum ModelLoadError {
    #[error("{kind}: manifest not found at {}", path.display())]
    ManifestNotFound { kind: ModelKind, path: PathBuf },
    #[error("{kind}: invalid manifest {}: {source}", path.display())]
    InvalidManifest {
        kind: ModelKind,
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{kind}: unsupported dtype {dtype} for weight {weight}")]
    UnsupportedDtype {
        kind: ModelKind,
        weight: String,
        dtype: String,
    },
    #[error("{kind}: shard missing: {}", path.display())]
    ShardMissing { kind: ModelKind, path: PathBuf },
    #[error("{kind}: declared size of weight {weight} overflows")]
    SizeOverflow { kind: ModelKind, weight: String },
    #[error("{kind}: weights declare {expected} bytes but shards hold {actual}")]
    SizeMismatch {
        kind: ModelKind,
        expected: u64,
        actual: u64,
    },
    #[error("{kind}: {message}")]
    Backend { kind: ModelKind, message: String },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeightGroup {
    pub paths: Vec<String>,
    pub weights: Vec<WeightSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeightSpec {
    pub name: String,
    pub shape: Vec<u64>,
    pub dtype: String,
    #[serde(default)]
    pub quantization: Option<Quantization>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Quantization {
    pub dtype: String,
}

fn dtype_size(dtype: &str) -> Option<u64> {
    match dtype {
        "float32" | "int32" => Some(4),
        "float16" | "uint16" => Some(2),
        "uint8" | "bool" => Some(1),
        _ => None,
    }
}

impl WeightSpec {
    /// Bytes this tensor occupies in the shard stream.
    fn byte_len(&self, kind: ModelKind) -> Result<u64, ModelLoadError> {
        let stored = self
            .quantization
            .as_ref()
            .map(|q| q.dtype.as_str())
            .unwrap_or(self.dtype.as_str());
        let size = dtype_size(stored).ok_or_else(|| ModelLoadError::UnsupportedDtype {
            kind,
            weight: self.name.clone(),
            dtype: stored.to_string(),
        })?;
        self.shape
            .iter()
            .try_fold(size, |acc, &dim| acc.checked_mul(dim))
            .ok_or_else(|| ModelLoadError::SizeOverflow {
                kind,
                weight: self.name.clone(),
            })
    }
}

/// A parsed weights manifest with its resolved shard paths.
#[derive(Debug, Clone)]
pub struct ModelManifest {
    pub kind: ModelKind,
    pub groups: Vec<WeightGroup>,
    dir: PathBuf,
}

impl ModelManifest {
    /// Read and parse the manifest for `kind` from `dir`.
    pub fn load(kind: ModelKind, dir: &Path) -> Result<Self, ModelLoadError> {
        let path = kind.manifest_path(dir);
        if !path.exists() {
            return Err(ModelLoadError::ManifestNotFound { kind, path });
        }
        let raw = std::fs::read(&path)?;
        let groups: Vec<WeightGroup> =
            serde_json::from_slice(&raw).map_err(|source| ModelLoadError::InvalidManifest {
                kind,
                path: path.clone(),
                source,
            })?;
        tracing::debug!(
            model = %kind,
            groups = groups.len(),
            path = %path.display(),
            "parsed weights manifest"
        );
        Ok(Self {
            kind,
            groups,
            dir: dir.to_path_buf(),
        })
    }

    pub fn shard_paths(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.groups
            .iter()
            .flat_map(|g| g.paths.iter())
            .map(|p| self.dir.join(p))
    }

    pub fn weight_count(&self) -> usize {
        self.groups.iter().map(|g| g.weights.len()).sum()
    }

    /// Total bytes declared by all weights.
    pub fn declared_bytes(&self) -> Result<u64, ModelLoadError> {
        self.groups
            .iter()
            .flat_map(|g| g.weights.iter())
            .try_fold(0u64, |total, w| {
                total
                    .checked_add(w.byte_len(self.kind)?)
                    .ok_or_else(|| ModelLoadError::SizeOverflow {
                        kind: self.kind,
                        weight: w.name.clone(),
                    })
            })
    }

    /// Check every shard exists and the shards together hold exactly the
    /// declared number of bytes. Returns the verified byte count.
    pub fn verify(&self) -> Result<u64, ModelLoadError> {
        let expected = self.declared_bytes()?;
        let mut actual = 0u64;
        for shard in self.shard_paths() {
            let meta = std::fs::metadata(&shard).map_err(|_| ModelLoadError::ShardMissing {
                kind: self.kind,
                path: shard.clone(),
            })?;
            actual = actual.saturating_add(meta.len());
        }
        if actual != expected {
            return Err(ModelLoadError::SizeMismatch {
                kind: self.kind,
                expected,
                actual,
            });
        }
        Ok(actual)
    }
}

/// Load and verify the manifest for `kind` in one step.
pub fn verify_artifact(kind: ModelKind, dir: &Path) -> Result<u64, ModelLoadError> {
    ModelManifest::load(kind, dir)?.verify()
}
