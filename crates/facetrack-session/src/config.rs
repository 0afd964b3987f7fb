use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Application configuration.
///
/// Resolved in three layers: built-in defaults, then an optional TOML file,
/// then `FACETRACK_*` environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory containing the four model weight manifests and shards.
    pub model_dir: PathBuf,
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// SQLite database holding the gallery metadata.
    pub store_path: PathBuf,
    /// Frame sampling period, matching the detection cadence.
    pub detect_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = data_home().join("facetrack");
        Self {
            model_dir: facetrack_core::default_model_dir(),
            camera_device: "/dev/video0".to_string(),
            store_path: data_dir.join("gallery.db"),
            detect_interval_ms: crate::DEFAULT_DETECT_INTERVAL.as_millis() as u64,
        }
    }
}

impl Config {
    /// Defaults, overlaid by `file` when given, then by the environment.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Override fields from `FACETRACK_*` environment variables.
    /// Unparsable values are ignored.
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("FACETRACK_MODEL_DIR") {
            self.model_dir = PathBuf::from(v);
        }
        if let Some(v) = var("FACETRACK_CAMERA_DEVICE") {
            self.camera_device = v;
        }
        if let Some(v) = var("FACETRACK_STORE_PATH") {
            self.store_path = PathBuf::from(v);
        }
        self.detect_interval_ms = parsed(
            &var,
            "FACETRACK_DETECT_INTERVAL_MS",
            self.detect_interval_ms,
        );
    }

    /// Sampling period; zero is raised to one millisecond.
    pub fn detect_interval(&self) -> Duration {
        Duration::from_millis(self.detect_interval_ms.max(1))
    }
}

fn parsed<T: std::str::FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    var(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

fn data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home().join(".local/share"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.detect_interval(), Duration::from_millis(100));
        assert_eq!(config.camera_device, "/dev/video0");
        assert!(config.store_path.ends_with("facetrack/gallery.db"));
    }

    #[test]
    fn test_toml_overrides_only_given_fields() {
        let config = Config::from_toml(
            r#"
            camera_device = "/dev/video4"
            detect_interval_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(config.camera_device, "/dev/video4");
        assert_eq!(config.detect_interval(), Duration::from_millis(250));
        assert_eq!(config.store_path, Config::default().store_path);
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = Config::from_toml("detect_interval_ms = 250").unwrap();
        let vars: HashMap<&str, &str> = [
            ("FACETRACK_DETECT_INTERVAL_MS", "50"),
            ("FACETRACK_MODEL_DIR", "/opt/models"),
        ]
        .into_iter()
        .collect();
        config.apply_vars(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.detect_interval_ms, 50);
        assert_eq!(config.model_dir, PathBuf::from("/opt/models"));
    }

    #[test]
    fn test_unparsable_env_value_is_ignored() {
        let mut config = Config::default();
        config.apply_vars(|k| (k == "FACETRACK_DETECT_INTERVAL_MS").then(|| "fast".to_string()));
        assert_eq!(config.detect_interval_ms, 100);
    }

    #[test]
    fn test_zero_interval_is_raised() {
        let config = Config {
            detect_interval_ms: 0,
            ..Config::default()
        };
        assert_eq!(config.detect_interval(), Duration::from_millis(1));
    }

    #[test]
    fn test_load_reports_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            Config::from_file(&missing),
            Err(ConfigError::Read { .. })
        ));

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "detect_interval_ms = \"fast\"").unwrap();
        assert!(matches!(
            Config::from_file(&bad),
            Err(ConfigError::Parse { .. })
        ));
    }
}
