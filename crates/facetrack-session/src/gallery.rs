//! Clip records and the insertion-ordered gallery.

use bytes::Bytes;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Prefix of every generated clip name.
pub const DISPLAY_NAME_PREFIX: &str = "Face-Track-Recording";

/// Unique, monotonically increasing clip token (milliseconds since epoch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClipId(pub u64);

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ClipId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(ClipId)
    }
}

/// Hands out ids that never repeat, even for recordings finished within the
/// same millisecond.
#[derive(Debug, Default)]
pub struct ClipIdGenerator {
    last: u64,
}

impl ClipIdGenerator {
    /// Start above every id already in use.
    pub fn after(existing: Option<ClipId>) -> Self {
        Self {
            last: existing.map(|id| id.0).unwrap_or(0),
        }
    }

    /// `None` once the id space is used up.
    pub fn next(&mut self, now_ms: u64) -> Option<ClipId> {
        let id = now_ms.max(self.last.checked_add(1)?);
        self.last = id;
        Some(ClipId(id))
    }
}

/// Session-local media payload of a clip. Not persisted.
#[derive(Debug, Clone)]
pub struct ClipMedia {
    pub blob: Bytes,
    /// Container mime type, e.g. `video/webm`.
    pub mime_type: String,
    /// Ephemeral playback reference, valid for this session only.
    pub url: String,
}

impl ClipMedia {
    pub fn new(blob: Bytes, mime_type: impl Into<String>) -> Self {
        Self {
            blob,
            mime_type: mime_type.into(),
            url: format!("blob:facetrack/{}", uuid::Uuid::new_v4()),
        }
    }

    pub fn len(&self) -> usize {
        self.blob.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blob.is_empty()
    }
}

/// One finished recording.
#[derive(Debug, Clone)]
pub struct ClipRecord {
    pub id: ClipId,
    pub created_at: DateTime<Utc>,
    pub display_name: String,
    /// `None` for entries hydrated from storage after a restart.
    pub media: Option<ClipMedia>,
}

impl ClipRecord {
    pub fn is_playable(&self) -> bool {
        self.media.is_some()
    }

    pub fn url(&self) -> Option<&str> {
        self.media.as_ref().map(|m| m.url.as_str())
    }

    pub fn metadata(&self) -> ClipMetadata {
        ClipMetadata {
            id: self.id,
            created_at: self.created_at,
            display_name: self.display_name.clone(),
        }
    }

    /// Save-as file name: `<display name>.<extension>`.
    pub fn file_name(&self, extension: &str) -> String {
        let stem: String = self
            .display_name
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '\0' => '-',
                c => c,
            })
            .collect();
        format!("{stem}.{extension}")
    }
}

impl From<ClipMetadata> for ClipRecord {
    fn from(meta: ClipMetadata) -> Self {
        Self {
            id: meta.id,
            created_at: meta.created_at,
            display_name: meta.display_name,
            media: None,
        }
    }
}

/// Persisted projection of a clip: identity and naming only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipMetadata {
    pub id: ClipId,
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "name")]
    pub display_name: String,
}

/// Clips in recording-completion order.
#[derive(Debug, Clone, Default)]
pub struct ClipGallery {
    clips: Vec<ClipRecord>,
}

impl ClipGallery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a persisted projection. Entries carry no media.
    pub fn from_projection(entries: Vec<ClipMetadata>) -> Self {
        Self {
            clips: entries.into_iter().map(ClipRecord::from).collect(),
        }
    }

    pub fn append(&mut self, clip: ClipRecord) {
        self.clips.push(clip);
    }

    /// Remove the clip with `id`, if present.
    pub fn remove(&mut self, id: ClipId) -> Option<ClipRecord> {
        let idx = self.clips.iter().position(|c| c.id == id)?;
        Some(self.clips.remove(idx))
    }

    pub fn get(&self, id: ClipId) -> Option<&ClipRecord> {
        self.clips.iter().find(|c| c.id == id)
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClipRecord> {
        self.clips.iter()
    }

    pub fn clips(&self) -> &[ClipRecord] {
        &self.clips
    }

    pub fn max_id(&self) -> Option<ClipId> {
        self.clips.iter().map(|c| c.id).max()
    }

    pub fn projection(&self) -> Vec<ClipMetadata> {
        self.clips.iter().map(ClipRecord::metadata).collect()
    }
}

/// `Face-Track-Recording-<YYYY-MM-DD>-<HH-MM-SS>` in local time.
pub fn display_name_at(at: DateTime<Local>) -> String {
    format!(
        "{DISPLAY_NAME_PREFIX}-{}-{}",
        at.format("%Y-%m-%d"),
        at.format("%H-%M-%S")
    )
}

/// Current time truncated to whole milliseconds, matching the id resolution.
pub fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}
