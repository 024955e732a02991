//! Bundle parsing and validation

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::QueueError;

/// chrono format of a bundle identifier
pub const BUNDLE_ID_FORMAT: &str = "%Y%m%d%H%M%S";

/// File extension of every audio segment
pub const SEGMENT_EXTENSION: &str = "audio";

/// Optional per-bundle manifest selecting the playback strategy
pub const MANIFEST_FILE: &str = "bundle.yml";

/// Length of a bundle identifier
pub const BUNDLE_ID_LEN: usize = 14;

/// Playback strategy a bundle was rendered for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BundleKind {
    /// Opening, middles gated on attention, closing as farewell
    #[default]
    Conversation,
    /// Gesture-synchronized: raise, attention phrase, hold, lecture phrase, lower
    Attention,
    /// Opening and middles, never a farewell
    Aside,
    /// Opening only
    Quip,
}

impl BundleKind {
    /// Whether the closing segment is worth playing as a farewell
    pub fn has_farewell(self) -> bool {
        matches!(self, Self::Conversation | Self::Attention)
    }

    /// Minimum number of middle segments for the bundle to be valid
    pub fn required_middles(self) -> usize {
        match self {
            Self::Attention => 2,
            _ => 0,
        }
    }
}

impl fmt::Display for BundleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Conversation => "conversation",
            Self::Attention => "attention",
            Self::Aside => "aside",
            Self::Quip => "quip",
        };
        f.write_str(name)
    }
}

/// Position of a segment within its bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentRole {
    Opening,
    /// 1-based index
    Middle(usize),
    Closing,
}

impl SegmentRole {
    /// File name of this segment inside a bundle directory
    pub fn file_name(self) -> String {
        match self {
            Self::Opening => format!("opening.{SEGMENT_EXTENSION}"),
            Self::Middle(i) => format!("middle{i}.{SEGMENT_EXTENSION}"),
            Self::Closing => format!("closing.{SEGMENT_EXTENSION}"),
        }
    }
}

impl fmt::Display for SegmentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Opening => f.write_str("opening"),
            Self::Middle(i) => write!(f, "middle{i}"),
            Self::Closing => f.write_str("closing"),
        }
    }
}

/// Reference to one audio file of a bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub role: SegmentRole,
    pub path: PathBuf,
}

impl Segment {
    fn locate(dir: &Path, role: SegmentRole) -> Option<Self> {
        let path = dir.join(role.file_name());
        path.is_file().then_some(Self { role, path })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Manifest {
    kind: BundleKind,
}

/// A validated bundle of speech segments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    /// Sortable creation timestamp, `YYYYMMDDHHMMSS`
    pub id: String,
    /// Directory currently holding the segments
    pub path: PathBuf,
    pub kind: BundleKind,
    pub created_at: NaiveDateTime,
    pub opening: Segment,
    /// Contiguous from `middle1`; the first gap ends the sequence
    pub middles: Vec<Segment>,
    pub closing: Segment,
}

impl Bundle {
    /// Parse a bundle identifier into its creation time
    pub fn parse_id(id: &str) -> Option<NaiveDateTime> {
        if id.len() != BUNDLE_ID_LEN || !id.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        NaiveDateTime::parse_from_str(id, BUNDLE_ID_FORMAT).ok()
    }

    /// Load and validate the bundle `id` stored in `dir`
    ///
    /// `dir` may be the pending or the checked-out location; the identifier
    /// is passed separately because a checked-out directory name carries the
    /// marker suffix.
    pub fn load(id: &str, dir: &Path) -> Result<Self, QueueError> {
        let created_at = Self::parse_id(id).ok_or_else(|| QueueError::InvalidId(id.to_string()))?;

        let kind = read_kind(id, dir)?;

        let opening = Segment::locate(dir, SegmentRole::Opening).ok_or_else(|| QueueError::MissingSegment {
            id: id.to_string(),
            role: SegmentRole::Opening,
        })?;
        let closing = Segment::locate(dir, SegmentRole::Closing).ok_or_else(|| QueueError::MissingSegment {
            id: id.to_string(),
            role: SegmentRole::Closing,
        })?;

        let middles: Vec<Segment> = (1..)
            .map_while(|i| Segment::locate(dir, SegmentRole::Middle(i)))
            .collect();

        let needed = kind.required_middles();
        if middles.len() < needed {
            return Err(QueueError::TooFewMiddles {
                id: id.to_string(),
                kind,
                needed,
                found: middles.len(),
            });
        }

        debug!(%id, %kind, middles = middles.len(), "Bundle::load: valid");
        Ok(Self {
            id: id.to_string(),
            path: dir.to_path_buf(),
            kind,
            created_at,
            opening,
            middles,
            closing,
        })
    }

    /// Middle segment by 1-based index
    pub fn middle(&self, index: usize) -> Option<&Segment> {
        index.checked_sub(1).and_then(|i| self.middles.get(i))
    }

    /// All segments in playback order
    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        std::iter::once(&self.opening)
            .chain(self.middles.iter())
            .chain(std::iter::once(&self.closing))
    }
}

fn read_kind(id: &str, dir: &Path) -> Result<BundleKind, QueueError> {
    let manifest_path = dir.join(MANIFEST_FILE);
    if !manifest_path.is_file() {
        return Ok(BundleKind::default());
    }

    let content = fs::read_to_string(&manifest_path).map_err(QueueError::io("read", &manifest_path))?;
    if content.trim().is_empty() {
        return Ok(BundleKind::default());
    }

    let manifest: Manifest = serde_yaml::from_str(&content).map_err(|source| QueueError::Manifest {
        id: id.to_string(),
        source,
    })?;
    Ok(manifest.kind)
}
