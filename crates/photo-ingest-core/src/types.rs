use chrono::{DateTime, Utc};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::metadata::MetadataSnapshot;
use crate::processing::PHash;

/// Roots shared read-only by every stage of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessContext {
    pub source_root: PathBuf,
    pub target_root: PathBuf,
    pub recycle_root: PathBuf,
}

impl ProcessContext {
    pub fn new(
        source_root: impl Into<PathBuf>,
        target_root: impl Into<PathBuf>,
        recycle_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source_root: source_root.into(),
            target_root: target_root.into(),
            recycle_root: recycle_root.into(),
        }
    }
}

/// Pipeline stage that recorded a per-item failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Hasher,
    Analyzer,
    Suggestion,
    Mover,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Hasher => "hasher",
            Stage::Analyzer => "analyzer",
            Stage::Suggestion => "suggestion",
            Stage::Mover => "mover",
        };
        f.write_str(name)
    }
}

/// Recoverable or terminal failure carried alongside an item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemError {
    /// The file could not be opened or decoded into pixels
    DecodeFailure(String),

    /// Metadata extraction does not understand the container
    UnsupportedFormat(String),

    /// No candidate timestamp survived parsing
    NoTimestamp,

    /// Every numeric suffix up to the probe limit was taken
    MoveCollisionExhausted { attempts: u32 },

    /// The filesystem refused the move itself
    MoveFailed(String),
}

impl ItemError {
    /// Whether the item must stop where it is
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ItemError::NoTimestamp
                | ItemError::MoveCollisionExhausted { .. }
                | ItemError::MoveFailed(_)
        )
    }
}

impl fmt::Display for ItemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemError::DecodeFailure(msg) => write!(f, "decode failure: {}", msg),
            ItemError::UnsupportedFormat(msg) => write!(f, "unsupported format: {}", msg),
            ItemError::NoTimestamp => write!(f, "no usable timestamp"),
            ItemError::MoveCollisionExhausted { attempts } => {
                write!(f, "no free file name after {} attempts", attempts)
            }
            ItemError::MoveFailed(msg) => write!(f, "move failed: {}", msg),
        }
    }
}

/// An [`ItemError`] tagged with the stage that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageError {
    pub stage: Stage,
    pub error: ItemError,
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.stage, self.error)
    }
}

/// Target location derived by the naming rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub directory: PathBuf,
    pub file_name: String,
}

impl Suggestion {
    pub fn full_path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }
}

/// One file flowing through the pipeline
#[derive(Debug)]
pub struct MediaFile {
    /// Current location of the file
    pub source: PathBuf,

    /// File size in bytes
    pub size: u64,

    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,

    /// Decoded pixels, held only while the hash is computed
    image: Option<DynamicImage>,

    pub hash: Option<PHash>,
    pub metadata: Option<MetadataSnapshot>,
    pub error: Option<StageError>,
    pub suggestion: Option<Suggestion>,

    /// Final location after a successful move
    pub moved_to: Option<PathBuf>,
}

impl MediaFile {
    /// Build an item from the filesystem properties of `path`
    pub fn from_path(path: &Path) -> io::Result<Self> {
        let metadata = fs::metadata(path)?;
        let mut item = Self::new(path.to_path_buf(), metadata.len());
        item.refresh_times(&metadata);
        Ok(item)
    }

    pub fn new(source: PathBuf, size: u64) -> Self {
        Self {
            source,
            size,
            created: None,
            modified: None,
            image: None,
            hash: None,
            metadata: None,
            error: None,
            suggestion: None,
            moved_to: None,
        }
    }

    /// Take size and timestamps from `metadata`
    pub fn refresh_times(&mut self, metadata: &fs::Metadata) {
        self.size = metadata.len();
        self.created = metadata.created().ok().map(to_utc);
        self.modified = metadata.modified().ok().map(to_utc);
    }

    pub fn attach_image(&mut self, image: DynamicImage) {
        self.image = Some(image);
    }

    pub fn image(&self) -> Option<&DynamicImage> {
        self.image.as_ref()
    }

    /// Drop the decoded pixels; safe to call repeatedly
    pub fn release_image(&mut self) {
        self.image = None;
    }

    pub fn fail(&mut self, stage: Stage, error: ItemError) {
        self.error = Some(StageError { stage, error });
    }

    pub fn item_error(&self) -> Option<&ItemError> {
        self.error.as_ref().map(|e| &e.error)
    }

    /// Extension including the leading dot, original case preserved
    pub fn extension(&self) -> String {
        self.source
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default()
    }

    pub fn file_name(&self) -> String {
        self.source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Location of the file right now: the move target once moved
    pub fn current_path(&self) -> &Path {
        self.moved_to.as_deref().unwrap_or(&self.source)
    }
}

/// Convert a filesystem timestamp to UTC
pub fn to_utc(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}

/// Counters for one completed run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub scanned: usize,
    pub hashed: usize,
    pub decode_failures: usize,
    pub duplicates: usize,
    pub analyzed: usize,
    pub generic_named: usize,
    pub no_timestamp: usize,
    pub moved: usize,
    pub recycled: usize,
    pub move_failures: usize,
    pub registered: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_keeps_case_and_dot() {
        let item = MediaFile::new(PathBuf::from("/in/IMG_0001.JPG"), 0);
        assert_eq!(item.extension(), ".JPG");
        assert_eq!(item.file_name(), "IMG_0001.JPG");
    }

    #[test]
    fn test_extensionless_file() {
        let item = MediaFile::new(PathBuf::from("/in/README"), 0);
        assert_eq!(item.extension(), "");
    }

    #[test]
    fn test_release_image_is_idempotent() {
        let mut item = MediaFile::new(PathBuf::from("a.png"), 0);
        item.attach_image(DynamicImage::new_rgb8(2, 2));
        assert!(item.image().is_some());
        item.release_image();
        item.release_image();
        assert!(item.image().is_none());
    }

    #[test]
    fn test_terminal_errors() {
        assert!(ItemError::NoTimestamp.is_terminal());
        assert!(ItemError::MoveCollisionExhausted { attempts: 3 }.is_terminal());
        assert!(!ItemError::DecodeFailure("x".into()).is_terminal());
        assert!(!ItemError::UnsupportedFormat("x".into()).is_terminal());
    }
}
