use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::metadata::MetadataSnapshot;
use crate::processing::PHash;
use crate::types::MediaFile;

/// One known media file in the organized tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    /// ID in the database
    pub id: Option<i64>,

    /// Full path to the file
    pub path: PathBuf,

    /// File name component of `path`
    pub name: String,

    /// File size in bytes
    pub size: u64,

    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,

    /// Absent when the file could never be decoded
    pub hash: Option<PHash>,

    pub metadata: MetadataSnapshot,

    /// Soft-delete flag; records are never removed
    pub deleted: bool,
}

impl CatalogRecord {
    /// Shape a processed item for storage, using its current location
    pub fn from_media_file(item: &MediaFile) -> Self {
        let path = item.current_path().to_path_buf();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            id: None,
            path,
            name,
            size: item.size,
            created: item.created,
            modified: item.modified,
            hash: item.hash,
            metadata: item.metadata.clone().unwrap_or_default(),
            deleted: false,
        }
    }

    /// Whether the file on disk was written after this record was taken.
    ///
    /// Compared at whole-second precision, the resolution stored.
    pub fn is_stale(&self, modified: Option<DateTime<Utc>>) -> bool {
        to_unix(self.modified) != to_unix(modified)
    }
}

/// Hash shared by more than one active record
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateGroup {
    pub hash: PHash,
    pub records: Vec<CatalogRecord>,
}

/// Record counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    pub active: usize,
    pub deleted: usize,
    pub hashed: usize,
}

pub(crate) fn to_unix(time: Option<DateTime<Utc>>) -> Option<i64> {
    time.map(|t| t.timestamp())
}

pub(crate) fn from_unix(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.and_then(|s| Utc.timestamp_opt(s, 0).single())
}

/// Stored form of a path: its raw bytes, so non-UTF-8 names keep their key
#[cfg(unix)]
pub(crate) fn path_key(path: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().to_vec()
}

#[cfg(not(unix))]
pub(crate) fn path_key(path: &Path) -> Vec<u8> {
    path.to_string_lossy().into_owned().into_bytes()
}

#[cfg(unix)]
pub(crate) fn path_from_key(bytes: Vec<u8>) -> PathBuf {
    use std::os::unix::ffi::OsStringExt;
    PathBuf::from(std::ffi::OsString::from_vec(bytes))
}

#[cfg(not(unix))]
pub(crate) fn path_from_key(bytes: Vec<u8>) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(&bytes).into_owned())
}
