//! Per-file documents for an external search index, and a check for files
//! whose capture time and last-write time disagree.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use log::info;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::discovery::discover_media;
use crate::error::Result;
use crate::metadata::{extract_metadata, MetadataSnapshot};
use crate::processing::naming::metadata_timestamp;
use crate::types::to_utc;

/// Default allowed gap between capture time and last write
pub const MISMATCH_TOLERANCE_HOURS: i64 = 4;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileSystemProperties {
    pub last_write_utc: Option<DateTime<Utc>>,
    pub creation_utc: Option<DateTime<Utc>>,
    pub last_access_utc: Option<DateTime<Utc>>,
    pub length: u64,
}

/// Metadata snapshot plus filesystem properties, keyed by full path
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexDocument {
    pub id: PathBuf,
    pub metadata: Option<MetadataSnapshot>,
    /// Why `metadata` is missing, when it is
    pub metadata_error: Option<String>,
    pub file: FileSystemProperties,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimestampMismatch {
    pub path: PathBuf,
    pub captured: NaiveDateTime,
    pub last_write: DateTime<Utc>,
}

/// Build the index document for one file
pub fn describe(path: &Path) -> Result<IndexDocument> {
    let fs_meta = fs::metadata(path)?;
    let file = FileSystemProperties {
        last_write_utc: fs_meta.modified().ok().map(to_utc),
        creation_utc: fs_meta.created().ok().map(to_utc),
        last_access_utc: fs_meta.accessed().ok().map(to_utc),
        length: fs_meta.len(),
    };

    let (metadata, metadata_error) = match extract_metadata(path) {
        Ok(snapshot) => (Some(snapshot), None),
        Err(e) => (None, Some(e.to_string())),
    };

    Ok(IndexDocument {
        id: path.to_path_buf(),
        metadata,
        metadata_error,
        file,
    })
}

/// Capture time and last-write time further apart than `tolerance`.
///
/// The capture time carries no zone and is compared as if it were UTC.
pub fn timestamp_mismatch(doc: &IndexDocument, tolerance: Duration) -> Option<TimestampMismatch> {
    let captured = metadata_timestamp(doc.metadata.as_ref()?)?;
    let last_write = doc.file.last_write_utc?;

    let gap = last_write.naive_utc() - captured;
    if gap.abs() > tolerance {
        Some(TimestampMismatch {
            path: doc.id.clone(),
            captured,
            last_write,
        })
    } else {
        None
    }
}

/// Describe every media file under `root`, flagging timestamp mismatches
pub fn inspect_tree(
    root: &Path,
    tolerance: Duration,
) -> Result<Vec<(IndexDocument, Option<TimestampMismatch>)>> {
    let mut results = Vec::new();
    for path in discover_media(root)? {
        let doc = describe(&path)?;
        let mismatch = timestamp_mismatch(&doc, tolerance);
        if let Some(m) = &mismatch {
            info!(
                "{}: last write {} / captured {}",
                m.path.display(),
                m.last_write,
                m.captured
            );
        }
        results.push((doc, mismatch));
    }
    Ok(results)
}
