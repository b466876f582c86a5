//! Naming rules: where a file belongs in the organized tree and what it is called.
//!
//! Everything here is a pure function of the item's metadata and file times.
//! Layout is `{root}/{yyyy}/{MM}/{yyyy-MM-dd HHmmss}-{camera}{.ext}`.

use chrono::{DateTime, Datelike, NaiveDateTime, Utc};
use std::path::{Path, PathBuf};

use crate::metadata::MetadataSnapshot;
use crate::types::{ItemError, MediaFile, Suggestion};

/// Layout of every EXIF date tag
pub const EXIF_DATE_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Cameras without a clock write this instead of leaving the tag out
pub const ZERO_DATE: &str = "0000:00:00 00:00:00";

/// Camera label used when no model is known
pub const GENERIC_LABEL: &str = "GENERIC";

const FILE_NAME_DATE_FORMAT: &str = "%Y-%m-%d %H%M%S";

/// What the suggested name was derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamingBasis {
    /// Capture metadata (possibly ending at the last-write fallback)
    Metadata,
    /// File creation/modification times with the generic label
    FileTimes,
}

/// Candidate timestamp strings in priority order
pub fn timestamp_candidates(
    metadata: Option<&MetadataSnapshot>,
    modified: Option<DateTime<Utc>>,
) -> Vec<String> {
    let mut candidates = Vec::new();

    if let Some(meta) = metadata {
        candidates.extend(meta.date_time_original.clone());
        candidates.extend(meta.date_time_digitized.clone());
        candidates.extend(meta.date_time.clone());

        if let (Some(date), Some(time)) = (&meta.gps_date_stamp, &meta.gps_time_stamp) {
            if !date.is_empty() && !time.is_empty() {
                let time = time.get(..8).unwrap_or(time);
                candidates.push(format!("{} {}", date, time));
            }
        }
    }

    if let Some(modified) = modified {
        candidates.push(modified.format(EXIF_DATE_FORMAT).to_string());
    }

    candidates
}

/// First candidate that is non-empty, not the zero date, and parses
pub fn resolve_timestamp(candidates: &[String]) -> Option<NaiveDateTime> {
    candidates
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty() && *c != ZERO_DATE)
        .find_map(|c| NaiveDateTime::parse_from_str(c, EXIF_DATE_FORMAT).ok())
}

/// Capture time from the metadata alone, ignoring file times
pub fn metadata_timestamp(metadata: &MetadataSnapshot) -> Option<NaiveDateTime> {
    resolve_timestamp(&timestamp_candidates(Some(metadata), None))
}

/// `make-model`, with `GENERIC` standing in for a missing model
pub fn camera_label(metadata: Option<&MetadataSnapshot>) -> String {
    let clean = |value: &Option<String>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(sanitize_component)
    };

    let make = metadata.and_then(|m| clean(&m.make));
    let model = metadata
        .and_then(|m| clean(&m.model))
        .unwrap_or_else(|| GENERIC_LABEL.to_string());

    match make {
        Some(make) => format!("{}-{}", make, model),
        None => model,
    }
}

/// Replace characters that cannot appear in a file name
fn sanitize_component(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

pub fn target_directory(root: &Path, timestamp: &NaiveDateTime) -> PathBuf {
    root.join(format!("{:04}", timestamp.year()))
        .join(format!("{:02}", timestamp.month()))
}

pub fn target_file_name(timestamp: &NaiveDateTime, label: &str, extension: &str) -> String {
    format!(
        "{}-{}{}",
        timestamp.format(FILE_NAME_DATE_FORMAT),
        label,
        extension
    )
}

/// Earlier of creation and last-write time
pub fn earliest_file_time(item: &MediaFile) -> Option<DateTime<Utc>> {
    match (item.created, item.modified) {
        (Some(created), Some(modified)) => Some(created.min(modified)),
        (created, modified) => created.or(modified),
    }
}

/// Derive the target directory and file name for an item
pub fn suggest(
    item: &MediaFile,
    target_root: &Path,
) -> Result<(Suggestion, NamingBasis), ItemError> {
    let extension = item.extension();

    let (timestamp, label, basis) = match (&item.metadata, item.item_error()) {
        (Some(metadata), _) => {
            let candidates = timestamp_candidates(Some(metadata), item.modified);
            let timestamp = resolve_timestamp(&candidates).ok_or(ItemError::NoTimestamp)?;
            (timestamp, camera_label(Some(metadata)), NamingBasis::Metadata)
        }
        (None, Some(_)) => {
            let timestamp = earliest_file_time(item)
                .map(|t| t.naive_utc())
                .ok_or(ItemError::NoTimestamp)?;
            (timestamp, GENERIC_LABEL.to_string(), NamingBasis::FileTimes)
        }
        (None, None) => {
            let candidates = timestamp_candidates(None, item.modified);
            let timestamp = resolve_timestamp(&candidates).ok_or(ItemError::NoTimestamp)?;
            (timestamp, camera_label(None), NamingBasis::FileTimes)
        }
    };

    let suggestion = Suggestion {
        directory: target_directory(target_root, &timestamp),
        file_name: target_file_name(&timestamp, &label, &extension),
    };

    Ok((suggestion, basis))
}
