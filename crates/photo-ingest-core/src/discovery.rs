use log::{debug, info};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::types::MediaFile;

/// Extensions picked up by the scanner, compared case-insensitively
pub const MEDIA_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "thm", "orf", "psd", "arw", "cr2", "mov", "mp4",
];

/// Returns if the given path has a media extension
pub fn is_media_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            MEDIA_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// List every media file below `root`.
///
/// Any error while walking the tree aborts the listing: a partial listing
/// would leave the catalog silently incomplete.
pub fn discover_media<P: AsRef<Path>>(root: P) -> Result<Vec<PathBuf>> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(Error::FileNotFound(root.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if entry.file_type().is_file() && is_media_path(entry.path()) {
            files.push(entry.into_path());
        }
    }

    debug!("Found {} media files under {}", files.len(), root.display());
    Ok(files)
}

/// Enumerate `root` and build one work item per media file
pub fn scan<P: AsRef<Path>>(root: P) -> Result<Vec<MediaFile>> {
    let root = root.as_ref();
    let items = discover_media(root)?
        .iter()
        .map(|path| MediaFile::from_path(path).map_err(Error::from))
        .collect::<Result<Vec<_>>>()?;

    info!("Scanned {}: {} media files", root.display(), items.len());
    Ok(items)
}

// -- Tests --
