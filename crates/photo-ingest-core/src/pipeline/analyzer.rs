use log::{debug, warn};

use crate::metadata::{extract_metadata, MetadataError};
use crate::types::{ItemError, MediaFile, Stage};

/// Make sure a non-duplicate item carries its metadata.
///
/// Items decoded by the hasher already have it. Otherwise the file is read
/// again; an unsupported container replaces any earlier error so naming
/// falls back to file times without reporting it twice.
pub fn process(item: &mut MediaFile) {
    if item.metadata.is_some() {
        return;
    }

    match extract_metadata(&item.source) {
        Ok(snapshot) => item.metadata = Some(snapshot),
        Err(MetadataError::UnsupportedFormat(msg)) => {
            debug!(
                "No metadata container in {}: {}",
                item.source.display(),
                msg
            );
            item.fail(Stage::Analyzer, ItemError::UnsupportedFormat(msg));
        }
        Err(e) => {
            warn!("Metadata extraction failed for {}: {}", item.source.display(), e);
            if item.error.is_none() {
                item.fail(Stage::Analyzer, ItemError::DecodeFailure(e.to_string()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MetadataSnapshot;
    use crate::test_utils::write_file;
    use tempfile::tempdir;

    #[test]
    fn test_existing_metadata_is_kept() {
        let mut item = MediaFile::new("/nowhere.jpg".into(), 0);
        let snapshot = MetadataSnapshot {
            model: Some("Kept".into()),
            ..Default::default()
        };
        item.metadata = Some(snapshot.clone());

        process(&mut item);

        assert_eq!(item.metadata, Some(snapshot));
        assert!(item.error.is_none());
    }

    #[test]
    fn test_unknown_container_replaces_decode_failure() {
        let dir = tempdir().unwrap();
        let path = write_file(dir.path(), "clip.mov", b"plain bytes, no known container");
        let mut item = MediaFile::from_path(&path).unwrap();
        item.fail(Stage::Hasher, ItemError::DecodeFailure("format".into()));

        process(&mut item);

        assert!(item.metadata.is_none());
        assert!(matches!(
            item.item_error(),
            Some(ItemError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_io_failure_keeps_first_error() {
        let mut item = MediaFile::new("/path/that/does/not/exist.jpg".into(), 0);
        item.fail(Stage::Hasher, ItemError::DecodeFailure("missing".into()));

        process(&mut item);

        assert_eq!(item.error.as_ref().map(|e| e.stage), Some(Stage::Hasher));
    }
}
