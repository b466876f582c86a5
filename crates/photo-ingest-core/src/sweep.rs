//! Recycle the extra copies among catalogued files that share a hash.
//!
//! Within each exact-hash group the file whose full path sorts first is kept;
//! every other copy is moved to the recycle root and its record soft-deleted.

use log::{info, warn};
use serde::Serialize;
use std::path::Path;

use crate::error::Result;
use crate::logging::log_file_error;
use crate::persistence::{Catalog, DuplicateGroup};
use crate::pipeline::mover::Mover;
use crate::types::MediaFile;

/// Counts of what a duplicate sweep did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    pub groups: usize,
    pub kept: usize,
    pub recycled: usize,
    pub failed: usize,
}

pub fn recycle_duplicates(
    catalog: &Catalog,
    recycle_root: &Path,
    mover: &Mover,
) -> Result<SweepSummary> {
    let groups = catalog.duplicate_groups()?;
    let mut summary = SweepSummary {
        groups: groups.len(),
        ..Default::default()
    };

    for DuplicateGroup { hash, mut records } in groups {
        records.sort_by(|a, b| a.path.cmp(&b.path));
        let mut records = records.into_iter();
        let Some(keeper) = records.next() else { continue };
        summary.kept += 1;
        warn!("Duplicate group {}: keeping {}", hash, keeper.path.display());

        for record in records {
            let mut item = match MediaFile::from_path(&record.path) {
                Ok(item) => item,
                Err(e) => {
                    log_file_error(&record.path, "open", &e);
                    summary.failed += 1;
                    continue;
                }
            };

            let name = item.file_name();
            if mover.move_item(&mut item, recycle_root, &name).is_err() {
                summary.failed += 1;
                continue;
            }
            if let Some(id) = record.id {
                catalog.mark_deleted(id)?;
            }
            summary.recycled += 1;
        }
    }

    info!(
        "Duplicate sweep: {} groups, {} recycled, {} failed",
        summary.groups, summary.recycled, summary.failed
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::CancellationToken;
    use crate::reconcile::Reconciler;
    use crate::test_utils::{png_bytes, write_file};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_first_path_is_kept() {
        let dir = tempdir().unwrap();
        let library = dir.path().join("library");
        let recycle = dir.path().join("recycle");
        fs::create_dir(&recycle).unwrap();
        let kept = write_file(&library, "2020/01/a.png", &png_bytes(6));
        let copy = write_file(&library, "2021/02/b.png", &png_bytes(6));
        write_file(&library, "2021/02/other.png", &png_bytes(7));
        let catalog = Catalog::open_in_memory().unwrap();
        Reconciler::new(1, false, CancellationToken::new())
            .reconcile(&catalog, &library)
            .unwrap();

        let summary = recycle_duplicates(&catalog, &recycle, &Mover::new(9)).unwrap();

        assert_eq!(
            summary,
            SweepSummary {
                groups: 1,
                kept: 1,
                recycled: 1,
                failed: 0
            }
        );
        assert!(kept.exists());
        assert!(!copy.exists());
        assert!(recycle.join("b.png").exists());
        assert!(catalog.find_by_path(&copy).unwrap().is_none());
        assert!(catalog.duplicate_groups().unwrap().is_empty());
    }

    #[test]
    fn test_missing_copy_is_counted_and_kept_in_catalog() {
        let dir = tempdir().unwrap();
        let library = dir.path().join("library");
        let recycle = dir.path().join("recycle");
        fs::create_dir(&recycle).unwrap();
        write_file(&library, "a.png", &png_bytes(6));
        let copy = write_file(&library, "b.png", &png_bytes(6));
        let catalog = Catalog::open_in_memory().unwrap();
        Reconciler::new(1, false, CancellationToken::new())
            .reconcile(&catalog, &library)
            .unwrap();
        fs::remove_file(&copy).unwrap();

        let summary = recycle_duplicates(&catalog, &recycle, &Mover::new(9)).unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.recycled, 0);
        assert!(catalog.find_by_path(&copy).unwrap().is_some());
    }
}
