//! Bring the catalog in line with the organized tree before a run.
//!
//! Full outer join by path between the files under the target root and the
//! active catalog records:
//!
//! - record without file: soft-deleted
//! - file without record: hashed and inserted
//! - both, modification time differs: re-hashed and updated
//! - both, unchanged: left alone
//!
//! New files that cannot be read or decoded are skipped and stay unindexed.
//! A catalogued file that no longer decodes keeps its record, refreshed with
//! no hash, so it stops matching imports of its old content.

use log::{info, warn};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::discovery::discover_media;
use crate::error::{Error, Result};
use crate::logging::log_file_error;
use crate::persistence::{Catalog, CatalogRecord};
use crate::pipeline::{analyzer, hasher, CancellationToken};
use crate::processing::ProgressTracker;
use crate::types::{to_utc, MediaFile};

/// Counts of what reconciliation did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub inserted: usize,
    pub updated: usize,
    pub removed: usize,
    pub unchanged: usize,
    pub skipped: usize,
}

impl ReconcileSummary {
    /// Number of catalog writes performed
    pub fn mutations(&self) -> usize {
        self.inserted + self.updated + self.removed
    }
}

enum Work {
    Insert(PathBuf),
    Update(CatalogRecord),
}

impl Work {
    fn path(&self) -> &Path {
        match self {
            Work::Insert(path) => path,
            Work::Update(record) => &record.path,
        }
    }
}

/// Options for one reconciliation pass
#[derive(Debug, Clone)]
pub struct Reconciler {
    threads: usize,
    show_progress: bool,
    cancel: CancellationToken,
}

impl Reconciler {
    pub fn new(threads: usize, show_progress: bool, cancel: CancellationToken) -> Self {
        Self {
            threads: threads.max(1),
            show_progress,
            cancel,
        }
    }

    /// Reconcile `catalog` against the files under `target_root`.
    ///
    /// Hashing runs in parallel; all catalog writes happen afterwards on the
    /// calling thread. Enumeration and catalog failures abort the pass.
    pub fn reconcile(&self, catalog: &Catalog, target_root: &Path) -> Result<ReconcileSummary> {
        let files = discover_media(target_root)?;
        let mut records: HashMap<PathBuf, CatalogRecord> = catalog
            .active_records()?
            .into_iter()
            .map(|record| (record.path.clone(), record))
            .collect();

        let mut summary = ReconcileSummary::default();
        let mut work = Vec::new();

        for path in files {
            let modified = match fs::metadata(&path).and_then(|m| m.modified()) {
                Ok(time) => Some(to_utc(time)),
                Err(e) => {
                    log_file_error(&path, "stat", &e);
                    // Keep an existing record rather than deleting it
                    records.remove(&path);
                    summary.skipped += 1;
                    continue;
                }
            };

            match records.remove(&path) {
                Some(record) if !record.is_stale(modified) => summary.unchanged += 1,
                Some(record) => work.push(Work::Update(record)),
                None => work.push(Work::Insert(path)),
            }
        }

        // Whatever is left has no file behind it
        let vanished: Vec<CatalogRecord> = records.into_values().collect();

        let progress = ProgressTracker::new(work.len(), "Reconcile", self.show_progress);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .build()
            .map_err(|e| Error::Unknown(format!("Failed to build hashing pool: {}", e)))?;

        let described: Vec<(Work, Option<CatalogRecord>)> = pool.install(|| {
            work.into_par_iter()
                .map(|job| {
                    if self.cancel.is_cancelled() {
                        return (job, None);
                    }
                    let fresh = describe(job.path());
                    progress.advance();
                    (job, fresh)
                })
                .collect()
        });
        progress.finish("reconciled");

        if self.cancel.is_cancelled() {
            return Err(Error::Interrupted);
        }

        for record in vanished {
            if let Some(id) = record.id {
                catalog.mark_deleted(id)?;
                info!("Catalog: marked deleted {}", record.path.display());
                summary.removed += 1;
            }
        }

        for (job, fresh) in described {
            let Some(mut fresh) = fresh else {
                summary.skipped += 1;
                continue;
            };
            match job {
                Work::Insert(path) if fresh.hash.is_none() => {
                    warn!("Left unindexed: {}", path.display());
                    summary.skipped += 1;
                }
                Work::Insert(_) => {
                    catalog.insert(&fresh)?;
                    info!("Catalog: indexed {}", fresh.path.display());
                    summary.inserted += 1;
                }
                Work::Update(existing) => {
                    if fresh.hash.is_none() {
                        warn!("No longer decodable, hash cleared: {}", fresh.path.display());
                    }
                    fresh.id = existing.id;
                    catalog.update(&fresh)?;
                    info!("Catalog: refreshed {}", fresh.path.display());
                    summary.updated += 1;
                }
            }
        }

        info!(
            "Reconciled {}: {} inserted, {} updated, {} removed, {} unchanged, {} skipped",
            target_root.display(),
            summary.inserted,
            summary.updated,
            summary.removed,
            summary.unchanged,
            summary.skipped
        );
        Ok(summary)
    }
}

/// Hash and read metadata for a file already in the organized tree.
///
/// `None` only when the file cannot be opened; an undecodable file comes back
/// without a hash.
fn describe(path: &Path) -> Option<CatalogRecord> {
    let mut item = match MediaFile::from_path(path) {
        Ok(item) => item,
        Err(e) => {
            log_file_error(path, "open", &e);
            return None;
        }
    };

    hasher::process(&mut item);
    if item.hash.is_some() {
        analyzer::process(&mut item);
    }

    Some(CatalogRecord::from_media_file(&item))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::PHash;
    use crate::test_utils::{png_bytes, set_mtime, write_file};
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    fn reconciler() -> Reconciler {
        Reconciler::new(2, false, CancellationToken::new())
    }

    #[test]
    fn test_new_files_are_indexed() {
        let dir = tempdir().unwrap();
        let a = write_file(dir.path(), "2020/01/a.png", &png_bytes(1));
        write_file(dir.path(), "2020/01/notes.txt", b"ignored");
        let catalog = Catalog::open_in_memory().unwrap();

        let summary = reconciler().reconcile(&catalog, dir.path()).unwrap();

        assert_eq!(summary.inserted, 1);
        let record = catalog.find_by_path(&a).unwrap().unwrap();
        assert!(record.hash.is_some());
    }

    #[test]
    fn test_undecodable_file_is_skipped() {
        let dir = tempdir().unwrap();
        write_file(dir.path(), "clip.mov", b"not decodable");
        let catalog = Catalog::open_in_memory().unwrap();

        let summary = reconciler().reconcile(&catalog, dir.path()).unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.mutations(), 0);
        assert_eq!(catalog.stats().unwrap().active, 0);
    }

    #[test]
    fn test_changed_file_is_refreshed() {
        let dir = tempdir().unwrap();
        let a = write_file(dir.path(), "a.png", &png_bytes(1));
        let catalog = Catalog::open_in_memory().unwrap();
        reconciler().reconcile(&catalog, dir.path()).unwrap();
        let before = catalog.find_by_path(&a).unwrap().unwrap();

        let mut stale = before.clone();
        stale.modified = stale.modified.map(|t| t - chrono::Duration::hours(1));
        stale.hash = Some(PHash(0));
        catalog.update(&stale).unwrap();

        let summary = reconciler().reconcile(&catalog, dir.path()).unwrap();

        assert_eq!(summary.updated, 1);
        let after = catalog.find_by_path(&a).unwrap().unwrap();
        assert_eq!(after.id, before.id);
        assert_eq!(after.hash, before.hash);
        assert_eq!(after.modified, before.modified);
    }

    #[test]
    fn test_file_that_stops_decoding_loses_its_hash() {
        let dir = tempdir().unwrap();
        let a = write_file(dir.path(), "a.png", &png_bytes(1));
        set_mtime(&a, Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap());
        let catalog = Catalog::open_in_memory().unwrap();
        reconciler().reconcile(&catalog, dir.path()).unwrap();
        let old_hash = catalog.find_by_path(&a).unwrap().unwrap().hash.unwrap();

        fs::write(&a, b"no longer a picture").unwrap();
        set_mtime(&a, Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap());
        let summary = reconciler().reconcile(&catalog, dir.path()).unwrap();

        assert_eq!(summary.updated, 1);
        assert_eq!(summary.skipped, 0);
        let record = catalog.find_by_path(&a).unwrap().unwrap();
        assert!(record.hash.is_none());
        assert_eq!(record.size, 19);
        assert!(catalog.find_by_hash(old_hash).unwrap().is_none());

        let again = reconciler().reconcile(&catalog, dir.path()).unwrap();
        assert_eq!(again.mutations(), 0);
        assert_eq!(again.unchanged, 1);
    }

    #[test]
    fn test_cancelled_pass_writes_nothing() {
        let dir = tempdir().unwrap();
        write_file(dir.path(), "a.png", &png_bytes(1));
        let catalog = Catalog::open_in_memory().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = Reconciler::new(1, false, cancel).reconcile(&catalog, dir.path());

        assert!(matches!(result, Err(Error::Interrupted)));
        assert_eq!(catalog.stats().unwrap().active, 0);
    }
}
