#![allow(dead_code)]

#[path = "../../src/test_utils/fixtures.rs"]
mod fixtures;

pub use fixtures::*;

use photo_ingest_core::persistence::Catalog;
use photo_ingest_core::{Config, PhotoIngester};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use walkdir::WalkDir;

/// Source, target and recycle roots inside one scratch directory
pub struct Library {
    pub dir: TempDir,
    pub config: Config,
}

impl Library {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        for name in ["import", "library", "recycle"] {
            fs::create_dir(dir.path().join(name)).unwrap();
        }

        let mut config = Config::new(
            dir.path().join("import"),
            dir.path().join("library"),
            dir.path().join("recycle"),
        );
        config.hasher_threads = 2;
        config.analyzer_threads = 2;
        config.queue_capacity = 4;
        config.registration_batch_size = 2;
        config.show_progress = false;

        Self { dir, config }
    }

    pub fn source(&self) -> &Path {
        &self.config.source_dir
    }

    pub fn target(&self) -> &Path {
        &self.config.target_dir
    }

    pub fn recycle(&self) -> &Path {
        &self.config.recycle_dir
    }

    pub fn ingester(&self) -> PhotoIngester {
        PhotoIngester::new(self.config.clone())
    }

    pub fn catalog(&self) -> Catalog {
        Catalog::open(&self.config.catalog_path()).unwrap()
    }
}

/// Regular files below `root` as relative paths, sorted, catalog excluded
pub fn files_under(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().strip_prefix(root).unwrap().to_path_buf())
        .filter(|p| {
            !p.to_string_lossy().starts_with("catalog.db")
        })
        .collect();
    files.sort();
    files
}
