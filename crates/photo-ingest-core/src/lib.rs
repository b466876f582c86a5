//! Core functionality for ingesting, deduplicating and renaming photos.
//!
//! This library provides the components of one ingest run:
//! - Catalog reconciliation against the organized tree
//! - File discovery, decoding and perceptual hashing
//! - Duplicate routing against the catalog
//! - Metadata-driven naming and collision-free moves
//! - Batched catalog registration
//! - Recycling of duplicate copies already in the library

use log::info;
use serde::Serialize;

// -- Internal Modules --
mod error;

// -- Public Re-exports --
pub use config::*;
pub use error::{Error, Result};
pub use pipeline::{CancellationToken, Pipeline};
pub use reconcile::{ReconcileSummary, Reconciler};
pub use sweep::SweepSummary;
pub use types::*;

// -- Public Modules --
pub mod config;
pub mod discovery;
pub mod inspect;
pub mod logging;
pub mod metadata;
pub mod persistence;
pub mod pipeline;
pub mod processing;
pub mod reconcile;
pub mod sweep;
pub mod types;

// -- Test Modules --
#[cfg(test)]
pub mod test_utils;

use persistence::{Catalog, CatalogStats, DuplicateGroup};
use pipeline::mover::Mover;

/// Outcome of a full ingest: the pre-pass and the run itself
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub reconcile: ReconcileSummary,
    pub run: RunSummary,
}

/// Main entry point for the ingest process
pub struct PhotoIngester {
    config: Config,
    cancel: CancellationToken,
}

impl PhotoIngester {
    /// Create a new PhotoIngester with the provided configuration
    pub fn new(config: Config) -> Self {
        Self::with_cancellation(config, CancellationToken::new())
    }

    /// Create an ingester that stops when `cancel` is triggered
    pub fn with_cancellation(config: Config, cancel: CancellationToken) -> Self {
        Self { config, cancel }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Handle for stopping a run from another thread
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Sync the catalog with the target tree without ingesting anything
    pub fn reconcile(&self) -> Result<ReconcileSummary> {
        self.config.validate_target()?;
        self.reconcile_validated()
    }

    fn reconcile_validated(&self) -> Result<ReconcileSummary> {
        let catalog = Catalog::open(&self.config.catalog_path())?;
        let reconciler = Reconciler::new(
            self.config.hasher_threads,
            self.config.show_progress,
            self.cancel.clone(),
        );
        reconciler.reconcile(&catalog, &self.config.target_dir)
    }

    /// Run the full ingest: reconcile first, then the concurrent pipeline
    pub fn run(&self) -> Result<IngestReport> {
        self.config.validate()?;

        info!("Reconciling catalog with {}", self.config.target_dir.display());
        let reconcile = self.reconcile_validated()?;

        info!(
            "Ingesting {} into {}",
            self.config.source_dir.display(),
            self.config.target_dir.display()
        );
        let run = Pipeline::new(&self.config, self.cancel.clone()).run()?;

        Ok(IngestReport { reconcile, run })
    }

    /// Catalogued files sharing a hash
    pub fn duplicate_report(&self) -> Result<Vec<DuplicateGroup>> {
        self.config.validate_target()?;
        let catalog = Catalog::open(&self.config.catalog_path())?;
        Ok(catalog.duplicate_groups()?)
    }

    /// Reconcile, then move every extra copy of a catalogued hash to the
    /// recycle root, keeping the copy whose path sorts first
    pub fn recycle_duplicates(&self) -> Result<SweepSummary> {
        self.config.validate_library()?;
        self.reconcile_validated()?;

        let catalog = Catalog::open(&self.config.catalog_path())?;
        let mover = Mover::new(self.config.max_collision_probes);
        sweep::recycle_duplicates(&catalog, &self.config.recycle_dir, &mover)
    }

    pub fn catalog_stats(&self) -> Result<CatalogStats> {
        self.config.validate_target()?;
        let catalog = Catalog::open(&self.config.catalog_path())?;
        Ok(catalog.stats()?)
    }
}
