use log::debug;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::config::DuplicatePolicy;
use crate::logging::{log_new_picture, log_possible_duplicate};
use crate::persistence::{Catalog, CatalogResult};
use crate::processing::PHash;
use crate::types::MediaFile;

/// Where the router sends an item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Matches `existing`; goes to the recycle root
    Recycle { existing: PathBuf, distance: u32 },
    /// New content; goes on to analysis and naming
    Analyze,
}

/// In-memory hash lookup; the earliest entry wins ties
#[derive(Debug, Default)]
struct HashIndex {
    exact: HashMap<PHash, PathBuf>,
    entries: Vec<(PHash, PathBuf)>,
}

impl HashIndex {
    fn insert(&mut self, hash: PHash, path: PathBuf) {
        self.exact.entry(hash).or_insert_with(|| path.clone());
        self.entries.push((hash, path));
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn find(&self, hash: PHash, policy: DuplicatePolicy) -> Option<(PathBuf, u32)> {
        match policy {
            DuplicatePolicy::ExactMatch => self.exact.get(&hash).map(|path| (path.clone(), 0)),
            DuplicatePolicy::DistanceThreshold(max) => {
                let mut best: Option<(u32, &PathBuf)> = None;
                for (seen, path) in &self.entries {
                    let distance = seen.distance(&hash);
                    if distance <= max && best.map_or(true, |(d, _)| distance < d) {
                        best = Some((distance, path));
                    }
                }
                best.map(|(distance, path)| (path.clone(), distance))
            }
        }
    }
}

/// Decides duplicate or new for each hashed item.
///
/// Compares against the catalog as it stood when the router was built, so
/// batches registered during the run are never seen. Hashes let through
/// earlier in the same run count only when `detect_run_duplicates` is set.
pub struct Router {
    known: HashIndex,
    policy: DuplicatePolicy,
    accepted: Option<HashIndex>,
}

impl Router {
    pub fn new(
        catalog: &Catalog,
        policy: DuplicatePolicy,
        detect_run_duplicates: bool,
    ) -> CatalogResult<Self> {
        let mut known = HashIndex::default();
        for (hash, path) in catalog.active_hashes()? {
            known.insert(hash, path);
        }
        debug!("Router loaded {} catalogued hashes", known.len());

        Ok(Self {
            known,
            policy,
            accepted: detect_run_duplicates.then(HashIndex::default),
        })
    }

    pub fn route(&mut self, item: &MediaFile) -> Route {
        // Undecodable items cannot be compared
        let Some(hash) = item.hash else {
            log_new_picture(&item.source);
            return Route::Analyze;
        };

        let matched = self.known.find(hash, self.policy).or_else(|| {
            self.accepted
                .as_ref()
                .and_then(|accepted| accepted.find(hash, self.policy))
        });
        if let Some((existing, distance)) = matched {
            log_possible_duplicate(&item.source, &existing, distance);
            return Route::Recycle { existing, distance };
        }

        if let Some(accepted) = self.accepted.as_mut() {
            accepted.insert(hash, item.source.clone());
        }
        log_new_picture(&item.source);
        Route::Analyze
    }
}
