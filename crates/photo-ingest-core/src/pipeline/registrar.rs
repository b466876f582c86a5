use log::info;

use crate::persistence::{Catalog, CatalogRecord, CatalogResult};
use crate::types::MediaFile;

/// Buffers moved items and writes them to the catalog in batches
pub struct Registrar {
    catalog: Catalog,
    batch_size: usize,
    pending: Vec<CatalogRecord>,
    registered: usize,
}

impl Registrar {
    pub fn new(catalog: Catalog, batch_size: usize) -> Self {
        Self {
            catalog,
            batch_size: batch_size.max(1),
            pending: Vec::with_capacity(batch_size),
            registered: 0,
        }
    }

    /// Queue one item; returns how many records were written by this call
    pub fn push(&mut self, item: &MediaFile) -> CatalogResult<usize> {
        self.pending.push(CatalogRecord::from_media_file(item));
        if self.pending.len() >= self.batch_size {
            self.flush()
        } else {
            Ok(0)
        }
    }

    /// Write everything queued in one transaction
    pub fn flush(&mut self) -> CatalogResult<usize> {
        if self.pending.is_empty() {
            return Ok(0);
        }

        let written = self.catalog.insert_batch(&self.pending)?;
        self.pending.clear();
        self.registered += written;
        info!(
            "Registered {} records ({} this run)",
            written, self.registered
        );
        Ok(written)
    }

    /// Flush the remainder and hand back the total written
    pub fn finish(mut self) -> CatalogResult<usize> {
        self.flush()?;
        Ok(self.registered)
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::PHash;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn moved(name: &str, hash: u64) -> MediaFile {
        let mut item = MediaFile::new(PathBuf::from("/in").join(name), 1);
        item.moved_to = Some(PathBuf::from("/out").join(name));
        item.hash = Some(PHash(hash));
        item
    }

    #[test]
    fn test_flushes_on_full_batch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("catalog.db");
        let mut registrar = Registrar::new(Catalog::open(&path).unwrap(), 2);

        assert_eq!(registrar.push(&moved("a.jpg", 1)).unwrap(), 0);
        assert_eq!(registrar.pending(), 1);
        assert_eq!(registrar.push(&moved("b.jpg", 2)).unwrap(), 2);
        assert_eq!(registrar.push(&moved("c.jpg", 3)).unwrap(), 0);

        // Only the full batch is visible before finish
        let reader = Catalog::open(&path).unwrap();
        assert_eq!(reader.active_records().unwrap().len(), 2);

        assert_eq!(registrar.finish().unwrap(), 3);
        assert_eq!(reader.active_records().unwrap().len(), 3);
        assert!(reader
            .find_by_path(&PathBuf::from("/out/c.jpg"))
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_failed_batch_is_reported() {
        let catalog = Catalog::open_in_memory().unwrap();
        catalog
            .insert(&CatalogRecord::from_media_file(&moved("a.jpg", 1)))
            .unwrap();
        let mut registrar = Registrar::new(catalog, 10);

        registrar.push(&moved("a.jpg", 9)).unwrap();

        assert!(registrar.finish().is_err());
    }
}
