use log::{info, warn};
use std::path::Path;

use crate::processing::naming::{self, NamingBasis};
use crate::types::{ItemError, MediaFile, Stage};

/// Attach a target directory and file name to the item.
///
/// An item without any usable timestamp is marked and must not be moved.
pub fn process(item: &mut MediaFile, target_root: &Path) -> Result<NamingBasis, ItemError> {
    match naming::suggest(item, target_root) {
        Ok((suggestion, basis)) => {
            if basis == NamingBasis::FileTimes {
                info!(
                    "Generic name for {}: {}",
                    item.source.display(),
                    suggestion.file_name
                );
            }
            item.suggestion = Some(suggestion);
            Ok(basis)
        }
        Err(e) => {
            warn!(
                "No usable timestamp for {}, left in place",
                item.source.display()
            );
            item.fail(Stage::Suggestion, e.clone());
            Err(e)
        }
    }
}
