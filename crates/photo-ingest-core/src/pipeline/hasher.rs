//! Decode each file and compute its perceptual hash.

use image::io::Reader as ImageReader;
use image::GenericImageView;
use log::debug;
use std::fs::File;
use std::io::{BufReader, Seek};

use crate::logging::{log_file_error, log_hash_error};
use crate::metadata::extract_from_reader;
use crate::processing::calculate_phash;
use crate::types::{ItemError, MediaFile, Stage};

/// Hash one item in place.
///
/// The file is opened once. Its format is sniffed from the leading bytes and
/// anything that is not a known image format is rejected before the body is
/// read. When it decodes, the metadata is taken from the same handle so the
/// analyzer does not have to reopen it. Decode failures are recorded on the
/// item, which continues downstream without a hash.
pub fn process(item: &mut MediaFile) {
    let mut reader = match File::open(&item.source) {
        Ok(file) => BufReader::new(file),
        Err(e) => {
            log_file_error(&item.source, "open", &e);
            item.fail(Stage::Hasher, ItemError::DecodeFailure(e.to_string()));
            return;
        }
    };

    let decoder = match ImageReader::new(&mut reader).with_guessed_format() {
        Ok(decoder) => decoder,
        Err(e) => {
            log_file_error(&item.source, "read", &e);
            item.fail(Stage::Hasher, ItemError::DecodeFailure(e.to_string()));
            return;
        }
    };
    if decoder.format().is_none() {
        log_hash_error(&item.source, &"unrecognised image format");
        item.fail(
            Stage::Hasher,
            ItemError::DecodeFailure("unrecognised image format".to_string()),
        );
        return;
    }

    match decoder.decode() {
        Ok(img) => item.attach_image(img),
        Err(e) => {
            log_hash_error(&item.source, &e);
            item.fail(Stage::Hasher, ItemError::DecodeFailure(e.to_string()));
            return;
        }
    }

    let Some(img) = item.image() else { return };
    let hash = calculate_phash(img);
    let (width, height) = img.dimensions();

    let metadata = reader
        .rewind()
        .map_err(Into::into)
        .and_then(|()| extract_from_reader(&mut reader));
    match metadata {
        Ok(mut snapshot) => {
            snapshot.width = snapshot.width.or(Some(width));
            snapshot.height = snapshot.height.or(Some(height));
            item.metadata = Some(snapshot);
        }
        // The analyzer retries and classifies the failure
        Err(e) => debug!("Deferred metadata for {}: {}", item.source.display(), e),
    }

    item.hash = Some(hash);
    item.release_image();
}
