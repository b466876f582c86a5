//! EXIF metadata extraction.
//!
//! Produces a flat [`MetadataSnapshot`] that is attached to each item, used by
//! the naming rules and persisted with every catalog record.

use exif::{Exif, In, Tag, Value};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, Seek};
use std::path::Path;
use thiserror::Error;

/// Failures while reading metadata from a file
#[derive(Error, Debug)]
pub enum MetadataError {
    /// The container format cannot carry or expose EXIF data
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The container was recognised but its EXIF block is unreadable
    #[error("Malformed metadata: {0}")]
    Malformed(String),
}

/// Camera and capture information extracted from a media file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataSnapshot {
    pub make: Option<String>,
    pub model: Option<String>,
    pub lens_make: Option<String>,
    pub lens_model: Option<String>,

    /// Raw EXIF date strings, `yyyy:MM:dd HH:mm:ss`
    pub date_time_original: Option<String>,
    pub date_time_digitized: Option<String>,
    pub date_time: Option<String>,

    /// GPS date as stored, `yyyy:MM:dd`
    pub gps_date_stamp: Option<String>,
    /// GPS time rendered as `HH:mm:ss`
    pub gps_time_stamp: Option<String>,
    pub gps_latitude: Option<f64>,
    pub gps_longitude: Option<f64>,

    pub exposure_time: Option<String>,
    pub f_number: Option<String>,
    pub iso_speed: Option<u32>,
    pub focal_length: Option<String>,
    pub orientation: Option<u32>,
    pub software: Option<String>,

    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl MetadataSnapshot {
    /// True when no tag at all was found
    pub fn is_empty(&self) -> bool {
        *self == MetadataSnapshot::default()
    }
}

/// Read metadata from a file on disk
pub fn extract_metadata<P: AsRef<Path>>(path: P) -> Result<MetadataSnapshot, MetadataError> {
    let file = File::open(path.as_ref())?;
    let mut reader = BufReader::new(file);
    read_snapshot(&mut reader)
}

/// Read metadata from an already opened file, starting wherever the reader is
pub fn extract_from_reader<R: BufRead + Seek>(
    reader: &mut R,
) -> Result<MetadataSnapshot, MetadataError> {
    read_snapshot(reader)
}

fn read_snapshot<R: BufRead + Seek>(reader: &mut R) -> Result<MetadataSnapshot, MetadataError> {
    let result = exif::Reader::new()
        .continue_on_error(true)
        .read_from_container(reader)
        .or_else(|e| {
            e.distill_partial_result(|errors| {
                for error in errors {
                    debug!("Ignoring damaged EXIF field: {}", error);
                }
            })
        });

    match result {
        Ok(exif) => Ok(snapshot_from_exif(&exif)),
        // Recognised container without an EXIF block
        Err(exif::Error::NotFound(_)) => Ok(MetadataSnapshot::default()),
        Err(exif::Error::InvalidFormat(msg)) | Err(exif::Error::NotSupported(msg)) => {
            Err(MetadataError::UnsupportedFormat(msg.to_string()))
        }
        Err(exif::Error::Io(e)) => Err(MetadataError::Io(e)),
        Err(other) => Err(MetadataError::Malformed(other.to_string())),
    }
}

fn snapshot_from_exif(exif: &Exif) -> MetadataSnapshot {
    MetadataSnapshot {
        make: ascii(exif, Tag::Make),
        model: ascii(exif, Tag::Model),
        lens_make: ascii(exif, Tag::LensMake),
        lens_model: ascii(exif, Tag::LensModel),
        date_time_original: ascii(exif, Tag::DateTimeOriginal),
        date_time_digitized: ascii(exif, Tag::DateTimeDigitized),
        date_time: ascii(exif, Tag::DateTime),
        gps_date_stamp: ascii(exif, Tag::GPSDateStamp),
        gps_time_stamp: gps_time(exif),
        gps_latitude: coordinate(exif, Tag::GPSLatitude, Tag::GPSLatitudeRef, "S"),
        gps_longitude: coordinate(exif, Tag::GPSLongitude, Tag::GPSLongitudeRef, "W"),
        exposure_time: display(exif, Tag::ExposureTime),
        f_number: display(exif, Tag::FNumber),
        iso_speed: uint(exif, Tag::PhotographicSensitivity),
        focal_length: display(exif, Tag::FocalLength),
        orientation: uint(exif, Tag::Orientation),
        software: ascii(exif, Tag::Software),
        width: uint(exif, Tag::PixelXDimension),
        height: uint(exif, Tag::PixelYDimension),
    }
}

/// Raw ASCII value with padding and trailing NULs removed
fn ascii(exif: &Exif, tag: Tag) -> Option<String> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    match field.value {
        Value::Ascii(ref parts) if !parts.is_empty() => {
            let text = String::from_utf8_lossy(&parts[0]);
            let text = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
            if text.is_empty() {
                None
            } else {
                Some(text.to_string())
            }
        }
        _ => None,
    }
}

fn display(exif: &Exif, tag: Tag) -> Option<String> {
    exif.get_field(tag, In::PRIMARY)
        .map(|field| field.display_value().to_string())
        .filter(|s| !s.is_empty())
}

fn uint(exif: &Exif, tag: Tag) -> Option<u32> {
    exif.get_field(tag, In::PRIMARY)
        .and_then(|field| field.value.get_uint(0))
}

fn gps_time(exif: &Exif) -> Option<String> {
    let field = exif.get_field(Tag::GPSTimeStamp, In::PRIMARY)?;
    match field.value {
        Value::Rational(ref rats) if rats.len() >= 3 && rats.iter().all(|r| r.denom != 0) => {
            Some(format!(
                "{:02}:{:02}:{:02}",
                rats[0].to_f64() as u32,
                rats[1].to_f64() as u32,
                rats[2].to_f64() as u32
            ))
        }
        _ => None,
    }
}

/// Degrees/minutes/seconds to signed decimal degrees
fn coordinate(exif: &Exif, tag: Tag, ref_tag: Tag, negative: &str) -> Option<f64> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    let magnitude = match field.value {
        Value::Rational(ref rats) if rats.len() >= 3 && rats.iter().all(|r| r.denom != 0) => {
            rats[0].to_f64() + rats[1].to_f64() / 60.0 + rats[2].to_f64() / 3600.0
        }
        _ => return None,
    };

    let is_negative = ascii(exif, ref_tag)
        .map(|r| r.eq_ignore_ascii_case(negative))
        .unwrap_or(false);

    Some(if is_negative { -magnitude } else { magnitude })
}
