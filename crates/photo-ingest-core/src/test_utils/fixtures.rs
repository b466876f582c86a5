//! Generated media fixtures shared by unit and integration tests.
//!
//! Images are 64×64 grids of black and white 8×8 blocks, so the average hash
//! of a fixture is stable across PNG and JPEG encodings of the same seed.

use chrono::{DateTime, Utc};
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// EXIF tags written into a generated JPEG
#[derive(Debug, Default, Clone, Copy)]
pub struct ExifFixture<'a> {
    pub make: Option<&'a str>,
    pub model: Option<&'a str>,
    pub date_time: Option<&'a str>,
    pub date_time_original: Option<&'a str>,
}

fn block_pattern(seed: u64) -> u64 {
    // splitmix64
    let mut z = seed.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// A 64×64 image whose 8×8 blocks follow the bits of a seed-derived pattern
pub fn pattern_image(seed: u64) -> DynamicImage {
    let pattern = block_pattern(seed);
    let img = RgbImage::from_fn(64, 64, |x, y| {
        let bit = (y / 8) * 8 + (x / 8);
        if pattern & (1u64 << bit) != 0 {
            Rgb([255, 255, 255])
        } else {
            Rgb([0, 0, 0])
        }
    });
    DynamicImage::ImageRgb8(img)
}

pub fn png_bytes(seed: u64) -> Vec<u8> {
    let mut buf = Vec::new();
    pattern_image(seed)
        .write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Png)
        .unwrap();
    buf
}

pub fn jpeg_bytes(seed: u64) -> Vec<u8> {
    let mut buf = Vec::new();
    pattern_image(seed)
        .write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Jpeg(95))
        .unwrap();
    buf
}

/// A JPEG carrying an EXIF APP1 segment right after the SOI marker
pub fn exif_jpeg_bytes(fixture: &ExifFixture<'_>, seed: u64) -> Vec<u8> {
    let tiff = tiff_block(fixture);

    let mut app1 = vec![0xFF, 0xE1];
    app1.extend_from_slice(&((2 + 6 + tiff.len()) as u16).to_be_bytes());
    app1.extend_from_slice(b"Exif\0\0");
    app1.extend_from_slice(&tiff);

    let mut jpeg = jpeg_bytes(seed);
    jpeg.splice(2..2, app1);
    jpeg
}

/// Little-endian TIFF structure: IFD0 (Make, Model, DateTime, Exif pointer)
/// followed by the Exif IFD (DateTimeOriginal) and a shared data area.
fn tiff_block(fixture: &ExifFixture<'_>) -> Vec<u8> {
    let ifd0: Vec<(u16, &str)> = [
        (0x010F, fixture.make),
        (0x0110, fixture.model),
        (0x0132, fixture.date_time),
    ]
    .into_iter()
    .filter_map(|(tag, value)| value.map(|v| (tag, v)))
    .collect();
    let exif_ifd: Vec<(u16, &str)> = fixture
        .date_time_original
        .map(|v| vec![(0x9003, v)])
        .unwrap_or_default();

    let ifd0_count = ifd0.len() + usize::from(!exif_ifd.is_empty());
    let ifd0_size = 2 + 12 * ifd0_count + 4;
    let exif_offset = 8 + ifd0_size;
    let exif_size = if exif_ifd.is_empty() {
        0
    } else {
        2 + 12 * exif_ifd.len() + 4
    };
    let data_base = (exif_offset + exif_size) as u32;

    let mut out = Vec::new();
    let mut data = Vec::new();
    out.extend_from_slice(b"II");
    out.extend_from_slice(&42u16.to_le_bytes());
    out.extend_from_slice(&8u32.to_le_bytes());

    out.extend_from_slice(&(ifd0_count as u16).to_le_bytes());
    for (tag, text) in &ifd0 {
        ascii_entry(&mut out, &mut data, data_base, *tag, text);
    }
    if !exif_ifd.is_empty() {
        out.extend_from_slice(&0x8769u16.to_le_bytes());
        out.extend_from_slice(&4u16.to_le_bytes());
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(&(exif_offset as u32).to_le_bytes());
    }
    out.extend_from_slice(&0u32.to_le_bytes());

    if !exif_ifd.is_empty() {
        out.extend_from_slice(&(exif_ifd.len() as u16).to_le_bytes());
        for (tag, text) in &exif_ifd {
            ascii_entry(&mut out, &mut data, data_base, *tag, text);
        }
        out.extend_from_slice(&0u32.to_le_bytes());
    }

    out.extend_from_slice(&data);
    out
}

fn ascii_entry(out: &mut Vec<u8>, data: &mut Vec<u8>, data_base: u32, tag: u16, text: &str) {
    let mut bytes = text.as_bytes().to_vec();
    bytes.push(0);

    out.extend_from_slice(&tag.to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    if bytes.len() <= 4 {
        let mut inline = [0u8; 4];
        inline[..bytes.len()].copy_from_slice(&bytes);
        out.extend_from_slice(&inline);
    } else {
        out.extend_from_slice(&(data_base + data.len() as u32).to_le_bytes());
        data.extend_from_slice(&bytes);
        if data.len() % 2 == 1 {
            data.push(0);
        }
    }
}

/// Write bytes to `dir/name`, creating parent directories
pub fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, bytes).unwrap();
    path
}

/// Pin the modification time of a file
pub fn set_mtime(path: &Path, when: DateTime<Utc>) {
    let time = filetime::FileTime::from_unix_time(when.timestamp(), 0);
    filetime::set_file_mtime(path, time).unwrap();
}
