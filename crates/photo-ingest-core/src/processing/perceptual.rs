//! # Perceptual Hashing
//!
//! A 64-bit average hash: the image is reduced to an 8×8 grayscale grid and
//! every cell brighter than the grid mean sets one bit.
//!
//! ## Hamming Distance Interpretation
//!
//! - 0: identical pixel content (or an identical downsample)
//! - 1-3: nearly identical images (re-encodes, minor edits)
//! - 4-10: similar images
//! - >10: different images
//!
//! The catalog stores the raw `u64`; duplicate routing compares it either
//! exactly or by distance depending on [`crate::DuplicatePolicy`].

use image::{DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A perceptual hash represented as a 64-bit value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PHash(pub u64);

impl PHash {
    /// Calculate the Hamming distance between two perceptual hashes
    pub fn distance(&self, other: &PHash) -> u32 {
        (self.0 ^ other.0).count_ones()
    }

    /// Check if two images are perceptually similar based on a threshold
    pub fn is_similar(&self, other: &PHash, threshold: u32) -> bool {
        self.distance(other) <= threshold
    }

    /// Bit-for-bit reinterpretation used for SQLite INTEGER columns
    pub fn to_i64(self) -> i64 {
        self.0 as i64
    }

    pub fn from_i64(value: i64) -> Self {
        PHash(value as u64)
    }
}

impl fmt::Display for PHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Calculate a 64-bit perceptual hash for a decoded image
#[inline]
pub fn calculate_phash(img: &DynamicImage) -> PHash {
    let small = img.resize_exact(8, 8, image::imageops::FilterType::Triangle);

    // Grayscale formula: 0.299*R + 0.587*G + 0.114*B
    let mut pixels = [0.0f32; 64];
    let mut sum = 0.0;

    for y in 0..8 {
        for x in 0..8 {
            let pixel = small.get_pixel(x, y);
            let gray = 0.299 * pixel[0] as f32 + 0.587 * pixel[1] as f32 + 0.114 * pixel[2] as f32;
            pixels[(y as usize) * 8 + (x as usize)] = gray;
            sum += gray;
        }
    }

    let mean = sum / 64.0;

    let mut hash: u64 = 0;
    for (bit_pos, &p) in pixels.iter().enumerate() {
        if p > mean {
            hash |= 1u64 << bit_pos;
        }
    }

    PHash(hash)
}
