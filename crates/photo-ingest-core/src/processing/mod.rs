//! Per-item processing: perceptual hashing, naming rules and progress display.

pub mod naming;
pub mod perceptual;
pub mod progress;

// Expose perceptual hash
pub use perceptual::{calculate_phash, PHash};

pub use naming::{suggest, NamingBasis};
pub use progress::ProgressTracker;
