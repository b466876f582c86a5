use std::path::PathBuf;
use thiserror::Error;

use crate::persistence::CatalogError;

pub type Result<T> = core::result::Result<T, Error>;

/// Custom error types for the photo-ingest library
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Directory enumeration failed part way through
    #[error("Enumeration failed: {0}")]
    Walk(#[from] walkdir::Error),

    /// File not found error
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Invalid configuration error
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Catalog read or write failure
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// The run was cancelled before every stage drained
    #[error("Operation interrupted")]
    Interrupted,

    /// Unknown error
    #[error("Unknown error: {0}")]
    Unknown(String),
}
