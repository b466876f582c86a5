use std::path::PathBuf;

/// Result type for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Catalog-specific errors
#[derive(Debug)]
pub enum CatalogError {
    /// SQLite errors
    Database(rusqlite::Error),

    /// Metadata snapshot could not be encoded or decoded
    Serialization(serde_json::Error),

    /// File path related errors
    Path(PathBuf, String),

    /// Record not found errors
    NotFound(String),
}

impl From<rusqlite::Error> for CatalogError {
    fn from(err: rusqlite::Error) -> Self {
        CatalogError::Database(err)
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        CatalogError::Serialization(err)
    }
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Database(err) => write!(f, "Database error: {}", err),
            Self::Serialization(err) => write!(f, "Metadata serialization error: {}", err),
            Self::Path(path, msg) => write!(f, "Path error for {}: {}", path.display(), msg),
            Self::NotFound(msg) => write!(f, "Record not found: {}", msg),
        }
    }
}

impl std::error::Error for CatalogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Database(err) => Some(err),
            Self::Serialization(err) => Some(err),
            _ => None,
        }
    }
}
