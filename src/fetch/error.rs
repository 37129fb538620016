//! Error types for dataset fetching

use thiserror::Error;

use crate::catalog::CatalogError;

/// Errors that can occur while downloading and unpacking a dataset file
#[derive(Debug, Error)]
pub enum FetchError {
    /// The catalog could not deliver the archive
    #[error("download failed: {0}")]
    Catalog(#[from] CatalogError),

    /// The archive is corrupt or holds an entry that would land outside the
    /// working directory
    #[error("archive extraction failed: {0}")]
    Archive(String),

    /// Local filesystem error
    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<zip::result::ZipError> for FetchError {
    fn from(e: zip::result::ZipError) -> Self {
        match e {
            zip::result::ZipError::Io(io) => FetchError::Io(io),
            other => FetchError::Archive(other.to_string()),
        }
    }
}
