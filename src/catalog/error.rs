//! Error types for catalog operations

use thiserror::Error;

/// Errors that can occur while talking to the dataset catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Search parameters are out of range
    #[error("invalid dataset query: {0}")]
    InvalidQuery(String),

    /// Dataset reference is not of the form `owner/slug`
    #[error("invalid dataset reference '{0}'")]
    InvalidReference(String),

    /// Credentials are missing or were rejected
    #[error("catalog authentication failed: {0}")]
    Authentication(String),

    /// Catalog could not be reached or answered with an error status
    #[error("catalog unavailable: {0}")]
    Unavailable(String),

    /// Requested dataset or file does not exist
    #[error("not found in catalog: {0}")]
    NotFound(String),

    /// Response body could not be decoded
    #[error("invalid catalog response: {0}")]
    InvalidResponse(String),

    /// Writing a downloaded archive failed
    #[error("catalog download write failed: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for CatalogError {
    fn from(e: reqwest::Error) -> Self {
        // A stalled or cut-off body can surface as a decode error; it is
        // still a transport failure.
        if e.is_timeout() || e.is_body() || e.is_connect() {
            CatalogError::Unavailable(e.to_string())
        } else if e.is_decode() {
            CatalogError::InvalidResponse(e.to_string())
        } else {
            CatalogError::Unavailable(e.to_string())
        }
    }
}
