//! Error types for warehouse operations

use thiserror::Error;

/// Errors that can occur while loading into the warehouse
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// Connection descriptor missing, unreadable or not a JSON object
    #[error("connection config invalid: {0}")]
    Config(String),

    /// Failed to establish a session
    #[error("session failed: {0}")]
    Session(String),

    /// A statement (DDL, PUT, COPY) was rejected
    #[error("statement failed: {0}")]
    Statement(String),

    /// Local data could not be read or staged for upload
    #[error("local data error: {0}")]
    Data(String),

    /// Local filesystem error
    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<arrow_schema::ArrowError> for WarehouseError {
    fn from(e: arrow_schema::ArrowError) -> Self {
        WarehouseError::Data(e.to_string())
    }
}

impl From<parquet::errors::ParquetError> for WarehouseError {
    fn from(e: parquet::errors::ParquetError) -> Self {
        WarehouseError::Data(e.to_string())
    }
}
