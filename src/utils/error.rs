// src/utils/error.rs
use thiserror::Error;

// Define specific error types for different parts of the application
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error), // Automatically convert reqwest errors

    #[error("HTTP error: {0}")]
    Http(reqwest::StatusCode), // e.g., 404 Not Found, 503 Service Unavailable

    #[error("Report query form not found on the tool page")]
    FormNotFound,

    #[error("Failed to parse report page: {0}")]
    Parse(String),

    #[error("I/O error while saving download: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("No download appeared in the staging directory within {0:?}")]
    Timeout(std::time::Duration),

    #[error("I/O error while polling staging directory: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Failed to read workbook: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("Workbook contains no sheets")]
    NoSheets,

    #[error("File too short to contain the report header")]
    TooShort,

    #[error("No column labelled 'Country' in header row")]
    MissingCountryColumn,

    #[error("No month/year value columns recognized in header row")]
    NoValueColumns,
}

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read HS code file: {0}")]
    Io(#[from] std::io::Error),

    #[error("HS code file '{0}' contains no codes")]
    Empty(String),

    #[error("Failed to read lookup workbook: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("Lookup workbook missing expected column: {0}")]
    MissingColumn(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error), // Automatically convert IO errors

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Report session failed: {0}")]
    Session(#[from] SessionError),

    #[error("Download reconciliation failed: {0}")]
    Reconcile(#[from] ReconcileError),

    #[error("Transformation failed: {0}")]
    Transform(#[from] TransformError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("CSV output failed: {0}")]
    Csv(#[from] csv::Error),
}
