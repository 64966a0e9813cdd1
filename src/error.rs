//! Error types for gridexport

use thiserror::Error;

/// Result type alias for export operations
pub type Result<T> = std::result::Result<T, ExportError>;

/// Main error type for all export operations
#[derive(Error, Debug)]
pub enum ExportError {
    /// Error occurred while writing the spreadsheet file
    #[error("Failed to write spreadsheet: {0}")]
    WriteError(String),

    /// Error occurred while reading a spreadsheet back
    #[error("Failed to read spreadsheet: {0}")]
    ReadError(String),

    /// IO error wrapper
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// CSV writer error wrapper
    #[error("CSV error: {0}")]
    CsvError(String),

    /// The file extension does not map to a known writer
    #[error("Unsupported export format: {0}")]
    UnsupportedFormat(String),

    /// Operation not valid in the exporter's current state
    #[error("Invalid exporter state: {0}")]
    InvalidState(String),

    /// Unknown lifecycle event name
    #[error("Unknown export event: {0}")]
    InvalidEvent(String),

    /// A registered event handler failed
    #[error("Handler for '{event}' failed: {source}")]
    EventHandler {
        event: String,
        #[source]
        source: Box<ExportError>,
    },

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<csv::Error> for ExportError {
    fn from(err: csv::Error) -> Self {
        ExportError::CsvError(err.to_string())
    }
}

impl From<zip::result::ZipError> for ExportError {
    fn from(err: zip::result::ZipError) -> Self {
        ExportError::WriteError(err.to_string())
    }
}
