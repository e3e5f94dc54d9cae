//! Error types for certificate generation.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while generating certificates.
#[derive(Error, Debug)]
pub enum Error {
    /// The template could not be parsed as a PPTX package.
    #[error("Malformed template: {0}")]
    MalformedTemplate(String),

    /// The external converter is not installed or could not be started.
    #[error("Document converter unavailable: {0}")]
    ConverterUnavailable(String),

    /// The external converter ran but did not produce a document.
    #[error("Conversion failed: {0}")]
    ConversionFailed(String),

    /// The participant spreadsheet could not be read.
    #[error("Invalid spreadsheet: {0}")]
    InvalidSpreadsheet(String),

    /// The requested name column does not exist in the spreadsheet.
    #[error("Column '{column}' not found (available: {})", available.join(", "))]
    ColumnNotFound {
        column: String,
        available: Vec<String>,
    },

    /// Failed to read or write a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything not covered above, e.g. a failure while writing the archive.
    #[error("Unexpected failure: {0}")]
    Unexpected(String),
}
