//! XLSX error types

use thiserror::Error;

/// Result type for XLSX operations
pub type XlsxResult<T> = std::result::Result<T, XlsxError>;

/// Errors that can occur while reading or writing a package
#[derive(Debug, Error)]
pub enum XlsxError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// ZIP error
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// XML error
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Invalid file format
    #[error("Invalid XLSX format: {0}")]
    InvalidFormat(String),

    /// Missing required part
    #[error("Missing required part: {0}")]
    MissingPart(String),

    /// No sheet with the requested name is registered in the workbook
    #[error("Worksheet not found: {0}")]
    WorksheetNotFound(String),

    /// Writers are requested after the spreadsheet was saved and closed
    #[error("The spreadsheet has been closed")]
    Closed,

    /// Configuration, binding or conversion error
    #[error(transparent)]
    Core(#[from] sheetmap_core::Error),
}

impl XlsxError {
    /// The underlying core error, if this is one
    pub fn as_core(&self) -> Option<&sheetmap_core::Error> {
        match self {
            XlsxError::Core(e) => Some(e),
            _ => None,
        }
    }
}
