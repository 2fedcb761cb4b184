//! Error types for sheetmap-core

use thiserror::Error;

use crate::validator::ConfigError;
use crate::value::ValueKind;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while configuring or binding worksheet columns
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed cell reference such as `"1A"` or `"A0"`
    #[error("Invalid cell reference: {0}")]
    InvalidReference(String),

    /// Column index outside `1..=16384`
    #[error("Column index {0} out of bounds (valid: 1..={})", crate::MAX_COLUMNS)]
    ColumnOutOfBounds(u32),

    /// A bidirectional map refused a key that is already present
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// A bidirectional map refused a value that is already present
    #[error("Duplicate value: {0}")]
    DuplicateValue(String),

    /// One or more class-map definitions are inconsistent
    #[error("Class map `{class_map}` has invalid map definitions: {}", join_errors(.errors))]
    Configuration {
        class_map: &'static str,
        errors: Vec<ConfigError>,
    },

    /// A mapped field has neither an index nor a matching header
    #[error("Property '{field}' has no index defined and there is no spreadsheet column matching '{header}'")]
    UnresolvableBinding { field: String, header: String },

    /// Cell text could not be converted to the field type
    #[error("Cannot convert '{text}' to {target}")]
    Conversion { text: String, target: ValueKind },

    /// A read converter asked for a cell that is not present in the row
    #[error("Cell not found: {0}")]
    MissingCell(String),

    /// Invalid worksheet name
    #[error("Invalid worksheet name '{name}': {reason}")]
    InvalidSheetName { name: String, reason: &'static str },

    /// Duplicate worksheet name
    #[error("A worksheet with the name '{0}' has already been added to the spreadsheet")]
    DuplicateSheetName(String),

    /// Header row requested on an empty worksheet
    #[error("There are no rows available to read")]
    NoRows,

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a new "other" error with a message
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }

    /// Conversion failure for `text` into a field of kind `target`
    pub fn conversion<S: Into<String>>(text: S, target: ValueKind) -> Self {
        Error::Conversion {
            text: text.into(),
            target,
        }
    }
}

fn join_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
