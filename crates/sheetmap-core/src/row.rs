//! Row access for read converters

use ahash::AHashMap;

use crate::bimap::BiMap;
use crate::error::{Error, Result};

/// The cells of the row currently being read
///
/// Handed to custom read converters so they can combine or reinterpret
/// several cells. Absent cells are errors here, unlike in plain field
/// binding where they read as empty text.
#[derive(Debug, Clone, Copy)]
pub struct ReaderRow<'a> {
    headers: Option<&'a BiMap<u32, String>>,
    cells: &'a AHashMap<u32, String>,
}

impl<'a> ReaderRow<'a> {
    pub fn new(headers: Option<&'a BiMap<u32, String>>, cells: &'a AHashMap<u32, String>) -> Self {
        Self { headers, cells }
    }

    /// Text of the cell in 1-based column `column`
    pub fn value(&self, column: u32) -> Result<&'a str> {
        self.cells
            .get(&column)
            .map(String::as_str)
            .ok_or_else(|| Error::MissingCell(format!("column {}", column)))
    }

    /// Text of the cell under header `name` (case-insensitive)
    pub fn value_by_header(&self, name: &str) -> Result<&'a str> {
        let column = self
            .headers
            .and_then(|headers| find_header(headers, name))
            .ok_or_else(|| Error::MissingCell(format!("header '{}'", name)))?;
        self.cells
            .get(&column)
            .map(String::as_str)
            .ok_or_else(|| Error::MissingCell(format!("header '{}'", name)))
    }

    /// Number of non-empty cells in the row
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Column of header `name`; exact match first, then ignoring case
pub fn find_header(headers: &BiMap<u32, String>, name: &str) -> Option<u32> {
    if let Some(&column) = headers.get_key(&name.to_string()) {
        return Some(column);
    }
    headers
        .iter()
        .filter(|(_, caption)| caption.eq_ignore_ascii_case(name))
        .map(|(&column, _)| column)
        .min()
}
