//! Cell references
//!
//! Worksheet cells are addressed as `<column letters><row number>`, e.g. `"AB12"`.
//! Column letters form a base-26 numeral system without a zero digit
//! (`A = 1 … Z = 26, AA = 27 …`). All indices in this module are 1-based,
//! matching the `r` attributes found in worksheet XML.

use std::fmt;
use std::str::FromStr;

use ahash::AHashMap;

use crate::error::{Error, Result};
use crate::MAX_COLUMNS;

/// Convert a 1-based column index to letters (1 = A, 26 = Z, 27 = AA, ...)
pub fn column_to_letters(column: u32) -> Result<String> {
    if column == 0 || column > MAX_COLUMNS {
        return Err(Error::ColumnOutOfBounds(column));
    }

    let mut letters = Vec::with_capacity(3);
    let mut n = column;
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - rem - 1) / 26;
    }
    letters.reverse();

    // Only ASCII uppercase bytes were pushed
    Ok(letters.into_iter().map(char::from).collect())
}

/// Convert column letters to a 1-based column index (A = 1, Z = 26, AA = 27, ...)
///
/// Letters are case-insensitive.
pub fn letters_to_column(letters: &str) -> Result<u32> {
    if letters.is_empty() {
        return Err(Error::InvalidReference("empty column letters".into()));
    }

    let mut column: u32 = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return Err(Error::InvalidReference(format!(
                "invalid column letter '{}' in '{}'",
                c, letters
            )));
        }
        column = column
            .saturating_mul(26)
            .saturating_add(c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
    }

    if column > MAX_COLUMNS {
        return Err(Error::ColumnOutOfBounds(column));
    }

    Ok(column)
}

/// A parsed cell reference (1-based column and row)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellReference {
    /// Column index (1 = A)
    pub column: u32,
    /// Row number (1-based)
    pub row: u32,
}

impl CellReference {
    pub fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }

    /// Split a reference like `"AB12"` into its letter and row parts
    pub fn split(reference: &str) -> Result<(&str, u32)> {
        let reference = reference.trim();
        let split = reference
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(reference.len());

        let (letters, digits) = reference.split_at(split);
        if letters.is_empty() || digits.is_empty() {
            return Err(Error::InvalidReference(reference.to_string()));
        }

        let row: u32 = digits
            .parse()
            .map_err(|_| Error::InvalidReference(reference.to_string()))?;
        if row == 0 {
            return Err(Error::InvalidReference(format!(
                "row number must be >= 1 in '{}'",
                reference
            )));
        }

        Ok((letters, row))
    }

    /// Parse an A1-style reference
    pub fn parse(reference: &str) -> Result<Self> {
        let (letters, row) = Self::split(reference)?;
        Ok(Self {
            column: letters_to_column(letters)?,
            row,
        })
    }
}

impl FromStr for CellReference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for CellReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match column_to_letters(self.column) {
            Ok(letters) => write!(f, "{}{}", letters, self.row),
            Err(_) => Err(fmt::Error),
        }
    }
}

/// Memoised column letters ↔ index conversions
///
/// The same handful of column references recur on every row of a worksheet,
/// so cursors keep one of these per instance.
#[derive(Debug, Default)]
pub struct ColumnCache {
    by_letters: AHashMap<String, u32>,
    by_index: AHashMap<u32, String>,
}

impl ColumnCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Column index for `letters`
    pub fn index_of(&mut self, letters: &str) -> Result<u32> {
        if let Some(&index) = self.by_letters.get(letters) {
            return Ok(index);
        }
        let index = letters_to_column(letters)?;
        self.by_letters.insert(letters.to_string(), index);
        Ok(index)
    }

    /// Column letters for `index`
    pub fn letters_of(&mut self, index: u32) -> Result<&str> {
        if !self.by_index.contains_key(&index) {
            let letters = column_to_letters(index)?;
            self.by_index.insert(index, letters);
        }
        self.by_index
            .get(&index)
            .map(String::as_str)
            .ok_or(Error::ColumnOutOfBounds(index))
    }

    /// Column index of a full cell reference such as `"C7"`
    pub fn column_of(&mut self, reference: &str) -> Result<u32> {
        let (letters, _) = CellReference::split(reference)?;
        self.index_of(letters)
    }

    /// Build `"<letters><row>"` for a 1-based column and row
    pub fn reference(&mut self, column: u32, row: u32) -> Result<String> {
        let letters = self.letters_of(column)?;
        let mut reference = String::with_capacity(letters.len() + 7);
        reference.push_str(letters);
        reference.push_str(&row.to_string());
        Ok(reference)
    }
}
