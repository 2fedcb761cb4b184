//! # sheetmap-xlsx
//!
//! Streaming XLSX (Office Open XML) worksheet cursors for sheetmap.
//!
//! A [`Spreadsheet`] opens or creates one package and hands out
//! [`WorksheetReader`]s and [`WorksheetWriter`]s that bind rows to records
//! through a [`sheetmap_core::ClassMap`]. Styles and shared strings are
//! interned across every worksheet written in a session; parts the library
//! does not model are carried over untouched on save.

pub mod document;
pub mod error;
pub mod package;
pub mod reader;
pub mod shared_strings;
pub mod spreadsheet;
pub mod styles;
pub mod workbook;
pub mod writer;

mod xml;

pub use document::Document;
pub use error::{XlsxError, XlsxResult};
pub use package::Package;
pub use reader::{Rows, WorksheetReader};
pub use shared_strings::SharedStringTable;
pub use spreadsheet::Spreadsheet;
pub use styles::{CellFormat, StyleTable};
pub use workbook::{SheetEntry, Workbook};
pub use writer::WorksheetWriter;
