//! # sheetmap-core
//!
//! Core types for the sheetmap spreadsheet binding library.
//!
//! This crate provides everything that does not touch a package on disk:
//! - [`Value`] and [`FieldValue`] - the closed set of bindable value kinds
//! - [`ClassMap`], [`PropertyMap`], [`ClassMapper`] - declarative column bindings
//! - [`validate`] - class-map consistency checks
//! - [`BiMap`] - the bidirectional map behind header caption lookups
//! - [`reference`] - A1-style cell reference conversions
//! - [`style`] - column and worksheet style configuration
//!
//! ## Example
//!
//! ```rust
//! use sheetmap_core::{field, validate, ClassMap, ClassMapper};
//!
//! #[derive(Default)]
//! struct Invoice {
//!     number: u32,
//!     customer: String,
//! }
//!
//! struct InvoiceMap;
//!
//! impl ClassMapper for InvoiceMap {
//!     type Record = Invoice;
//!
//!     fn configure(map: &mut ClassMap<Invoice>) {
//!         map.map(field!(Invoice, number)).index(1).name("Number");
//!         map.map(field!(Invoice, customer)).index(2).name("Customer");
//!     }
//! }
//!
//! assert!(validate(&InvoiceMap::build()).is_empty());
//! ```

pub mod bimap;
pub mod config;
pub mod error;
pub mod reference;
pub mod row;
pub mod style;
pub mod validator;
pub mod value;

pub use bimap::BiMap;
pub use config::{ClassMap, ClassMapper, ColumnType, Field, PropertyMap, PropertyMapData};
pub use error::{Error, Result};
pub use reference::{column_to_letters, letters_to_column, CellReference, ColumnCache};
pub use row::ReaderRow;
pub use style::{
    BorderLineStyle, BorderPlacement, Color, ColumnStyle, FontStyle, HorizontalAlignment,
    NumberFormat, PatternType, VerticalAlignment, WorksheetStyle,
};
pub use validator::{validate, ConfigError, Setting};
pub use value::{datetime_to_serial, serial_to_datetime, FieldValue, Value, ValueKind};

/// Maximum number of columns in a worksheet
pub const MAX_COLUMNS: u32 = 16_384;

/// Maximum length of a header caption
pub const MAX_HEADER_LEN: usize = 255;

/// Maximum length of a sheet name
pub const MAX_SHEET_NAME_LEN: usize = 31;
