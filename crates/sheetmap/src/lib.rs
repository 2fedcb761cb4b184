//! # sheetmap
//!
//! Declarative, streaming binding between XLSX worksheets and typed records.
//!
//! A class map declares, once per record type, which field goes to which
//! column. Worksheet cursors then stream rows in and out of an `.xlsx`
//! package without materialising the sheet in memory.
//!
//! ## Features
//!
//! - Bind columns by header caption or explicit index, separately for read and write
//! - Constants, defaults and whole-row converters per column
//! - Class-map validation before any worksheet is touched
//! - Column, header and number-format styling with style interning
//! - Appending worksheets to an existing workbook, keeping everything else intact
//!
//! ## Example
//!
//! ```rust
//! use sheetmap::prelude::*;
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Product {
//!     sku: String,
//!     price: f64,
//!     in_stock: bool,
//! }
//!
//! struct ProductMap;
//!
//! impl ClassMapper for ProductMap {
//!     type Record = Product;
//!
//!     fn configure(map: &mut ClassMap<Product>) {
//!         map.map(field!(Product, sku)).name("SKU");
//!         map.map(field!(Product, price)).name("Price");
//!         map.map(field!(Product, in_stock)).name("In Stock");
//!     }
//! }
//!
//! # fn main() -> sheetmap::XlsxResult<()> {
//! let dir = std::env::temp_dir().join("sheetmap-doc-example.xlsx");
//! # let _ = std::fs::remove_file(&dir);
//! let products = vec![Product { sku: "A-100".into(), price: 9.5, in_stock: true }];
//!
//! let mut spreadsheet = Spreadsheet::open_or_create(&dir)?;
//! spreadsheet.write_worksheet::<ProductMap, _>("Products", &products, WorksheetStyle::default())?;
//! spreadsheet.close()?;
//!
//! let spreadsheet = Spreadsheet::open_or_create(&dir)?;
//! assert_eq!(spreadsheet.read_worksheet::<ProductMap>("Products", 1)?, products);
//! # drop(spreadsheet);
//! # let _ = std::fs::remove_file(&dir);
//! # Ok(())
//! # }
//! ```

pub mod prelude;

// Re-export core types
pub use sheetmap_core::{
    column_to_letters,
    datetime_to_serial,
    enum_field,
    field,
    letters_to_column,
    serial_to_datetime,
    validate,
    BiMap,
    // Style types
    BorderLineStyle,
    BorderPlacement,
    CellReference,
    // Configuration types
    ClassMap,
    ClassMapper,
    Color,
    ColumnStyle,
    ColumnType,
    ConfigError,
    // Error types
    Error,
    Field,
    FieldValue,
    FontStyle,
    HorizontalAlignment,
    NumberFormat,
    PatternType,
    PropertyMap,
    ReaderRow,
    Result,
    Setting,
    // Value types
    Value,
    ValueKind,
    VerticalAlignment,
    WorksheetStyle,
    // Constants
    MAX_COLUMNS,
    MAX_HEADER_LEN,
    MAX_SHEET_NAME_LEN,
};

// Re-export I/O types
pub use sheetmap_xlsx::{Rows, Spreadsheet, WorksheetReader, WorksheetWriter, XlsxError, XlsxResult};
