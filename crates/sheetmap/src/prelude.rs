//! Prelude module - common imports for sheetmap users
//!
//! ```rust
//! use sheetmap::prelude::*;
//! ```

pub use crate::{
    enum_field,
    field,
    BorderLineStyle,
    BorderPlacement,
    ClassMap,
    ClassMapper,
    Color,
    ColumnStyle,
    ColumnType,
    Error,
    FieldValue,
    FontStyle,
    HorizontalAlignment,
    NumberFormat,
    PatternType,
    ReaderRow,
    Result,
    Spreadsheet,
    Value,
    VerticalAlignment,
    WorksheetReader,
    WorksheetStyle,
    WorksheetWriter,
    XlsxError,
    XlsxResult,
};
