//! Per-column binding configuration

use std::fmt;

use crate::config::Field;
use crate::error::Result;
use crate::row::ReaderRow;
use crate::style::ColumnStyle;
use crate::value::{FieldValue, Value, ValueKind};

/// Converts the current row into a field value, bypassing cell lookup
pub type ReadConverter = Box<dyn Fn(&ReaderRow<'_>) -> Result<Option<Value>>>;

/// Computes a cell value from the whole record
pub type WriteConverter<T> = Box<dyn Fn(&T) -> Option<Value>>;

/// How a written column's cells are encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColumnType {
    /// Inferred from the field (or constant) kind
    #[default]
    Unset,
    /// `t="b"`, written as `1`/`0`
    Boolean,
    /// Plain number
    Number,
    /// Number holding a day serial, short date format unless styled otherwise
    Date,
    /// Inline formula result text, `t="str"`
    Formula,
    /// Inline string, `t="inlineStr"`
    RichText,
    /// Shared string, `t="s"`
    Text,
}

impl ColumnType {
    /// Column type written for values of `kind` when none is configured
    pub fn infer(kind: ValueKind) -> Self {
        match kind {
            ValueKind::Bool => ColumnType::Boolean,
            ValueKind::DateTime => ColumnType::Date,
            k if k.is_numeric() => ColumnType::Number,
            _ => ColumnType::Text,
        }
    }
}

/// Everything configured for one column
///
/// Indices are 1-based; `0` means the index is implied (by header on read, by
/// position on write).
pub struct PropertyMapData<T> {
    pub field: Option<Field<T>>,
    pub index_read: u32,
    pub index_write: u32,
    pub name_read: Option<String>,
    pub name_write: Option<String>,
    pub constant_read: Option<Value>,
    pub constant_write: Option<Value>,
    pub default_read: Option<Value>,
    pub default_write: Option<Value>,
    pub ignore_read: bool,
    pub ignore_write: bool,
    pub column_type: ColumnType,
    pub read_using: Option<ReadConverter>,
    pub write_using: Option<WriteConverter<T>>,
    pub style: ColumnStyle,
}

impl<T> PropertyMapData<T> {
    fn new(field: Option<Field<T>>) -> Self {
        Self {
            field,
            index_read: 0,
            index_write: 0,
            name_read: None,
            name_write: None,
            constant_read: None,
            constant_write: None,
            default_read: None,
            default_write: None,
            ignore_read: false,
            ignore_write: false,
            column_type: ColumnType::Unset,
            read_using: None,
            write_using: None,
            style: ColumnStyle::default(),
        }
    }

    /// Name of the bound field, if any
    pub fn field_name(&self) -> Option<&'static str> {
        self.field.as_ref().map(Field::name)
    }

    /// Caption used to locate the column on read: `name_read`, else the field name
    pub fn header_read(&self) -> Option<&str> {
        self.name_read.as_deref().or_else(|| self.field_name())
    }

    /// Caption written to the header row: `name_write`, else the field name, else empty
    pub fn header_write(&self) -> &str {
        self.name_write
            .as_deref()
            .or_else(|| self.field_name())
            .unwrap_or("")
    }

    /// Whether reading this column needs no cell lookup at all
    pub fn is_computed_on_read(&self) -> bool {
        self.constant_read.is_some() || self.read_using.is_some()
    }
}

impl<T> fmt::Debug for PropertyMapData<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyMapData")
            .field("field", &self.field)
            .field("index_read", &self.index_read)
            .field("index_write", &self.index_write)
            .field("name_read", &self.name_read)
            .field("name_write", &self.name_write)
            .field("constant_read", &self.constant_read)
            .field("constant_write", &self.constant_write)
            .field("default_read", &self.default_read)
            .field("default_write", &self.default_write)
            .field("ignore_read", &self.ignore_read)
            .field("ignore_write", &self.ignore_write)
            .field("column_type", &self.column_type)
            .field("read_using", &self.read_using.is_some())
            .field("write_using", &self.write_using.is_some())
            .finish_non_exhaustive()
    }
}

/// Fluent builder over one [`PropertyMapData`]
///
/// Every setter overwrites what was set before. The unsuffixed setters
/// (`index`, `name`, `constant`, ...) configure reading and writing at once.
#[derive(Debug)]
pub struct PropertyMap<T> {
    data: PropertyMapData<T>,
}

impl<T: 'static> PropertyMap<T> {
    pub(crate) fn new(field: Option<Field<T>>) -> Self {
        Self {
            data: PropertyMapData::new(field),
        }
    }

    pub fn data(&self) -> &PropertyMapData<T> {
        &self.data
    }

    pub fn index(&mut self, index: u32) -> &mut Self {
        self.data.index_read = index;
        self.data.index_write = index;
        self
    }

    pub fn index_read(&mut self, index: u32) -> &mut Self {
        self.data.index_read = index;
        self
    }

    pub fn index_write(&mut self, index: u32) -> &mut Self {
        self.data.index_write = index;
        self
    }

    pub fn name<S: Into<String>>(&mut self, name: S) -> &mut Self {
        let name = name.into();
        self.data.name_read = Some(name.clone());
        self.data.name_write = Some(name);
        self
    }

    pub fn name_read<S: Into<String>>(&mut self, name: S) -> &mut Self {
        self.data.name_read = Some(name.into());
        self
    }

    pub fn name_write<S: Into<String>>(&mut self, name: S) -> &mut Self {
        self.data.name_write = Some(name.into());
        self
    }

    pub fn constant<V: Into<Value>>(&mut self, value: V) -> &mut Self {
        let value = value.into();
        self.data.constant_read = Some(value.clone());
        self.data.constant_write = Some(value);
        self
    }

    pub fn constant_read<V: Into<Value>>(&mut self, value: V) -> &mut Self {
        self.data.constant_read = Some(value.into());
        self
    }

    pub fn constant_write<V: Into<Value>>(&mut self, value: V) -> &mut Self {
        self.data.constant_write = Some(value.into());
        self
    }

    pub fn default<V: Into<Value>>(&mut self, value: V) -> &mut Self {
        let value = value.into();
        self.data.default_read = Some(value.clone());
        self.data.default_write = Some(value);
        self
    }

    pub fn default_read<V: Into<Value>>(&mut self, value: V) -> &mut Self {
        self.data.default_read = Some(value.into());
        self
    }

    pub fn default_write<V: Into<Value>>(&mut self, value: V) -> &mut Self {
        self.data.default_write = Some(value.into());
        self
    }

    pub fn ignore(&mut self, ignore: bool) -> &mut Self {
        self.data.ignore_read = ignore;
        self.data.ignore_write = ignore;
        self
    }

    pub fn ignore_read(&mut self, ignore: bool) -> &mut Self {
        self.data.ignore_read = ignore;
        self
    }

    pub fn ignore_write(&mut self, ignore: bool) -> &mut Self {
        self.data.ignore_write = ignore;
        self
    }

    pub fn column_type(&mut self, column_type: ColumnType) -> &mut Self {
        self.data.column_type = column_type;
        self
    }

    pub fn style(&mut self, style: ColumnStyle) -> &mut Self {
        self.data.style = style;
        self
    }

    /// Compute the field from the whole row instead of one cell
    ///
    /// The result is converted through [`FieldValue`], so returning `None`
    /// from an `Option` converter clears an optional field.
    pub fn read_using<V, F>(&mut self, converter: F) -> &mut Self
    where
        V: FieldValue,
        F: Fn(&ReaderRow<'_>) -> Result<V> + 'static,
    {
        self.data.read_using = Some(Box::new(move |row: &ReaderRow<'_>| {
            converter(row).map(|value| value.to_value())
        }));
        self
    }

    /// Compute the written cell from the whole record
    pub fn write_using<V, F>(&mut self, converter: F) -> &mut Self
    where
        V: Into<Value>,
        F: Fn(&T) -> V + 'static,
    {
        self.data.write_using = Some(Box::new(move |record: &T| Some(converter(record).into())));
        self
    }
}
