//! Field values
//!
//! [`Value`] is the closed set of primitive kinds that can be bound to a
//! worksheet column: constants, defaults, converter results and parsed cell
//! text all travel as a `Value`. [`FieldValue`] converts between `Value` and
//! the concrete Rust type of a record field.

use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::error::{Error, Result};

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Kind tag of a [`Value`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Bool,
    Integer,
    Float,
    Decimal,
    Char,
    Text,
    DateTime,
    Enum,
}

impl ValueKind {
    /// Integer, floating point or decimal
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            ValueKind::Integer | ValueKind::Float | ValueKind::Decimal
        )
    }

    /// Whether a configured value of kind `other` may be assigned to a field of this kind
    pub fn accepts(self, other: ValueKind) -> bool {
        self == other || (self == ValueKind::Enum && other == ValueKind::Text)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Bool => "bool",
            ValueKind::Integer => "integer",
            ValueKind::Float => "float",
            ValueKind::Decimal => "decimal",
            ValueKind::Char => "char",
            ValueKind::Text => "text",
            ValueKind::DateTime => "date-time",
            ValueKind::Enum => "enum",
        };
        f.write_str(name)
    }
}

/// A single bound value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Decimal(Decimal),
    Char(char),
    Text(String),
    DateTime(NaiveDateTime),
    /// Enum member name
    Enum(String),
}

impl Value {
    /// Kind tag of this value
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Bool(_) => ValueKind::Bool,
            Value::Integer(_) => ValueKind::Integer,
            Value::Float(_) => ValueKind::Float,
            Value::Decimal(_) => ValueKind::Decimal,
            Value::Char(_) => ValueKind::Char,
            Value::Text(_) => ValueKind::Text,
            Value::DateTime(_) => ValueKind::DateTime,
            Value::Enum(_) => ValueKind::Enum,
        }
    }

    /// True for empty or whitespace-only text
    pub fn is_blank(&self) -> bool {
        matches!(self, Value::Text(s) if s.trim().is_empty())
    }

    /// Parse cell text into a value of the given kind
    ///
    /// # Examples
    /// ```
    /// use sheetmap_core::{Value, ValueKind};
    ///
    /// assert_eq!(Value::parse("1", ValueKind::Bool).unwrap(), Value::Bool(true));
    /// assert_eq!(Value::parse("false", ValueKind::Bool).unwrap(), Value::Bool(false));
    /// assert!(Value::parse("maybe", ValueKind::Bool).is_err());
    /// ```
    pub fn parse(text: &str, kind: ValueKind) -> Result<Value> {
        let value = match kind {
            ValueKind::Bool => Value::Bool(parse_bool(text)?),
            ValueKind::Integer => Value::Integer(parse_integer(text)?),
            ValueKind::Float => Value::Float(
                text.trim()
                    .parse::<f64>()
                    .map_err(|_| Error::conversion(text, kind))?,
            ),
            ValueKind::Decimal => Value::Decimal(parse_decimal(text)?),
            ValueKind::Char => Value::Char(parse_char(text)?),
            ValueKind::Text => Value::Text(text.to_string()),
            ValueKind::DateTime => Value::DateTime(parse_datetime(text)?),
            ValueKind::Enum => Value::Enum(text.trim().to_string()),
        };
        Ok(value)
    }

    /// Culture-invariant text form
    pub fn to_text(&self) -> String {
        match self {
            Value::Bool(b) => if *b { "True" } else { "False" }.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Decimal(d) => d.to_string(),
            Value::Char(c) => c.to_string(),
            Value::Text(s) | Value::Enum(s) => s.clone(),
            Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
        }
    }

    /// Coerce to a boolean
    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            Value::Integer(i) => Ok(*i != 0),
            Value::Text(s) => parse_bool(s),
            other => Err(Error::conversion(other.to_text(), ValueKind::Bool)),
        }
    }

    /// Coerce to a signed integer; floating values must be integral
    pub fn as_i64(&self) -> Result<i64> {
        let fail = || Error::conversion(self.to_text(), ValueKind::Integer);
        match self {
            Value::Integer(i) => Ok(*i),
            Value::Bool(b) => Ok(i64::from(*b)),
            Value::Float(f) if f.fract() == 0.0 => f.to_i64().ok_or_else(fail),
            Value::Decimal(d) if d.fract().is_zero() => d.to_i64().ok_or_else(fail),
            Value::Text(s) => parse_integer(s),
            _ => Err(fail()),
        }
    }

    /// Coerce to a double
    pub fn as_f64(&self) -> Result<f64> {
        match self {
            Value::Float(f) => Ok(*f),
            Value::Integer(i) => Ok(*i as f64),
            Value::Decimal(d) => d
                .to_f64()
                .ok_or_else(|| Error::conversion(d.to_string(), ValueKind::Float)),
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::DateTime(dt) => Ok(datetime_to_serial(*dt)),
            Value::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| Error::conversion(s.as_str(), ValueKind::Float)),
            other => Err(Error::conversion(other.to_text(), ValueKind::Float)),
        }
    }

    /// Coerce to a decimal
    pub fn as_decimal(&self) -> Result<Decimal> {
        match self {
            Value::Decimal(d) => Ok(*d),
            Value::Integer(i) => Ok(Decimal::from(*i)),
            Value::Float(f) => {
                Decimal::try_from(*f).map_err(|_| Error::conversion(f.to_string(), ValueKind::Decimal))
            }
            Value::Text(s) => parse_decimal(s),
            other => Err(Error::conversion(other.to_text(), ValueKind::Decimal)),
        }
    }

    /// Coerce to a date-time; numbers are read as day serials
    pub fn as_datetime(&self) -> Result<NaiveDateTime> {
        match self {
            Value::DateTime(dt) => Ok(*dt),
            Value::Float(f) => serial_to_datetime(*f)
                .ok_or_else(|| Error::conversion(f.to_string(), ValueKind::DateTime)),
            Value::Integer(i) => serial_to_datetime(*i as f64)
                .ok_or_else(|| Error::conversion(i.to_string(), ValueKind::DateTime)),
            Value::Text(s) => parse_datetime(s),
            other => Err(Error::conversion(other.to_text(), ValueKind::DateTime)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

macro_rules! value_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::$variant(v.into())
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    i32 => Integer,
    i64 => Integer,
    u32 => Integer,
    f64 => Float,
    f32 => Float,
    Decimal => Decimal,
    char => Char,
    String => Text,
    &str => Text,
    NaiveDateTime => DateTime,
}

impl From<NaiveDate> for Value {
    fn from(date: NaiveDate) -> Self {
        Value::DateTime(date.and_time(chrono::NaiveTime::MIN))
    }
}

// === Text conversions ===

/// `"true"`/`"false"` (any case) or an integer, true when non-zero
fn parse_bool(text: &str) -> Result<bool> {
    let trimmed = text.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        return Ok(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return Ok(false);
    }
    trimmed
        .parse::<i64>()
        .map(|i| i != 0)
        .map_err(|_| Error::conversion(text, ValueKind::Bool))
}

fn parse_integer(text: &str) -> Result<i64> {
    let trimmed = text.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Ok(i);
    }
    // Spreadsheet tools sometimes store integers as "5.0" or "1E3"
    match trimmed.parse::<f64>() {
        Ok(f) if f.fract() == 0.0 => f
            .to_i64()
            .ok_or_else(|| Error::conversion(text, ValueKind::Integer)),
        _ => Err(Error::conversion(text, ValueKind::Integer)),
    }
}

/// Parses straight into the target width so the full range of `u64` survives
fn parse_integer_as<T>(text: &str) -> Result<T>
where
    T: FromStr + TryFrom<i64>,
{
    if let Ok(n) = text.trim().parse::<T>() {
        return Ok(n);
    }
    let n = parse_integer(text)?;
    T::try_from(n).map_err(|_| Error::conversion(text, ValueKind::Integer))
}

fn parse_decimal(text: &str) -> Result<Decimal> {
    let trimmed = text.trim();
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|_| Error::conversion(text, ValueKind::Decimal))
}

fn parse_char(text: &str) -> Result<char> {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(Error::conversion(text, ValueKind::Char)),
    }
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// A date-time literal, or a numeric day serial
fn parse_datetime(text: &str) -> Result<NaiveDateTime> {
    let trimmed = text.trim();

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(dt);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Ok(date.and_time(chrono::NaiveTime::MIN));
        }
    }

    trimmed
        .parse::<f64>()
        .ok()
        .and_then(serial_to_datetime)
        .ok_or_else(|| Error::conversion(text, ValueKind::DateTime))
}

// === Day serials ===

fn serial_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .expect("1899-12-30 is a valid date")
        .and_time(chrono::NaiveTime::MIN)
}

/// Convert a date-time to a spreadsheet day serial (days since 1899-12-30).
///
/// Millisecond precision. Dates before the epoch use the OLE automation
/// encoding where the fractional part is always a positive time of day.
pub fn datetime_to_serial(dt: NaiveDateTime) -> f64 {
    let mut millis = dt.signed_duration_since(serial_epoch()).num_milliseconds();
    if millis < 0 {
        let frac = millis % MILLIS_PER_DAY;
        if frac != 0 {
            millis -= (MILLIS_PER_DAY + frac) * 2;
        }
    }
    millis as f64 / MILLIS_PER_DAY as f64
}

/// Convert a spreadsheet day serial back to a date-time, rounded to the millisecond
pub fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial.abs() > 2_958_466.0 {
        return None;
    }
    let mut millis = (serial * MILLIS_PER_DAY as f64 + if serial >= 0.0 { 0.5 } else { -0.5 }) as i64;
    if millis < 0 {
        millis -= (millis % MILLIS_PER_DAY) * 2;
    }
    serial_epoch().checked_add_signed(Duration::milliseconds(millis))
}

// === Field binding ===

/// Conversion between a record field type and [`Value`]
///
/// Implemented for the primitive field types and for `Option` of each of
/// them. Enums opt in through [`enum_field!`](crate::enum_field).
pub trait FieldValue: Sized + 'static {
    /// Kind of the underlying type (after unwrapping `Option`)
    const KIND: ValueKind;

    /// Whether the field can hold "no value"
    const OPTIONAL: bool = false;

    /// Current value, or `None` when the field holds no value
    fn to_value(&self) -> Option<Value>;

    /// Build the field from a value
    fn from_value(value: Value) -> Result<Self>;

    /// The "no value" state, for optional fields
    fn absent() -> Option<Self> {
        None
    }
}

macro_rules! integer_field {
    ($($t:ty),*) => {
        $(
            impl FieldValue for $t {
                const KIND: ValueKind = ValueKind::Integer;

                fn to_value(&self) -> Option<Value> {
                    Some(
                        i64::try_from(*self)
                            .map(Value::Integer)
                            .unwrap_or_else(|_| Value::Decimal(Decimal::from(*self))),
                    )
                }

                fn from_value(value: Value) -> Result<Self> {
                    match value {
                        Value::Text(s) => parse_integer_as::<$t>(&s),
                        Value::Decimal(d) if d.fract().is_zero() => {
                            parse_integer_as::<$t>(&d.trunc().to_string())
                        }
                        other => {
                            let n = other.as_i64()?;
                            <$t>::try_from(n)
                                .map_err(|_| Error::conversion(n.to_string(), ValueKind::Integer))
                        }
                    }
                }
            }
        )*
    };
}

integer_field!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl FieldValue for f64 {
    const KIND: ValueKind = ValueKind::Float;

    fn to_value(&self) -> Option<Value> {
        Some(Value::Float(*self))
    }

    fn from_value(value: Value) -> Result<Self> {
        value.as_f64()
    }
}

impl FieldValue for f32 {
    const KIND: ValueKind = ValueKind::Float;

    fn to_value(&self) -> Option<Value> {
        // Go through the shortest decimal form so 10.2f32 is written as 10.2
        Some(Value::Float(
            self.to_string().parse().unwrap_or(f64::from(*self)),
        ))
    }

    fn from_value(value: Value) -> Result<Self> {
        Ok(value.as_f64()? as f32)
    }
}

impl FieldValue for Decimal {
    const KIND: ValueKind = ValueKind::Decimal;

    fn to_value(&self) -> Option<Value> {
        Some(Value::Decimal(*self))
    }

    fn from_value(value: Value) -> Result<Self> {
        value.as_decimal()
    }
}

impl FieldValue for bool {
    const KIND: ValueKind = ValueKind::Bool;

    fn to_value(&self) -> Option<Value> {
        Some(Value::Bool(*self))
    }

    fn from_value(value: Value) -> Result<Self> {
        value.as_bool()
    }
}

impl FieldValue for char {
    const KIND: ValueKind = ValueKind::Char;

    /// `'\0'` is the "unset" sentinel and reads as no value
    fn to_value(&self) -> Option<Value> {
        if *self == '\0' {
            None
        } else {
            Some(Value::Char(*self))
        }
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Char(c) => Ok(c),
            Value::Text(s) => parse_char(&s),
            other => Err(Error::conversion(other.to_text(), ValueKind::Char)),
        }
    }
}

impl FieldValue for String {
    const KIND: ValueKind = ValueKind::Text;

    fn to_value(&self) -> Option<Value> {
        Some(Value::Text(self.clone()))
    }

    fn from_value(value: Value) -> Result<Self> {
        Ok(match value {
            Value::Text(s) | Value::Enum(s) => s,
            other => other.to_text(),
        })
    }
}

impl FieldValue for NaiveDateTime {
    const KIND: ValueKind = ValueKind::DateTime;

    fn to_value(&self) -> Option<Value> {
        Some(Value::DateTime(*self))
    }

    fn from_value(value: Value) -> Result<Self> {
        value.as_datetime()
    }
}

impl FieldValue for NaiveDate {
    const KIND: ValueKind = ValueKind::DateTime;

    fn to_value(&self) -> Option<Value> {
        Some(Value::from(*self))
    }

    fn from_value(value: Value) -> Result<Self> {
        Ok(value.as_datetime()?.date())
    }
}

impl<T: FieldValue> FieldValue for Option<T> {
    const KIND: ValueKind = T::KIND;
    const OPTIONAL: bool = true;

    fn to_value(&self) -> Option<Value> {
        self.as_ref().and_then(FieldValue::to_value)
    }

    fn from_value(value: Value) -> Result<Self> {
        T::from_value(value).map(Some)
    }

    fn absent() -> Option<Self> {
        Some(None)
    }
}

/// Implement [`FieldValue`] for a fieldless enum, converting by member name.
///
/// ```
/// use sheetmap_core::{enum_field, FieldValue, Value};
///
/// #[derive(Debug, PartialEq)]
/// enum Shape { Circle, Square }
/// enum_field!(Shape { Circle, Square });
///
/// assert_eq!(Shape::Square.to_value(), Some(Value::Enum("Square".into())));
/// assert_eq!(Shape::from_value(Value::Text("Circle".into())).unwrap(), Shape::Circle);
/// ```
#[macro_export]
macro_rules! enum_field {
    ($ty:ident { $($variant:ident),+ $(,)? }) => {
        impl $crate::value::FieldValue for $ty {
            const KIND: $crate::value::ValueKind = $crate::value::ValueKind::Enum;

            fn to_value(&self) -> ::std::option::Option<$crate::value::Value> {
                let name = match self {
                    $($ty::$variant => stringify!($variant),)+
                };
                ::std::option::Option::Some($crate::value::Value::Enum(name.to_string()))
            }

            fn from_value(value: $crate::value::Value) -> $crate::error::Result<Self> {
                let name = match value {
                    $crate::value::Value::Enum(s) | $crate::value::Value::Text(s) => s,
                    other => other.to_text(),
                };
                match name.as_str() {
                    $(stringify!($variant) => ::std::result::Result::Ok($ty::$variant),)+
                    _ => ::std::result::Result::Err($crate::error::Error::conversion(
                        name,
                        $crate::value::ValueKind::Enum,
                    )),
                }
            }
        }
    };
}
