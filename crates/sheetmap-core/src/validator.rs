//! Class-map validation
//!
//! Checks a [`ClassMap`] for internal consistency before any worksheet is
//! touched. Every problem is collected; nothing stops at the first one.

use std::fmt;

use crate::config::{ClassMap, PropertyMapData};
use crate::value::{Value, ValueKind};
use crate::{MAX_COLUMNS, MAX_HEADER_LEN};

/// Which configured value failed a type check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
    Constant,
    Default,
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Setting::Constant => f.write_str("Constant"),
            Setting::Default => f.write_str("Default"),
        }
    }
}

/// A single class-map inconsistency
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Two active maps claim the same explicit column
    DuplicateIndex { index: u32 },
    /// A field is bound for reading more than once
    DuplicateReadField { field: String },
    /// Explicit index above the column limit
    IndexOutOfRange { field: String, index: u32 },
    /// Header caption above the length limit
    HeaderTooLong { field: String, header: String },
    /// Constant or default of the wrong kind for the bound field
    TypeMismatch {
        field: String,
        setting: Setting,
        expected: ValueKind,
        actual: ValueKind,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::DuplicateIndex { index } => {
                write!(f, "Column index {} is defined for multiple properties", index)
            }
            ConfigError::DuplicateReadField { field } => {
                write!(f, "Read property '{}' is mapped to more than one column", field)
            }
            ConfigError::IndexOutOfRange { field, index } => write!(
                f,
                "Property '{}' has column index {}, greater than the maximum of {}",
                field, index, MAX_COLUMNS
            ),
            ConfigError::HeaderTooLong { field, header } => write!(
                f,
                "Property '{}' has a {} character header name, longer than the maximum of {}",
                field,
                header.chars().count(),
                MAX_HEADER_LEN
            ),
            ConfigError::TypeMismatch {
                field,
                setting,
                expected,
                actual,
            } => write!(
                f,
                "{} of type {} does not match property '{}' of type {}",
                setting, actual, field, expected
            ),
        }
    }
}

#[derive(Clone, Copy)]
enum Pass {
    Read,
    Write,
}

/// Check a class map; an empty list means it is valid
///
/// The read and write passes run independently. A problem both passes report
/// identically, such as an out-of-range index set through `index()`, is listed
/// once.
pub fn validate<T: 'static>(map: &ClassMap<T>) -> Vec<ConfigError> {
    let mut errors = Vec::new();
    validate_pass(map, Pass::Read, &mut errors);
    validate_pass(map, Pass::Write, &mut errors);
    errors
}

fn validate_pass<T: 'static>(map: &ClassMap<T>, pass: Pass, errors: &mut Vec<ConfigError>) {
    let active: Vec<&PropertyMapData<T>> = match pass {
        Pass::Read => map.read_maps().collect(),
        Pass::Write => map.write_maps().collect(),
    };

    let index_of = |m: &PropertyMapData<T>| match pass {
        Pass::Read => m.index_read,
        Pass::Write => m.index_write,
    };

    let mut seen_indices = Vec::new();
    for index in active.iter().map(|m| index_of(m)).filter(|&i| i > 0) {
        if seen_indices.contains(&index) {
            push_unique(errors, ConfigError::DuplicateIndex { index });
        } else {
            seen_indices.push(index);
        }
    }

    if let Pass::Read = pass {
        let mut seen_fields = Vec::new();
        for name in active.iter().filter_map(|m| m.field_name()) {
            if seen_fields.contains(&name) {
                push_unique(
                    errors,
                    ConfigError::DuplicateReadField {
                        field: name.to_string(),
                    },
                );
            } else {
                seen_fields.push(name);
            }
        }
    }

    for data in &active {
        let field = data.field_name().unwrap_or("(unbound)").to_string();

        let index = index_of(data);
        if index > MAX_COLUMNS {
            push_unique(
                errors,
                ConfigError::IndexOutOfRange {
                    field: field.clone(),
                    index,
                },
            );
        }

        let header = match pass {
            Pass::Read => data.header_read(),
            Pass::Write => Some(data.header_write()),
        };
        if let Some(header) = header {
            if header.chars().count() > MAX_HEADER_LEN {
                push_unique(
                    errors,
                    ConfigError::HeaderTooLong {
                        field: field.clone(),
                        header: header.to_string(),
                    },
                );
            }
        }

        let (constant, default) = match pass {
            Pass::Read => (&data.constant_read, &data.default_read),
            Pass::Write => (&data.constant_write, &data.default_write),
        };
        if let Some(bound) = &data.field {
            check_kind(errors, &field, bound.kind(), Setting::Constant, constant);
            check_kind(errors, &field, bound.kind(), Setting::Default, default);
        }
    }
}

fn check_kind(
    errors: &mut Vec<ConfigError>,
    field: &str,
    expected: ValueKind,
    setting: Setting,
    value: &Option<Value>,
) {
    if let Some(value) = value {
        let actual = value.kind();
        if !expected.accepts(actual) {
            push_unique(
                errors,
                ConfigError::TypeMismatch {
                    field: field.to_string(),
                    setting,
                    expected,
                    actual,
                },
            );
        }
    }
}

fn push_unique(errors: &mut Vec<ConfigError>, error: ConfigError) {
    if !errors.contains(&error) {
        errors.push(error);
    }
}
