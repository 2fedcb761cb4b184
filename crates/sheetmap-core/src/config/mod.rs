//! Class-map configuration
//!
//! A [`ClassMap`] lists, per record type, how fields bind to worksheet
//! columns. Each entry is a [`PropertyMapData`] configured through the
//! fluent [`PropertyMap`] builder. Maps are built once by a [`ClassMapper`]
//! and never change afterwards.

mod class_map;
mod field;
mod property_map;

pub use class_map::{ClassMap, ClassMapper};
pub use field::Field;
pub use property_map::{ColumnType, PropertyMap, PropertyMapData, ReadConverter, WriteConverter};
