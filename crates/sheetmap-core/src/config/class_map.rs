//! Class maps

use std::any::type_name;

use crate::config::{Field, PropertyMap, PropertyMapData};

/// The ordered column bindings for one record type
///
/// ```
/// use sheetmap_core::{field, ClassMap, ClassMapper};
///
/// #[derive(Default)]
/// struct Person { name: String, age: u32 }
///
/// struct PersonMap;
///
/// impl ClassMapper for PersonMap {
///     type Record = Person;
///
///     fn configure(map: &mut ClassMap<Person>) {
///         map.map(field!(Person, name)).index(1).name("Name");
///         map.map(field!(Person, age)).index(2);
///         map.map_constant().index(3).name("Source").constant("import");
///     }
/// }
///
/// let map = PersonMap::build();
/// assert_eq!(map.len(), 3);
/// ```
#[derive(Debug)]
pub struct ClassMap<T> {
    name: &'static str,
    maps: Vec<PropertyMap<T>>,
}

impl<T: 'static> ClassMap<T> {
    /// Create an empty map named after the record type
    pub fn new() -> Self {
        Self::named(type_name::<T>())
    }

    /// Create an empty map with a display name used in error messages
    pub fn named(name: &'static str) -> Self {
        Self {
            name,
            maps: Vec::new(),
        }
    }

    /// Bind a field to a column
    pub fn map(&mut self, field: Field<T>) -> &mut PropertyMap<T> {
        self.push(PropertyMap::new(Some(field)))
    }

    /// Add a column not bound to any field, e.g. a constant
    pub fn map_constant(&mut self) -> &mut PropertyMap<T> {
        self.push(PropertyMap::new(None))
    }

    fn push(&mut self, map: PropertyMap<T>) -> &mut PropertyMap<T> {
        self.maps.push(map);
        let last = self.maps.len() - 1;
        &mut self.maps[last]
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Property maps in declaration order
    pub fn property_maps(&self) -> impl Iterator<Item = &PropertyMapData<T>> {
        self.maps.iter().map(PropertyMap::data)
    }

    /// Property map at `position` in declaration order
    pub fn get(&self, position: usize) -> Option<&PropertyMapData<T>> {
        self.maps.get(position).map(PropertyMap::data)
    }

    /// Maps taking part in reading
    pub fn read_maps(&self) -> impl Iterator<Item = &PropertyMapData<T>> {
        self.property_maps().filter(|m| !m.ignore_read)
    }

    /// Maps taking part in writing
    pub fn write_maps(&self) -> impl Iterator<Item = &PropertyMapData<T>> {
        self.property_maps().filter(|m| !m.ignore_write)
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }
}

impl<T: 'static> Default for ClassMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Declares how a record type binds to worksheet columns
///
/// Implemented on a marker type so one record type can have several
/// mappings. The spreadsheet facade builds and validates each mapper once.
pub trait ClassMapper: 'static {
    type Record: 'static;

    /// Add the column bindings
    fn configure(map: &mut ClassMap<Self::Record>);

    /// Build the class map, named after the mapper
    fn build() -> ClassMap<Self::Record> {
        let mut map = ClassMap::named(type_name::<Self>());
        Self::configure(&mut map);
        map
    }
}
