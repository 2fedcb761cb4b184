//! Field accessors

use std::fmt;

use crate::error::Result;
use crate::value::{FieldValue, Value, ValueKind};

type Getter<T> = Box<dyn Fn(&T) -> Option<Value>>;
type Setter<T> = Box<dyn Fn(&mut T, Option<Value>) -> Result<()>>;

/// A record field bound once at configuration time
///
/// Holds a getter/setter pair that converts through [`Value`], so rows can be
/// bound without any lookup by name. Create one with [`Field::new`] or the
/// [`field!`](crate::field) macro.
pub struct Field<T> {
    name: &'static str,
    kind: ValueKind,
    optional: bool,
    get: Getter<T>,
    set: Setter<T>,
}

impl<T: 'static> Field<T> {
    /// Bind a field through a pair of projections
    ///
    /// ```
    /// use sheetmap_core::Field;
    ///
    /// #[derive(Default)]
    /// struct Order { quantity: u32 }
    ///
    /// let field = Field::new("quantity", |o: &Order| &o.quantity, |o: &mut Order| &mut o.quantity);
    /// assert_eq!(field.name(), "quantity");
    /// ```
    pub fn new<V: FieldValue>(
        name: &'static str,
        get: for<'a> fn(&'a T) -> &'a V,
        get_mut: for<'a> fn(&'a mut T) -> &'a mut V,
    ) -> Self {
        Self {
            name,
            kind: V::KIND,
            optional: V::OPTIONAL,
            get: Box::new(move |record: &T| get(record).to_value()),
            set: Box::new(move |record: &mut T, value: Option<Value>| {
                match value {
                    Some(value) => *get_mut(record) = V::from_value(value)?,
                    None => {
                        if let Some(absent) = V::absent() {
                            *get_mut(record) = absent;
                        }
                    }
                }
                Ok(())
            }),
        }
    }
}

impl<T> Field<T> {
    /// Member name, also the fallback header caption
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Kind of the field after unwrapping `Option`
    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Current value, `None` when the field holds no value
    pub fn get(&self, record: &T) -> Option<Value> {
        (self.get)(record)
    }

    /// Assign a value; `None` clears optional fields and leaves others untouched
    pub fn set(&self, record: &mut T, value: Option<Value>) -> Result<()> {
        (self.set)(record, value)
    }
}

impl<T> fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("optional", &self.optional)
            .finish()
    }
}

/// Build a [`Field`] for a struct member
///
/// ```
/// use sheetmap_core::field;
///
/// #[derive(Default)]
/// struct Order { note: Option<String> }
///
/// let note = field!(Order, note);
/// assert!(note.is_optional());
/// ```
#[macro_export]
macro_rules! field {
    ($ty:ty, $member:ident) => {
        $crate::config::Field::<$ty>::new(
            stringify!($member),
            |record: &$ty| &record.$member,
            |record: &mut $ty| &mut record.$member,
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[derive(Debug, Default, PartialEq)]
    struct Sample {
        count: i32,
        ratio: Option<f64>,
        day: Option<NaiveDate>,
    }

    #[test]
    fn test_get_and_set() {
        let count = crate::field!(Sample, count);
        let mut sample = Sample::default();

        count.set(&mut sample, Some(Value::Text("17".into()))).unwrap();
        assert_eq!(sample.count, 17);
        assert_eq!(count.get(&sample), Some(Value::Integer(17)));
        assert_eq!(count.kind(), ValueKind::Integer);
        assert!(!count.is_optional());
    }

    #[test]
    fn test_none_clears_only_optional_fields() {
        let count = crate::field!(Sample, count);
        let ratio = crate::field!(Sample, ratio);
        let mut sample = Sample {
            count: 4,
            ratio: Some(0.5),
            day: None,
        };

        count.set(&mut sample, None).unwrap();
        ratio.set(&mut sample, None).unwrap();
        assert_eq!(sample.count, 4);
        assert_eq!(sample.ratio, None);
    }

    #[test]
    fn test_conversion_failure_propagates() {
        let day = crate::field!(Sample, day);
        let mut sample = Sample::default();
        assert!(day.set(&mut sample, Some(Value::Text("soon".into()))).is_err());
        assert_eq!(day.kind(), ValueKind::DateTime);
    }
}
