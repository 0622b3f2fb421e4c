//! Field access on application contexts.
//!
//! An [`Attribute`](crate::Attribute) reads and writes its value through the context a step
//! runs against. Contexts expose that capability by implementing [`ContextFields`]:
//!
//! - keyed mappings (`IndexMap`, `HashMap`, `BTreeMap`, `serde_json::Map`, and
//!   [`Value::Map`]/[`Value::Record`]) resolve names as keys;
//! - plain structs get an object-style adapter from [`context_fields!`](crate::context_fields),
//!   which maps names to struct fields;
//! - contexts without fields implement the trait with no methods and report
//!   [`FieldError::Unsupported`] if an attribute is ever used against them.

use std::collections::{BTreeMap, HashMap};

use indexmap::IndexMap;
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::error::FieldError;
use crate::value::Value;

/// Get-by-name and set-by-name access to a context.
pub trait ContextFields {
    /// Reads the field or key `name`.
    fn get_field(&self, name: &str) -> Result<Value, FieldError> {
        Err(FieldError::Unsupported {
            field: name.to_string(),
            context: std::any::type_name::<Self>(),
        })
    }

    /// Writes `value` into the field or key `name`.
    fn set_field(&mut self, name: &str, value: Value) -> Result<(), FieldError> {
        let _ = value;
        Err(FieldError::Unsupported {
            field: name.to_string(),
            context: std::any::type_name::<Self>(),
        })
    }
}

impl ContextFields for () {}

impl ContextFields for IndexMap<String, Value> {
    fn get_field(&self, name: &str) -> Result<Value, FieldError> {
        self.get(name).cloned().ok_or_else(|| missing(name))
    }

    fn set_field(&mut self, name: &str, value: Value) -> Result<(), FieldError> {
        self.insert(name.to_string(), value);
        Ok(())
    }
}

impl ContextFields for HashMap<String, Value> {
    fn get_field(&self, name: &str) -> Result<Value, FieldError> {
        self.get(name).cloned().ok_or_else(|| missing(name))
    }

    fn set_field(&mut self, name: &str, value: Value) -> Result<(), FieldError> {
        self.insert(name.to_string(), value);
        Ok(())
    }
}

impl ContextFields for BTreeMap<String, Value> {
    fn get_field(&self, name: &str) -> Result<Value, FieldError> {
        self.get(name).cloned().ok_or_else(|| missing(name))
    }

    fn set_field(&mut self, name: &str, value: Value) -> Result<(), FieldError> {
        self.insert(name.to_string(), value);
        Ok(())
    }
}

impl ContextFields for JsonMap<String, JsonValue> {
    fn get_field(&self, name: &str) -> Result<Value, FieldError> {
        self.get(name).cloned().map(Value::from).ok_or_else(|| missing(name))
    }

    fn set_field(&mut self, name: &str, value: Value) -> Result<(), FieldError> {
        let json = value.to_json().map_err(|_| FieldError::Type {
            field: name.to_string(),
            expected: "a JSON-representable value",
        })?;
        self.insert(name.to_string(), json);
        Ok(())
    }
}

impl ContextFields for Value {
    fn get_field(&self, name: &str) -> Result<Value, FieldError> {
        match self {
            Value::Map(entries) => entries.get_field(name),
            Value::Record(record) => record.get(name).cloned().ok_or_else(|| missing(name)),
            other => Err(FieldError::Unsupported {
                field: name.to_string(),
                context: other.kind(),
            }),
        }
    }

    fn set_field(&mut self, name: &str, value: Value) -> Result<(), FieldError> {
        match self {
            Value::Map(entries) => entries.set_field(name, value),
            Value::Record(record) => {
                if record.replace(name, value) {
                    Ok(())
                } else {
                    Err(missing(name))
                }
            }
            other => Err(FieldError::Unsupported {
                field: name.to_string(),
                context: other.kind(),
            }),
        }
    }
}

fn missing(name: &str) -> FieldError {
    FieldError::Missing { field: name.to_string() }
}

/// Conversion between struct field types and [`Value`], used by
/// [`context_fields!`](crate::context_fields).
pub trait FieldValue: Sized {
    fn to_value(&self) -> Value;

    /// Returns `None` when `value` does not fit this type.
    fn from_value(value: Value) -> Option<Self>;
}

impl FieldValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }

    fn from_value(value: Value) -> Option<Self> {
        Some(value)
    }
}

impl FieldValue for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: Value) -> Option<Self> {
        value.as_bool()
    }
}

impl FieldValue for i64 {
    fn to_value(&self) -> Value {
        Value::Int(*self)
    }

    fn from_value(value: Value) -> Option<Self> {
        value.as_i64()
    }
}

impl FieldValue for i32 {
    fn to_value(&self) -> Value {
        Value::Int(i64::from(*self))
    }

    fn from_value(value: Value) -> Option<Self> {
        value.as_i64().and_then(|number| i32::try_from(number).ok())
    }
}

impl FieldValue for f64 {
    fn to_value(&self) -> Value {
        Value::Float(*self)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Float(number) => Some(number),
            Value::Int(number) => Some(number as f64),
            _ => None,
        }
    }
}

impl FieldValue for String {
    fn to_value(&self) -> Value {
        Value::Str(self.clone())
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Str(text) => Some(text),
            _ => None,
        }
    }
}

impl<T: FieldValue> FieldValue for Option<T> {
    fn to_value(&self) -> Value {
        self.as_ref().map(FieldValue::to_value).unwrap_or(Value::Null)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: FieldValue> FieldValue for Vec<T> {
    fn to_value(&self) -> Value {
        Value::List(self.iter().map(FieldValue::to_value).collect())
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::List(items) | Value::Tuple(items) => items.into_iter().map(T::from_value).collect(),
            _ => None,
        }
    }
}

/// Implements [`ContextFields`] for a struct by mapping names to the listed fields.
///
/// Each listed field must implement [`FieldValue`]. Names that are not listed are reported
/// as [`FieldError::Missing`].
///
/// ```rust
/// use fpipe_engine::{ContextFields, Value, context_fields};
///
/// #[derive(Default)]
/// struct Order {
///     total: i64,
///     note: Option<String>,
/// }
///
/// context_fields!(Order { total, note });
///
/// let mut order = Order::default();
/// order.set_field("total", Value::Int(42)).unwrap();
/// assert_eq!(order.get_field("total").unwrap(), Value::Int(42));
/// assert_eq!(order.get_field("note").unwrap(), Value::Null);
/// ```
#[macro_export]
macro_rules! context_fields {
    ($context:ty { $($field:ident),* $(,)? }) => {
        impl $crate::ContextFields for $context {
            fn get_field(&self, name: &str) -> ::std::result::Result<$crate::Value, $crate::FieldError> {
                match name {
                    $(stringify!($field) => Ok($crate::FieldValue::to_value(&self.$field)),)*
                    _ => Err($crate::FieldError::Missing { field: name.to_string() }),
                }
            }

            fn set_field(&mut self, name: &str, value: $crate::Value) -> ::std::result::Result<(), $crate::FieldError> {
                match name {
                    $(stringify!($field) => {
                        self.$field = match $crate::FieldValue::from_value(value) {
                            Some(converted) => converted,
                            None => {
                                return Err($crate::FieldError::Type {
                                    field: name.to_string(),
                                    expected: ::std::any::type_name_of_val(&self.$field),
                                });
                            }
                        };
                        Ok(())
                    })*
                    _ => {
                        let _ = value;
                        Err($crate::FieldError::Missing { field: name.to_string() })
                    }
                }
            }
        }
    };
}
