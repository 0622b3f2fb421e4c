//! Dynamic values passed to and returned from steps.
//!
//! [`Value`] is a closed set of variants: scalars, the container kinds that deep
//! substitution walks (list, tuple, named record, map and set), and
//! [`Value::Var`], an unresolved placeholder. Containers are plain owned data, so a value
//! can never refer back to itself.

use indexmap::IndexMap;
use serde_json::{Map as JsonMap, Number, Value as JsonValue};

use crate::error::{PipelineError, Result};
use crate::placeholder::{Attribute, Placeholder, Variable};

/// A dynamically typed value.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Ordered, growable sequence.
    List(Vec<Value>),
    /// Fixed-arity sequence without field names.
    Tuple(Vec<Value>),
    /// Fixed-arity record with a type name and named fields.
    Record(Record),
    /// Insertion-ordered mapping keyed by strings.
    Map(IndexMap<String, Value>),
    /// Unordered collection without duplicates.
    Set(ValueSet),
    /// Unresolved placeholder, compared by identity.
    Var(Placeholder),
}

impl Value {
    /// Builds a tuple from anything convertible to values.
    pub fn tuple<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Value::Tuple(items.into_iter().map(Into::into).collect())
    }

    /// Builds a list from anything convertible to values.
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Value::List(items.into_iter().map(Into::into).collect())
    }

    /// Builds a set, collapsing duplicates.
    pub fn set<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Value::Set(items.into_iter().map(Into::into).collect())
    }

    /// Builds a map, keeping the order of `entries`.
    pub fn map<I, K, T>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, T)>,
        K: Into<String>,
        T: Into<Value>,
    {
        Value::Map(entries.into_iter().map(|(key, value)| (key.into(), value.into())).collect())
    }

    /// Short lowercase name of the variant, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Record(_) => "record",
            Value::Map(_) => "map",
            Value::Set(_) => "set",
            Value::Var(_) => "placeholder",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the placeholder when this value is a bare handle.
    pub fn as_placeholder(&self) -> Option<&Placeholder> {
        match self {
            Value::Var(placeholder) => Some(placeholder),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(flag) => Some(*flag),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(number) => Some(*number),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(text) => Some(text.as_str()),
            _ => None,
        }
    }

    /// Truthiness: null, `false`, zero, empty strings and empty containers are false.
    /// Placeholders are always true; resolve them first when their value matters.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(flag) => *flag,
            Value::Int(number) => *number != 0,
            Value::Float(number) => *number != 0.0,
            Value::Str(text) => !text.is_empty(),
            Value::List(items) | Value::Tuple(items) => !items.is_empty(),
            Value::Record(record) => !record.is_empty(),
            Value::Map(entries) => !entries.is_empty(),
            Value::Set(items) => !items.is_empty(),
            Value::Var(_) => true,
        }
    }

    /// Converts to JSON. Tuples and sets become arrays and records become objects.
    ///
    /// # Errors
    ///
    /// Fails with [`PipelineError::LeakedHandle`] if an unresolved placeholder is found.
    pub fn to_json(&self) -> Result<JsonValue> {
        let json = match self {
            Value::Null => JsonValue::Null,
            Value::Bool(flag) => JsonValue::Bool(*flag),
            Value::Int(number) => JsonValue::Number(Number::from(*number)),
            Value::Float(number) => Number::from_f64(*number).map(JsonValue::Number).unwrap_or(JsonValue::Null),
            Value::Str(text) => JsonValue::String(text.clone()),
            Value::List(items) | Value::Tuple(items) => JsonValue::Array(items.iter().map(Value::to_json).collect::<Result<_>>()?),
            Value::Set(items) => JsonValue::Array(items.iter().map(Value::to_json).collect::<Result<_>>()?),
            Value::Record(record) => {
                let mut object = JsonMap::new();
                for (name, value) in record.fields() {
                    object.insert(name.clone(), value.to_json()?);
                }
                JsonValue::Object(object)
            }
            Value::Map(entries) => {
                let mut object = JsonMap::new();
                for (key, value) in entries {
                    object.insert(key.clone(), value.to_json()?);
                }
                JsonValue::Object(object)
            }
            Value::Var(placeholder) => {
                return Err(PipelineError::LeakedHandle {
                    step: "json conversion".to_string(),
                    name: placeholder.name().to_string(),
                });
            }
        };
        Ok(json)
    }
}

/// Named fixed-arity record. Field order is part of the record's identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    type_name: String,
    fields: IndexMap<String, Value>,
}

impl Record {
    pub fn new<I, K, T>(type_name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, T)>,
        K: Into<String>,
        T: Into<Value>,
    {
        Self {
            type_name: type_name.into(),
            fields: fields.into_iter().map(|(name, value)| (name.into(), value.into())).collect(),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn fields(&self) -> &IndexMap<String, Value> {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Replaces an existing field. Records are fixed-arity, so unknown names are rejected.
    pub fn replace(&mut self, name: &str, value: Value) -> bool {
        match self.fields.get_mut(name) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Rebuilds a record of the same type and field names with new values.
    pub(crate) fn with_values(&self, values: impl IntoIterator<Item = Value>) -> Self {
        Self {
            type_name: self.type_name.clone(),
            fields: self.fields.keys().cloned().zip(values).collect(),
        }
    }
}

/// Set of values with set equality.
///
/// Values are neither hashable nor ordered (floats and identity-compared placeholders), so
/// membership is decided by equality; duplicates collapse on insert. An `Int` and a `Float`
/// with the same numeric value count as the same member, and the first one inserted is kept.
#[derive(Debug, Clone, Default)]
pub struct ValueSet {
    items: Vec<Value>,
}

impl ValueSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `value` unless an equal value is present. Returns whether it was added.
    pub fn insert(&mut self, value: Value) -> bool {
        if self.contains(&value) {
            return false;
        }
        self.items.push(value);
        true
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.items.iter().any(|item| same_member(item, value))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.items.iter()
    }
}

fn same_member(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Int(integer), Value::Float(float)) | (Value::Float(float), Value::Int(integer)) => {
            *integer as f64 == *float
        }
        _ => left == right,
    }
}

impl PartialEq for ValueSet {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.items.iter().all(|item| other.contains(item))
    }
}

impl FromIterator<Value> for ValueSet {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        let mut set = ValueSet::new();
        for value in iter {
            set.insert(value);
        }
        set
    }
}

impl IntoIterator for ValueSet {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a ValueSet {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl From<bool> for Value {
    fn from(flag: bool) -> Self {
        Value::Bool(flag)
    }
}

impl From<i32> for Value {
    fn from(number: i32) -> Self {
        Value::Int(i64::from(number))
    }
}

impl From<i64> for Value {
    fn from(number: i64) -> Self {
        Value::Int(number)
    }
}

impl From<f64> for Value {
    fn from(number: f64) -> Self {
        Value::Float(number)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Str(text.to_string())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::Str(text)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Record(record)
    }
}

impl From<ValueSet> for Value {
    fn from(set: ValueSet) -> Self {
        Value::Set(set)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(entries: IndexMap<String, Value>) -> Self {
        Value::Map(entries)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(option: Option<T>) -> Self {
        option.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<Placeholder> for Value {
    fn from(placeholder: Placeholder) -> Self {
        Value::Var(placeholder)
    }
}

impl From<&Placeholder> for Value {
    fn from(placeholder: &Placeholder) -> Self {
        Value::Var(placeholder.clone())
    }
}

impl From<Variable> for Value {
    fn from(variable: Variable) -> Self {
        Value::Var(Placeholder::Variable(variable))
    }
}

impl From<&Variable> for Value {
    fn from(variable: &Variable) -> Self {
        Value::Var(Placeholder::Variable(variable.clone()))
    }
}

impl From<Attribute> for Value {
    fn from(attribute: Attribute) -> Self {
        Value::Var(Placeholder::Attribute(attribute))
    }
}

impl From<&Attribute> for Value {
    fn from(attribute: &Attribute) -> Self {
        Value::Var(Placeholder::Attribute(attribute.clone()))
    }
}

impl From<JsonValue> for Value {
    fn from(json: JsonValue) -> Self {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(flag) => Value::Bool(flag),
            JsonValue::Number(number) => match number.as_i64() {
                Some(integer) => Value::Int(integer),
                None => Value::Float(number.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(text) => Value::Str(text),
            JsonValue::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            JsonValue::Object(object) => Value::Map(object.into_iter().map(|(key, value)| (key, Value::from(value))).collect()),
        }
    }
}
