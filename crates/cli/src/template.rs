//! JSON encoding of templates.
//!
//! Templates are ordinary JSON with four tagged single-key objects:
//! `{"$var": "n"}` and `{"$attr": "n"}` name placeholders in the current scope, and
//! `{"$tuple": [...]}` and `{"$set": [...]}` build the containers JSON lacks.

use anyhow::{Result, bail};
use fpipe_engine::{Value, VariableContext};
use serde_json::Value as JsonValue;

const VAR_TAG: &str = "$var";
const ATTR_TAG: &str = "$attr";
const TUPLE_TAG: &str = "$tuple";
const SET_TAG: &str = "$set";

/// Converts a JSON template into a [`Value`], minting placeholders in `scope`.
pub fn decode(scope: &VariableContext, template: &JsonValue) -> Result<Value> {
    match template {
        JsonValue::Array(items) => Ok(Value::List(decode_items(scope, items)?)),
        JsonValue::Object(entries) => {
            if entries.len() == 1
                && let Some((tag, body)) = entries.iter().next()
                && tag.starts_with('$')
            {
                return decode_tagged(scope, tag, body);
            }
            let mut decoded = indexmap::IndexMap::with_capacity(entries.len());
            for (key, entry) in entries {
                decoded.insert(key.clone(), decode(scope, entry)?);
            }
            Ok(Value::Map(decoded))
        }
        scalar => Ok(Value::from(scalar.clone())),
    }
}

fn decode_tagged(scope: &VariableContext, tag: &str, body: &JsonValue) -> Result<Value> {
    match (tag, body) {
        (VAR_TAG, JsonValue::String(name)) => Ok(Value::from(scope.variable(name)?)),
        (ATTR_TAG, JsonValue::String(name)) => Ok(Value::from(scope.attribute(name)?)),
        (TUPLE_TAG, JsonValue::Array(items)) => Ok(Value::Tuple(decode_items(scope, items)?)),
        (SET_TAG, JsonValue::Array(items)) => Ok(Value::set(decode_items(scope, items)?)),
        (VAR_TAG | ATTR_TAG, _) => bail!("'{tag}' expects a placeholder name"),
        (TUPLE_TAG | SET_TAG, _) => bail!("'{tag}' expects an array"),
        _ => bail!("unknown template tag '{tag}'"),
    }
}

fn decode_items(scope: &VariableContext, items: &[JsonValue]) -> Result<Vec<Value>> {
    items.iter().map(|item| decode(scope, item)).collect()
}
