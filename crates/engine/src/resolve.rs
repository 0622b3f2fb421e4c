//! Deep placeholder substitution.
//!
//! [`eval_vars`] walks a value and replaces every placeholder with its current value,
//! wherever it appears. Containers are rebuilt as the same kind: lists stay lists,
//! tuples stay tuples, records keep their type and field names, map keys are copied
//! verbatim, and sets are rebuilt so values that become equal after resolution collapse.
//! The input is never modified.

use indexmap::IndexMap;

use crate::error::Result;
use crate::fields::ContextFields;
use crate::value::{Value, ValueSet};

/// Resolves every placeholder inside `value` against `context`.
///
/// Variables read their scope storage and attributes read `context`. A placeholder whose
/// value itself contains placeholders is resolved recursively.
///
/// # Errors
///
/// Fails on the first placeholder that cannot be read: an unset variable, a handle whose
/// scope is closed, or an attribute the context cannot supply.
///
/// # Examples
///
/// ```rust
/// use fpipe_engine::{Value, Variable, eval_vars};
///
/// let total = Variable::with_value("total", 77);
/// let shape = Value::tuple([Value::Int(3), Value::from(&total)]);
/// assert_eq!(eval_vars(&(), &shape).unwrap(), Value::tuple([3, 77]));
/// ```
pub fn eval_vars<C: ContextFields + ?Sized>(context: &C, value: &Value) -> Result<Value> {
    match value {
        Value::Var(placeholder) => {
            let bound = placeholder.get(context)?;
            eval_vars(context, &bound)
        }
        Value::List(items) => Ok(Value::List(resolve_items(context, items)?)),
        Value::Tuple(items) => Ok(Value::Tuple(resolve_items(context, items)?)),
        Value::Record(record) => {
            let values = record
                .fields()
                .values()
                .map(|field_value| eval_vars(context, field_value))
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::Record(record.with_values(values)))
        }
        Value::Map(entries) => entries
            .iter()
            .map(|(key, entry_value)| -> Result<(String, Value)> { Ok((key.clone(), eval_vars(context, entry_value)?)) })
            .collect::<Result<IndexMap<_, _>>>()
            .map(Value::Map),
        Value::Set(items) => items
            .iter()
            .map(|item| eval_vars(context, item))
            .collect::<Result<ValueSet>>()
            .map(Value::Set),
        scalar => Ok(scalar.clone()),
    }
}

fn resolve_items<C: ContextFields + ?Sized>(context: &C, items: &[Value]) -> Result<Vec<Value>> {
    items.iter().map(|item| eval_vars(context, item)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::value::Record;
    use crate::placeholder::{Attribute, Variable};

    fn empty_context() -> IndexMap<String, Value> {
        IndexMap::new()
    }

    #[test]
    fn plain_values_come_back_unchanged() {
        let value = Value::list([Value::Int(3), Value::map([("a", 5)]), Value::tuple([7, 3])]);
        assert_eq!(eval_vars(&empty_context(), &value).expect("no placeholders"), value);
    }

    #[test]
    fn bare_variable_resolves_to_its_value() {
        let variable = Variable::with_value("vv", 77);
        assert_eq!(eval_vars(&empty_context(), &Value::from(&variable)).expect("bound"), Value::Int(77));
    }

    #[test]
    fn records_keep_type_and_field_names() {
        let variable = Variable::with_value("snt", 77);
        let record = Record::new("typ", [("x", Value::Int(3)), ("y", Value::from(&variable))]);
        let resolved = eval_vars(&empty_context(), &Value::Record(record)).expect("bound");
        assert_eq!(resolved, Value::Record(Record::new("typ", [("x", 3), ("y", 77)])));
    }

    #[test]
    fn tuples_stay_tuples() {
        let variable = Variable::with_value("second", 77);
        let resolved = eval_vars(&empty_context(), &Value::tuple([Value::Int(3), Value::from(&variable)])).expect("bound");
        assert_eq!(resolved, Value::tuple([3, 77]));
    }

    #[test]
    fn sets_collapse_after_resolution() {
        let variable = Variable::with_value("vset", 42);
        let value = Value::set([Value::Int(8), Value::from(&variable), Value::Int(42)]);
        let resolved = eval_vars(&empty_context(), &value).expect("bound");
        assert_eq!(resolved, Value::set([8, 42]));
        match resolved {
            Value::Set(set) => assert_eq!(set.len(), 2),
            other => panic!("expected a set, got {other:?}"),
        }
    }

    #[test]
    fn map_keys_are_copied_and_values_resolved() {
        let variable = Variable::with_value("inner", "resolved");
        let value = Value::map([("v", Value::from(&variable))]);
        let resolved = eval_vars(&empty_context(), &value).expect("bound");
        assert_eq!(resolved, Value::map([("v", "resolved")]));
    }

    #[test]
    fn attributes_read_the_context() {
        let mut context = empty_context();
        context.insert("x".into(), Value::Int(5));
        context.insert("y".into(), Value::Int(7));
        let value = Value::tuple([Attribute::new("y"), Attribute::new("x")]);
        assert_eq!(eval_vars(&context, &value).expect("fields present"), Value::tuple([7, 5]));
    }

    #[test]
    fn nested_placeholders_resolve_transitively() {
        let inner = Variable::with_value("inner", 1);
        let outer = Variable::with_value("outer", Value::list([Value::from(&inner)]));
        assert_eq!(eval_vars(&(), &Value::from(&outer)).expect("bound"), Value::list([1]));
    }

    #[test]
    fn input_is_left_untouched() {
        let variable = Variable::with_value("v", 1);
        let value = Value::list([Value::from(&variable)]);
        let snapshot = value.clone();
        let _ = eval_vars(&(), &value).expect("bound");
        assert_eq!(value, snapshot);
        assert!(matches!(value, Value::List(ref items) if items[0].as_placeholder().is_some()));
    }

    #[test]
    fn unset_variable_inside_container_fails() {
        let variable = Variable::new("missing");
        let error = eval_vars(&(), &Value::list([Value::from(&variable)])).expect_err("unset");
        assert!(matches!(error, PipelineError::UnsetVariable { .. }));
    }
}
