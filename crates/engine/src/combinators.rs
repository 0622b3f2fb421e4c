//! Composition of steps and conditions.
//!
//! - [`pipeline`] runs steps in order against the same context and returns the last result
//! - [`if_`] branches on a condition
//! - [`not_`], [`and_`] and [`or_`] combine conditions, short-circuiting left to right
//! - [`store`] captures a step's result into a placeholder
//! - [`list_`], [`tuple_`], [`set_`] and [`dict_`] build containers from resolved items
//!
//! Results of earlier pipeline steps are never threaded into later steps; data moves
//! between steps only through placeholders written by [`store`].

use std::fmt;

use tracing::debug;

use crate::error::Result;
use crate::fields::ContextFields;
use crate::placeholder::{Attribute, Placeholder, Variable};
use crate::resolve::eval_vars;
use crate::step::{Args, Condition, Step, stepfn};
use crate::value::Value;

/// A pipeline term: a step to invoke, or a value (typically a placeholder) to resolve.
pub enum Term<C: ?Sized> {
    Step(Step<C>),
    Value(Value),
}

impl<C: ?Sized> Term<C> {
    /// Wraps a literal value.
    pub fn literal(value: impl Into<Value>) -> Self {
        Term::Value(value.into())
    }

    /// Label used when naming composite steps.
    pub fn label(&self) -> String {
        match self {
            Term::Step(step) => step.name().to_string(),
            Term::Value(Value::Var(placeholder)) => placeholder.name().to_string(),
            Term::Value(value) => value.kind().to_string(),
        }
    }
}

impl<C: ContextFields + ?Sized> Term<C> {
    /// Invokes a step term, or resolves a value term against `context`.
    pub fn evaluate(&self, context: &mut C) -> Result<Value> {
        match self {
            Term::Step(step) => step.call(context),
            Term::Value(value) => eval_vars(&*context, value),
        }
    }
}

impl<C: ?Sized> Clone for Term<C> {
    fn clone(&self) -> Self {
        match self {
            Term::Step(step) => Term::Step(step.clone()),
            Term::Value(value) => Term::Value(value.clone()),
        }
    }
}

impl<C: ?Sized> fmt::Debug for Term<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Step(step) => step.fmt(f),
            Term::Value(value) => value.fmt(f),
        }
    }
}

impl<C: ?Sized> From<Step<C>> for Term<C> {
    fn from(step: Step<C>) -> Self {
        Term::Step(step)
    }
}

impl<C: ?Sized> From<&Step<C>> for Term<C> {
    fn from(step: &Step<C>) -> Self {
        Term::Step(step.clone())
    }
}

impl<C: ?Sized + 'static> From<Condition<C>> for Term<C> {
    fn from(condition: Condition<C>) -> Self {
        Term::Step(Step::from(condition))
    }
}

impl<C: ?Sized> From<Value> for Term<C> {
    fn from(value: Value) -> Self {
        Term::Value(value)
    }
}

impl<C: ?Sized> From<Placeholder> for Term<C> {
    fn from(placeholder: Placeholder) -> Self {
        Term::Value(Value::Var(placeholder))
    }
}

impl<C: ?Sized> From<&Placeholder> for Term<C> {
    fn from(placeholder: &Placeholder) -> Self {
        Term::Value(Value::Var(placeholder.clone()))
    }
}

impl<C: ?Sized> From<Variable> for Term<C> {
    fn from(variable: Variable) -> Self {
        Term::Value(Value::from(variable))
    }
}

impl<C: ?Sized> From<&Variable> for Term<C> {
    fn from(variable: &Variable) -> Self {
        Term::Value(Value::from(variable))
    }
}

impl<C: ?Sized> From<Attribute> for Term<C> {
    fn from(attribute: Attribute) -> Self {
        Term::Value(Value::from(attribute))
    }
}

impl<C: ?Sized> From<&Attribute> for Term<C> {
    fn from(attribute: &Attribute) -> Self {
        Term::Value(Value::from(attribute))
    }
}

/// Runs `steps` in order against the same context and returns the last result, resolved
/// against the context, or [`Value::Null`] when there are no steps. The first failure stops
/// the run; effects of earlier steps are kept.
pub fn pipeline<C>(steps: impl IntoIterator<Item = Step<C>>) -> Step<C>
where
    C: ContextFields + ?Sized + 'static,
{
    let steps: Vec<Step<C>> = steps.into_iter().collect();
    let name = steps.iter().map(Step::name).collect::<Vec<_>>().join(",");
    let label = name.clone();
    Step::new(name, move |context: &mut C| {
        debug!(pipeline = %label, step_count = steps.len(), "pipeline started");
        let mut result = Value::Null;
        for step in &steps {
            result = step.call(context)?;
        }
        debug!(pipeline = %label, "pipeline finished");
        eval_vars(&*context, &result)
    })
}

/// One arm of [`if_`]: nothing, a single step, or a sequence of steps run as a
/// [`pipeline`].
pub struct Branch<C: ?Sized>(Option<Step<C>>);

impl<C: ?Sized> Branch<C> {
    fn name(&self) -> &str {
        self.0.as_ref().map_or("", Step::name)
    }
}

impl<C: ?Sized> From<Step<C>> for Branch<C> {
    fn from(step: Step<C>) -> Self {
        Branch(Some(step))
    }
}

impl<C: ?Sized> From<&Step<C>> for Branch<C> {
    fn from(step: &Step<C>) -> Self {
        Branch(Some(step.clone()))
    }
}

impl<C: ?Sized> From<Option<Step<C>>> for Branch<C> {
    fn from(step: Option<Step<C>>) -> Self {
        Branch(step)
    }
}

impl<C: ContextFields + ?Sized + 'static> From<Vec<Step<C>>> for Branch<C> {
    fn from(steps: Vec<Step<C>>) -> Self {
        Branch(Some(pipeline(steps)))
    }
}

impl<C: ContextFields + ?Sized + 'static, const N: usize> From<[Step<C>; N]> for Branch<C> {
    fn from(steps: [Step<C>; N]) -> Self {
        Branch(Some(pipeline(steps)))
    }
}

/// Runs `then` when `condition` holds and `otherwise` when it does not. A missing branch
/// yields [`Value::Null`]; a list of steps runs as a pipeline.
pub fn if_<C: ?Sized + 'static>(
    condition: Condition<C>,
    then: impl Into<Branch<C>>,
    otherwise: impl Into<Branch<C>>,
) -> Step<C> {
    let then = then.into();
    let otherwise = otherwise.into();
    let name = match &otherwise.0 {
        Some(otherwise) => format!("{}?{}:{}", condition.name(), then.name(), otherwise.name()),
        None => format!("{}?{}", condition.name(), then.name()),
    };
    Step::new(name, move |context: &mut C| {
        let branch = if condition.call(context)? { &then } else { &otherwise };
        match &branch.0 {
            Some(step) => step.call(context),
            None => Ok(Value::Null),
        }
    })
}

/// Logical negation of `condition`.
pub fn not_<C: ?Sized + 'static>(condition: Condition<C>) -> Condition<C> {
    let name = format!("!{}", condition.name());
    Condition::new(name, move |context: &mut C| Ok(!condition.call(context)?))
}

/// True when every condition holds; stops at the first false one. Empty is true.
pub fn and_<C: ?Sized + 'static>(conditions: impl IntoIterator<Item = Condition<C>>) -> Condition<C> {
    let conditions: Vec<Condition<C>> = conditions.into_iter().collect();
    let name = conditions.iter().map(Condition::name).collect::<Vec<_>>().join("&");
    Condition::new(name, move |context: &mut C| {
        for condition in &conditions {
            if !condition.call(context)? {
                return Ok(false);
            }
        }
        Ok(true)
    })
}

/// True when any condition holds; stops at the first true one. Empty is false.
pub fn or_<C: ?Sized + 'static>(conditions: impl IntoIterator<Item = Condition<C>>) -> Condition<C> {
    let conditions: Vec<Condition<C>> = conditions.into_iter().collect();
    let name = conditions.iter().map(Condition::name).collect::<Vec<_>>().join("|");
    Condition::new(name, move |context: &mut C| {
        for condition in &conditions {
            if condition.call(context)? {
                return Ok(true);
            }
        }
        Ok(false)
    })
}

/// Computes `source` and writes the resolved result into `target`, returning it.
///
/// `source` may be a step (invoked with the context), a placeholder or a literal value
/// (both resolved against the context). Variables store into scope storage, attributes
/// into the context field of the same name.
pub fn store<C>(target: impl Into<Placeholder>, source: impl Into<Term<C>>) -> Step<C>
where
    C: ContextFields + ?Sized + 'static,
{
    let target = target.into();
    let source = source.into();
    let name = format!("store({}<-{})", target.name(), source.label());
    Step::new(name, move |context: &mut C| {
        let value = source.evaluate(context)?;
        let resolved = eval_vars(&*context, &value)?;
        target.set(context, resolved.clone())?;
        debug!(target = target.name(), kind = target.kind(), "value stored");
        Ok(resolved)
    })
}

/// One-off step that calls `body` with resolved `args`.
pub fn apply<C, F>(name: &str, body: F, args: impl Into<Args>) -> Step<C>
where
    C: ContextFields + ?Sized + 'static,
    F: Fn(&mut C, Args) -> Result<Value> + 'static,
{
    stepfn(name, body).step(args)
}

/// Step producing a list of the resolved `items`.
pub fn list_<C, T>(items: impl IntoIterator<Item = T>) -> Step<C>
where
    C: ContextFields + ?Sized + 'static,
    T: Into<Value>,
{
    template_step("list_", Value::list(items))
}

/// Step producing a tuple of the resolved `items`.
pub fn tuple_<C, T>(items: impl IntoIterator<Item = T>) -> Step<C>
where
    C: ContextFields + ?Sized + 'static,
    T: Into<Value>,
{
    template_step("tuple_", Value::tuple(items))
}

/// Step producing a set of the resolved `items`; values equal after resolution collapse.
pub fn set_<C, T>(items: impl IntoIterator<Item = T>) -> Step<C>
where
    C: ContextFields + ?Sized + 'static,
    T: Into<Value>,
{
    template_step("set_", Value::set(items))
}

/// Step producing a map of the resolved `entries`.
pub fn dict_<C, K, T>(entries: impl IntoIterator<Item = (K, T)>) -> Step<C>
where
    C: ContextFields + ?Sized + 'static,
    K: Into<String>,
    T: Into<Value>,
{
    template_step("dict_", Value::map(entries))
}

fn template_step<C: ContextFields + ?Sized + 'static>(name: &str, template: Value) -> Step<C> {
    Step::new(name, move |context: &mut C| eval_vars(&*context, &template))
}
