//! The step and condition protocol.
//!
//! A [`Step`] is a named single-argument function from a context to a [`Value`]; a
//! [`Condition`] is the same shape returning `bool`. [`stepfn`] and [`conditionfn`] turn a
//! function of the context plus extra arguments into a builder: binding the extra
//! [`Args`] yields a step, and every bound argument is resolved through
//! [`eval_vars`](crate::eval_vars) against the context each time the step runs. Bound
//! arguments may therefore contain placeholders that only receive values while the
//! pipeline executes.

use std::fmt;
use std::rc::Rc;

use anyhow::anyhow;
use indexmap::IndexMap;
use tracing::{trace, warn};

use crate::error::{PipelineError, Result};
use crate::fields::ContextFields;
use crate::resolve::eval_vars;
use crate::value::Value;

type StepBody<C> = dyn Fn(&mut C) -> Result<Value>;
type ConditionBody<C> = dyn Fn(&mut C) -> Result<bool>;

/// Named function from a context to a value.
pub struct Step<C: ?Sized> {
    name: Rc<str>,
    body: Rc<StepBody<C>>,
}

impl<C: ?Sized> Step<C> {
    pub fn new<F>(name: impl AsRef<str>, body: F) -> Self
    where
        F: Fn(&mut C) -> Result<Value> + 'static,
    {
        Self {
            name: Rc::from(name.as_ref()),
            body: Rc::new(body),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs the step against `context`.
    ///
    /// # Errors
    ///
    /// Propagates the body's error unchanged, and fails with
    /// [`PipelineError::LeakedHandle`] if the body returns a bare placeholder.
    pub fn call(&self, context: &mut C) -> Result<Value> {
        trace!(step = %self.name, "step invoked");
        let result = (self.body)(context)?;
        if let Value::Var(placeholder) = &result {
            warn!(step = %self.name, placeholder = placeholder.name(), "step returned a pipeline variable");
            return Err(PipelineError::LeakedHandle {
                step: self.name.to_string(),
                name: placeholder.name().to_string(),
            });
        }
        Ok(result)
    }

    /// Exposes the step as a plain closure.
    pub fn into_fn(self) -> impl Fn(&mut C) -> Result<Value> {
        move |context: &mut C| self.call(context)
    }
}

impl<C: ?Sized + 'static> Step<C> {
    /// Uses the truthiness of this step's result as a condition.
    pub fn as_condition(&self) -> Condition<C> {
        let step = self.clone();
        Condition::new(&*self.name, move |context| Ok(step.call(context)?.is_truthy()))
    }
}

impl<C: ?Sized> Clone for Step<C> {
    fn clone(&self) -> Self {
        Self {
            name: Rc::clone(&self.name),
            body: Rc::clone(&self.body),
        }
    }
}

impl<C: ?Sized> fmt::Debug for Step<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Step").field(&self.name).finish()
    }
}

/// Named predicate over a context.
pub struct Condition<C: ?Sized> {
    name: Rc<str>,
    body: Rc<ConditionBody<C>>,
}

impl<C: ?Sized> Condition<C> {
    pub fn new<F>(name: impl AsRef<str>, body: F) -> Self
    where
        F: Fn(&mut C) -> Result<bool> + 'static,
    {
        Self {
            name: Rc::from(name.as_ref()),
            body: Rc::new(body),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, context: &mut C) -> Result<bool> {
        trace!(condition = %self.name, "condition evaluated");
        (self.body)(context)
    }
}

impl<C: ?Sized> Clone for Condition<C> {
    fn clone(&self) -> Self {
        Self {
            name: Rc::clone(&self.name),
            body: Rc::clone(&self.body),
        }
    }
}

impl<C: ?Sized> fmt::Debug for Condition<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Condition").field(&self.name).finish()
    }
}

impl<C: ?Sized + 'static> From<Condition<C>> for Step<C> {
    fn from(condition: Condition<C>) -> Self {
        let name = Rc::clone(&condition.name);
        Step {
            name,
            body: Rc::new(move |context: &mut C| Ok(Value::Bool(condition.call(context)?))),
        }
    }
}

/// Arguments bound to a step builder: positional values plus keyword values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    positional: Vec<Value>,
    keyword: IndexMap<String, Value>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: impl Into<Value>) {
        self.positional.push(value.into());
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.keyword.insert(name.into(), value.into());
    }

    /// Builder form of [`Args::push`].
    pub fn with(mut self, value: impl Into<Value>) -> Self {
        self.push(value);
        self
    }

    /// Builder form of [`Args::insert`].
    pub fn with_keyword(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    /// Positional argument `index`, or a step error naming the missing position.
    pub fn require(&self, index: usize) -> Result<&Value> {
        self.positional
            .get(index)
            .ok_or_else(|| PipelineError::Step(anyhow!("missing positional argument {index}")))
    }

    pub fn keyword(&self, name: &str) -> Option<&Value> {
        self.keyword.get(name)
    }

    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    pub fn keywords(&self) -> &IndexMap<String, Value> {
        &self.keyword
    }

    pub fn len(&self) -> usize {
        self.positional.len() + self.keyword.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keyword.is_empty()
    }

    pub fn into_parts(self) -> (Vec<Value>, IndexMap<String, Value>) {
        (self.positional, self.keyword)
    }

    /// Resolves every positional and keyword value against `context`.
    pub fn resolve<C: ContextFields + ?Sized>(&self, context: &C) -> Result<Args> {
        let positional = self
            .positional
            .iter()
            .map(|value| eval_vars(context, value))
            .collect::<Result<Vec<_>>>()?;
        let mut keyword = IndexMap::with_capacity(self.keyword.len());
        for (name, value) in &self.keyword {
            keyword.insert(name.clone(), eval_vars(context, value)?);
        }
        Ok(Args { positional, keyword })
    }
}

impl From<()> for Args {
    fn from(_: ()) -> Self {
        Args::new()
    }
}

impl From<Vec<Value>> for Args {
    fn from(positional: Vec<Value>) -> Self {
        Args {
            positional,
            keyword: IndexMap::new(),
        }
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Args {
    fn from(values: [T; N]) -> Self {
        Args {
            positional: values.into_iter().map(Into::into).collect(),
            keyword: IndexMap::new(),
        }
    }
}

/// Builds [`Args`] from positional values, optionally followed by `;` and `name = value`
/// keyword pairs.
///
/// ```rust
/// use fpipe_engine::{Value, args};
///
/// let bound = args![1, "two"; scale = 3];
/// assert_eq!(bound.get(1), Some(&Value::from("two")));
/// assert_eq!(bound.keyword("scale"), Some(&Value::Int(3)));
/// ```
#[macro_export]
macro_rules! args {
    ($($arg:expr),* $(,)? $(; $($key:ident = $value:expr),* $(,)?)?) => {{
        #[allow(unused_mut)]
        let mut args = $crate::Args::new();
        $(args.push($arg);)*
        $($(args.insert(stringify!($key), $value);)*)?
        args
    }};
}

type StepFnBody<C> = dyn Fn(&mut C, Args) -> Result<Value>;
type ConditionFnBody<C> = dyn Fn(&mut C, Args) -> Result<bool>;

/// Step builder produced by [`stepfn`].
pub struct StepFn<C: ?Sized> {
    name: Rc<str>,
    body: Rc<StepFnBody<C>>,
}

impl<C: ContextFields + ?Sized + 'static> StepFn<C> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Binds `args` and returns a step that resolves them on every call.
    pub fn step(&self, args: impl Into<Args>) -> Step<C> {
        let args = args.into();
        let body = Rc::clone(&self.body);
        Step {
            name: Rc::clone(&self.name),
            body: Rc::new(move |context: &mut C| {
                let resolved = args.resolve(&*context)?;
                body(context, resolved)
            }),
        }
    }
}

impl<C: ?Sized> Clone for StepFn<C> {
    fn clone(&self) -> Self {
        Self {
            name: Rc::clone(&self.name),
            body: Rc::clone(&self.body),
        }
    }
}

impl<C: ?Sized> fmt::Debug for StepFn<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StepFn").field(&self.name).finish()
    }
}

/// Condition builder produced by [`conditionfn`].
pub struct ConditionFn<C: ?Sized> {
    name: Rc<str>,
    body: Rc<ConditionFnBody<C>>,
}

impl<C: ContextFields + ?Sized + 'static> ConditionFn<C> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Binds `args` and returns a condition that resolves them on every call.
    pub fn condition(&self, args: impl Into<Args>) -> Condition<C> {
        let args = args.into();
        let body = Rc::clone(&self.body);
        Condition {
            name: Rc::clone(&self.name),
            body: Rc::new(move |context: &mut C| {
                let resolved = args.resolve(&*context)?;
                body(context, resolved)
            }),
        }
    }
}

impl<C: ?Sized> Clone for ConditionFn<C> {
    fn clone(&self) -> Self {
        Self {
            name: Rc::clone(&self.name),
            body: Rc::clone(&self.body),
        }
    }
}

impl<C: ?Sized> fmt::Debug for ConditionFn<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ConditionFn").field(&self.name).finish()
    }
}

/// Wraps `body` as a step builder named `name`.
///
/// ```rust
/// use fpipe_engine::{ContextFields, Value, args, stepfn};
///
/// struct Tally {
///     total: i64,
/// }
///
/// impl ContextFields for Tally {}
///
/// let scale = stepfn("scale", |tally: &mut Tally, args| {
///     let factor = args.require(0)?.as_i64().unwrap_or(1);
///     tally.total *= factor;
///     Ok(Value::Int(tally.total))
/// });
/// let mut tally = Tally { total: 3 };
/// assert_eq!(scale.step(args![4]).call(&mut tally).unwrap(), Value::Int(12));
/// ```
pub fn stepfn<C, F>(name: impl AsRef<str>, body: F) -> StepFn<C>
where
    C: ?Sized,
    F: Fn(&mut C, Args) -> Result<Value> + 'static,
{
    StepFn {
        name: Rc::from(name.as_ref()),
        body: Rc::new(body),
    }
}

/// Wraps `body` as a condition builder named `name`.
pub fn conditionfn<C, F>(name: impl AsRef<str>, body: F) -> ConditionFn<C>
where
    C: ?Sized,
    F: Fn(&mut C, Args) -> Result<bool> + 'static,
{
    ConditionFn {
        name: Rc::from(name.as_ref()),
        body: Rc::new(body),
    }
}
