//! Variable scopes.
//!
//! A [`VariableContext`] mints [`Variable`]s and [`Attribute`]s by name and owns their
//! lifecycle. Names are unique within a scope, so asking again returns the same handle.
//! Closing the scope (explicitly, by dropping it, or on leaving [`variables`]) discards
//! every stored value and invalidates every handle it issued.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::debug;

use crate::combinators::Term;
use crate::error::{PipelineError, Result};
use crate::fields::ContextFields;
use crate::placeholder::{Attribute, Placeholder, Variable};
use crate::resolve::eval_vars;
use crate::step::Step;
use crate::value::Value;

struct ScopeState {
    parent: Option<Rc<ScopeState>>,
    entries: RefCell<IndexMap<String, Placeholder>>,
    closed: Cell<bool>,
}

impl ScopeState {
    /// False once this scope or any ancestor is closed.
    fn is_open(&self) -> bool {
        !self.closed.get() && self.parent.as_ref().is_none_or(|parent| parent.is_open())
    }

    fn lookup(&self, name: &str) -> Option<Placeholder> {
        if self.closed.get() {
            return None;
        }
        if let Some(found) = self.entries.borrow().get(name) {
            return Some(found.clone());
        }
        self.parent.as_ref().and_then(|parent| parent.lookup(name))
    }
}

/// Scope manager issuing and tracking placeholders.
pub struct VariableContext {
    state: Rc<ScopeState>,
}

impl VariableContext {
    pub fn new() -> Self {
        debug!("variable scope opened");
        Self::with_parent(None)
    }

    fn with_parent(parent: Option<Rc<ScopeState>>) -> Self {
        Self {
            state: Rc::new(ScopeState {
                parent,
                entries: RefCell::new(IndexMap::new()),
                closed: Cell::new(false),
            }),
        }
    }

    /// Opens a nested scope. Lookups in the child fall through to this scope; closing the
    /// child leaves this scope untouched.
    pub fn child(&self) -> Result<VariableContext> {
        self.ensure_open("open a child scope of", "")?;
        debug!(parent_size = self.len(), "nested variable scope opened");
        Ok(Self::with_parent(Some(Rc::clone(&self.state))))
    }

    /// Returns the variable called `name`, creating it unset if needed.
    pub fn variable(&self, name: &str) -> Result<Variable> {
        match self.placeholder(name, "variable")? {
            Placeholder::Variable(variable) => Ok(variable),
            Placeholder::Attribute(_) => Err(kind_conflict(name, "variable", "attribute")),
        }
    }

    /// Returns one variable per name, in request order.
    pub fn variables<const N: usize>(&self, names: [&str; N]) -> Result<[Variable; N]> {
        let mut minted = Vec::with_capacity(N);
        for name in names {
            minted.push(self.variable(name)?);
        }
        Ok(minted
            .try_into()
            .unwrap_or_else(|_| unreachable!("one variable is minted per requested name")))
    }

    /// Returns the variable called `name` after storing `value` into it.
    pub fn variable_with(&self, name: &str, value: impl Into<Value>) -> Result<Variable> {
        let variable = self.variable(name)?;
        variable.set_value(value)?;
        Ok(variable)
    }

    /// Returns the attribute called `name`, creating it if needed.
    pub fn attribute(&self, name: &str) -> Result<Attribute> {
        match self.placeholder(name, "attribute")? {
            Placeholder::Attribute(attribute) => Ok(attribute),
            Placeholder::Variable(_) => Err(kind_conflict(name, "attribute", "variable")),
        }
    }

    /// Returns one attribute per name, in request order.
    pub fn attributes<const N: usize>(&self, names: [&str; N]) -> Result<[Attribute; N]> {
        let mut minted = Vec::with_capacity(N);
        for name in names {
            minted.push(self.attribute(name)?);
        }
        Ok(minted
            .try_into()
            .unwrap_or_else(|_| unreachable!("one attribute is minted per requested name")))
    }

    /// Looks `name` up in this scope and its open ancestors without creating anything.
    pub fn find(&self, name: &str) -> Option<Placeholder> {
        self.state.lookup(name)
    }

    /// Names minted by this scope, in creation order.
    pub fn names(&self) -> Vec<String> {
        self.state.entries.borrow().keys().cloned().collect()
    }

    /// Number of placeholders this scope currently holds.
    pub fn len(&self) -> usize {
        self.state.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True once this scope or any scope it is nested in has been closed.
    pub fn is_closed(&self) -> bool {
        !self.state.is_open()
    }

    /// Invalidates every placeholder this scope issued and empties its storage.
    /// Calling it again has no effect.
    pub fn close(&self) {
        if self.state.closed.replace(true) {
            return;
        }
        let released: Vec<Placeholder> = self.state.entries.borrow_mut().drain(..).map(|(_, p)| p).collect();
        for placeholder in &released {
            placeholder.close();
        }
        debug!(released = released.len(), "variable scope closed");
    }

    /// Builds a step that evaluates `terms` in order against the same context.
    ///
    /// Step terms are invoked and value terms are resolved. Only the final result is
    /// kept, and it is resolved once more so placeholders never escape; a trailing
    /// [`Variable`] or [`Attribute`] therefore yields its value.
    pub fn pipeline<C>(&self, terms: impl IntoIterator<Item = Term<C>>) -> Result<Step<C>>
    where
        C: ContextFields + ?Sized + 'static,
    {
        let terms: Vec<Term<C>> = terms.into_iter().collect();
        let name = terms.iter().map(Term::label).collect::<Vec<_>>().join(",");
        self.ensure_open("assemble a pipeline in", &name)?;
        let label = name.clone();
        Ok(Step::new(name, move |context: &mut C| {
            debug!(pipeline = %label, term_count = terms.len(), "scoped pipeline started");
            let mut result = Value::Null;
            for term in &terms {
                result = term.evaluate(context)?;
            }
            eval_vars(&*context, &result)
        }))
    }

    fn placeholder(&self, name: &str, kind: &'static str) -> Result<Placeholder> {
        self.ensure_open("create", name)?;
        if let Some(existing) = self.state.lookup(name) {
            return Ok(existing);
        }
        let created = match kind {
            "attribute" => Placeholder::Attribute(Attribute::new(name)),
            _ => Placeholder::Variable(Variable::new(name)),
        };
        self.state.entries.borrow_mut().insert(name.to_string(), created.clone());
        debug!(name, kind, "placeholder created");
        Ok(created)
    }

    fn ensure_open(&self, operation: &'static str, name: &str) -> Result<()> {
        if self.is_closed() {
            return Err(PipelineError::lifecycle(operation, name));
        }
        Ok(())
    }
}

fn kind_conflict(name: &str, expected: &'static str, found: &'static str) -> PipelineError {
    PipelineError::PlaceholderKind {
        name: name.to_string(),
        expected,
        found,
    }
}

impl Default for VariableContext {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for VariableContext {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for VariableContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariableContext")
            .field("entries", &*self.state.entries.borrow())
            .field("closed", &self.state.closed.get())
            .finish()
    }
}

/// Runs `body` with a fresh scope and closes it afterwards, on success and on failure.
///
/// ```rust
/// use fpipe_engine::{Term, Value, store, variables};
/// use indexmap::IndexMap;
///
/// let mut context: IndexMap<String, Value> = IndexMap::new();
/// let result = variables(|scope| {
///     let total = scope.variable("total")?;
///     let steps = scope.pipeline([store(&total, Value::Int(99)).into(), Term::from(&total)])?;
///     steps.call(&mut context)
/// })?;
/// assert_eq!(result, Value::Int(99));
/// # Ok::<(), fpipe_engine::PipelineError>(())
/// ```
pub fn variables<T>(body: impl FnOnce(&VariableContext) -> Result<T>) -> Result<T> {
    let scope = VariableContext::new();
    let outcome = body(&scope);
    scope.close();
    outcome
}
