//! Pipeline variables.
//!
//! Placeholders carry values between steps without hard-wiring arguments. A [`Variable`]
//! holds its value in scope-local storage and is set through [`store`](crate::store); an
//! [`Attribute`] is backed by a field or key of the context a step runs against. Both are
//! cheap reference-counted handles compared by identity, and both stop working once the
//! [`VariableContext`](crate::VariableContext) that issued them is closed.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::error::{PipelineError, Result};
use crate::fields::ContextFields;
use crate::resolve::eval_vars;
use crate::value::Value;

#[derive(Debug)]
enum Slot {
    Unset,
    Bound(Value),
    Closed,
}

struct VariableCell {
    name: String,
    slot: RefCell<Slot>,
}

/// Named placeholder with scope-local storage.
#[derive(Clone)]
pub struct Variable(Rc<VariableCell>);

impl Variable {
    /// Creates an unset variable outside any scope.
    pub fn new(name: impl Into<String>) -> Self {
        Self(Rc::new(VariableCell {
            name: name.into(),
            slot: RefCell::new(Slot::Unset),
        }))
    }

    /// Creates a variable holding `value`.
    pub fn with_value(name: impl Into<String>, value: impl Into<Value>) -> Self {
        let variable = Self::new(name);
        *variable.0.slot.borrow_mut() = Slot::Bound(value.into());
        variable
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Returns a copy of the stored value.
    ///
    /// # Errors
    ///
    /// [`PipelineError::UnsetVariable`] before the first store, and
    /// [`PipelineError::Lifecycle`] once the owning scope is closed.
    pub fn value(&self) -> Result<Value> {
        match &*self.0.slot.borrow() {
            Slot::Bound(value) => Ok(value.clone()),
            Slot::Unset => Err(PipelineError::UnsetVariable { name: self.0.name.clone() }),
            Slot::Closed => Err(PipelineError::lifecycle("read", self.0.name.as_str())),
        }
    }

    /// Stores `value` as is. Use [`Placeholder::set`] or [`store`](crate::store) to resolve
    /// nested placeholders first.
    pub fn set_value(&self, value: impl Into<Value>) -> Result<()> {
        let mut slot = self.0.slot.borrow_mut();
        if matches!(*slot, Slot::Closed) {
            return Err(PipelineError::lifecycle("write", self.0.name.as_str()));
        }
        *slot = Slot::Bound(value.into());
        Ok(())
    }

    pub fn is_set(&self) -> bool {
        matches!(*self.0.slot.borrow(), Slot::Bound(_))
    }

    pub fn is_closed(&self) -> bool {
        matches!(*self.0.slot.borrow(), Slot::Closed)
    }

    pub fn ptr_eq(&self, other: &Variable) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Drops the stored value and invalidates the handle.
    pub(crate) fn close(&self) {
        *self.0.slot.borrow_mut() = Slot::Closed;
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0.slot.borrow() {
            Slot::Bound(value) => write!(f, "<{}={:?}>", self.0.name, value),
            Slot::Unset => write!(f, "<{}=???>", self.0.name),
            Slot::Closed => write!(f, "<{}=####>", self.0.name),
        }
    }
}

struct AttributeCell {
    name: String,
    closed: Cell<bool>,
}

/// Named placeholder backed by a field or key of the step's context.
///
/// The value lives in the context, so it survives the scope: closing the scope only
/// revokes this handle's ability to reach it.
#[derive(Clone)]
pub struct Attribute(Rc<AttributeCell>);

impl Attribute {
    /// Creates an attribute reference outside any scope.
    pub fn new(name: impl Into<String>) -> Self {
        Self(Rc::new(AttributeCell {
            name: name.into(),
            closed: Cell::new(false),
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Reads the backing field from `context`.
    pub fn value<C: ContextFields + ?Sized>(&self, context: &C) -> Result<Value> {
        if self.is_closed() {
            return Err(PipelineError::lifecycle("read", self.0.name.as_str()));
        }
        Ok(context.get_field(&self.0.name)?)
    }

    /// Resolves `value` against `context` and writes it into the backing field.
    pub fn set_value<C: ContextFields + ?Sized>(&self, context: &mut C, value: impl Into<Value>) -> Result<()> {
        if self.is_closed() {
            return Err(PipelineError::lifecycle("write", self.0.name.as_str()));
        }
        let resolved = eval_vars(&*context, &value.into())?;
        context.set_field(&self.0.name, resolved)?;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.0.closed.get()
    }

    pub fn ptr_eq(&self, other: &Attribute) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn close(&self) {
        self.0.closed.set(true);
    }
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_closed() {
            write!(f, "@<####.{}>", self.0.name)
        } else {
            write!(f, "@<{}>", self.0.name)
        }
    }
}

/// Either kind of placeholder.
#[derive(Clone)]
pub enum Placeholder {
    Variable(Variable),
    Attribute(Attribute),
}

impl Placeholder {
    pub fn name(&self) -> &str {
        match self {
            Placeholder::Variable(variable) => variable.name(),
            Placeholder::Attribute(attribute) => attribute.name(),
        }
    }

    /// `"variable"` or `"attribute"`.
    pub fn kind(&self) -> &'static str {
        match self {
            Placeholder::Variable(_) => "variable",
            Placeholder::Attribute(_) => "attribute",
        }
    }

    /// Reads the current value; attributes read through `context`.
    pub fn get<C: ContextFields + ?Sized>(&self, context: &C) -> Result<Value> {
        match self {
            Placeholder::Variable(variable) => variable.value(),
            Placeholder::Attribute(attribute) => attribute.value(context),
        }
    }

    /// Resolves `value` against `context` and stores it.
    pub fn set<C: ContextFields + ?Sized>(&self, context: &mut C, value: Value) -> Result<()> {
        match self {
            Placeholder::Variable(variable) => {
                if variable.is_closed() {
                    return Err(PipelineError::lifecycle("write", variable.name()));
                }
                let resolved = eval_vars(&*context, &value)?;
                variable.set_value(resolved)
            }
            Placeholder::Attribute(attribute) => attribute.set_value(context, value),
        }
    }

    pub fn is_closed(&self) -> bool {
        match self {
            Placeholder::Variable(variable) => variable.is_closed(),
            Placeholder::Attribute(attribute) => attribute.is_closed(),
        }
    }

    pub fn ptr_eq(&self, other: &Placeholder) -> bool {
        match (self, other) {
            (Placeholder::Variable(left), Placeholder::Variable(right)) => left.ptr_eq(right),
            (Placeholder::Attribute(left), Placeholder::Attribute(right)) => left.ptr_eq(right),
            _ => false,
        }
    }

    pub(crate) fn close(&self) {
        match self {
            Placeholder::Variable(variable) => variable.close(),
            Placeholder::Attribute(attribute) => attribute.close(),
        }
    }
}

impl PartialEq for Placeholder {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Placeholder::Variable(variable) => variable.fmt(f),
            Placeholder::Attribute(attribute) => attribute.fmt(f),
        }
    }
}

impl From<Variable> for Placeholder {
    fn from(variable: Variable) -> Self {
        Placeholder::Variable(variable)
    }
}

impl From<&Variable> for Placeholder {
    fn from(variable: &Variable) -> Self {
        Placeholder::Variable(variable.clone())
    }
}

impl From<Attribute> for Placeholder {
    fn from(attribute: Attribute) -> Self {
        Placeholder::Attribute(attribute)
    }
}

impl From<&Attribute> for Placeholder {
    fn from(attribute: &Attribute) -> Self {
        Placeholder::Attribute(attribute.clone())
    }
}

impl From<&Placeholder> for Placeholder {
    fn from(placeholder: &Placeholder) -> Self {
        placeholder.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    #[test]
    fn unset_variable_read_fails() {
        let variable = Variable::new("pending");
        let error = variable.value().expect_err("nothing stored yet");
        assert!(matches!(error, PipelineError::UnsetVariable { ref name } if name == "pending"));
    }

    #[test]
    fn closed_variable_rejects_reads_and_writes() {
        let variable = Variable::with_value("done", 1);
        variable.close();
        assert!(matches!(variable.value(), Err(PipelineError::Lifecycle { operation: "read", .. })));
        assert!(matches!(variable.set_value(2), Err(PipelineError::Lifecycle { operation: "write", .. })));
    }

    #[test]
    fn attribute_reads_through_context() {
        let mut context: IndexMap<String, Value> = IndexMap::new();
        context.insert("value".into(), Value::Int(55));
        let attribute = Attribute::new("value");
        assert_eq!(attribute.value(&context).expect("value field present"), Value::Int(55));

        attribute.set_value(&mut context, 56).expect("map accepts writes");
        assert_eq!(context["value"], Value::Int(56));
    }

    #[test]
    fn attribute_writes_resolve_placeholders() {
        let mut context: IndexMap<String, Value> = IndexMap::new();
        let source = Variable::with_value("source", "payload");
        Attribute::new("target")
            .set_value(&mut context, Value::list([Value::from(&source)]))
            .expect("write succeeds");
        assert_eq!(context["target"], Value::list(["payload"]));
    }

    #[test]
    fn closed_attribute_leaves_context_untouched() {
        let mut context: IndexMap<String, Value> = IndexMap::new();
        context.insert("kept".into(), Value::Int(1));
        let attribute = Attribute::new("kept");
        attribute.close();
        assert!(attribute.value(&context).is_err());
        assert_eq!(context["kept"], Value::Int(1));
    }

    #[test]
    fn debug_rendering_reflects_state() {
        let variable = Variable::new("v");
        assert_eq!(format!("{variable:?}"), "<v=???>");
        variable.set_value(3).expect("open variable");
        assert_eq!(format!("{variable:?}"), "<v=Int(3)>");
        assert_eq!(format!("{:?}", Attribute::new("a")), "@<a>");
    }
}
