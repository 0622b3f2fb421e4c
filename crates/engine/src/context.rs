//! General-purpose pipeline context.

use indexmap::IndexMap;

use crate::combinators::Term;
use crate::error::{FieldError, Result};
use crate::fields::ContextFields;
use crate::placeholder::{Attribute, Variable};
use crate::scope::VariableContext;
use crate::value::Value;

/// A field map that is also a variable scope.
///
/// Attributes minted here read and write [`PipelineContext::fields`], and
/// [`PipelineContext::pipeline`] runs immediately against those fields.
#[derive(Debug, Default)]
pub struct PipelineContext {
    fields: IndexMap<String, Value>,
    scope: VariableContext,
}

impl PipelineContext {
    pub fn new<K, V>(initial: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Self {
            fields: initial.into_iter().map(|(key, value)| (key.into(), value.into())).collect(),
            scope: VariableContext::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn fields(&self) -> &IndexMap<String, Value> {
        &self.fields
    }

    pub fn into_fields(mut self) -> IndexMap<String, Value> {
        std::mem::take(&mut self.fields)
    }

    pub fn scope(&self) -> &VariableContext {
        &self.scope
    }

    pub fn variable(&self, name: &str) -> Result<Variable> {
        self.scope.variable(name)
    }

    pub fn variables<const N: usize>(&self, names: [&str; N]) -> Result<[Variable; N]> {
        self.scope.variables(names)
    }

    pub fn attribute(&self, name: &str) -> Result<Attribute> {
        self.scope.attribute(name)
    }

    pub fn attributes<const N: usize>(&self, names: [&str; N]) -> Result<[Attribute; N]> {
        self.scope.attributes(names)
    }

    /// Assembles `terms` in this context's scope and runs them against its fields.
    pub fn pipeline(&mut self, terms: impl IntoIterator<Item = Term<PipelineContext>>) -> Result<Value> {
        let steps = self.scope.pipeline(terms)?;
        steps.call(self)
    }

    pub fn close(&self) {
        self.scope.close();
    }
}

impl ContextFields for PipelineContext {
    fn get_field(&self, name: &str) -> Result<Value, FieldError> {
        self.fields.get_field(name)
    }

    fn set_field(&mut self, name: &str, value: Value) -> Result<(), FieldError> {
        self.fields.set_field(name, value)
    }
}

/// Runs `body` with a [`PipelineContext`] seeded from `initial`, closing its scope on
/// every exit path.
///
/// ```rust
/// use fpipe_engine::{Term, Value, context, store};
///
/// let total = context([("x", 5)], |ctx| {
///     let [x, out] = ctx.attributes(["x", "out"])?;
///     ctx.pipeline([store(&out, &x).into(), Term::from(&out)])
/// })?;
/// assert_eq!(total, Value::Int(5));
/// # Ok::<(), fpipe_engine::PipelineError>(())
/// ```
pub fn context<K, V, T>(
    initial: impl IntoIterator<Item = (K, V)>,
    body: impl FnOnce(&mut PipelineContext) -> Result<T>,
) -> Result<T>
where
    K: Into<String>,
    V: Into<Value>,
{
    let mut ctx = PipelineContext::new(initial);
    let outcome = body(&mut ctx);
    ctx.close();
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combinators::store;
    use crate::error::PipelineError;
    use crate::step::Step;

    #[test]
    fn attributes_read_and_write_own_fields() {
        let mut ctx = PipelineContext::new([("x", 5), ("y", 7)]);
        let [x, y, out] = ctx.attributes(["x", "y", "out"]).expect("open");
        let swap = Step::new("swap", move |_: &mut PipelineContext| Ok(Value::tuple([&y, &x])));
        let result = ctx
            .pipeline([store(&out, swap).into(), Term::from(&out)])
            .expect("runs");
        assert_eq!(result, Value::tuple([7, 5]));
        assert_eq!(ctx.get("out"), Some(&Value::tuple([7, 5])));
    }

    #[test]
    fn variables_live_in_the_scope_not_the_fields() {
        let mut ctx = PipelineContext::default();
        let v = ctx.variable("v").expect("open");
        ctx.pipeline([store(&v, Value::Int(3)).into()]).expect("runs");
        assert_eq!(v.value().expect("stored"), Value::Int(3));
        assert!(ctx.get("v").is_none());
    }

    #[test]
    fn context_closes_even_when_body_fails() {
        let mut leaked = None;
        let outcome: Result<()> = context(Vec::<(String, Value)>::new(), |ctx| {
            leaked = Some(ctx.variable("v")?);
            Err(PipelineError::UnsetVariable { name: "v".into() })
        });
        assert!(outcome.is_err());
        assert!(leaked.expect("minted").is_closed());
    }

    #[test]
    fn fields_survive_the_scope() {
        let fields = context([("x", 1)], |ctx| {
            let out = ctx.attribute("out")?;
            ctx.pipeline([store(&out, Value::Int(2)).into()])?;
            Ok(ctx.fields().clone())
        })
        .expect("runs");
        assert_eq!(fields.get("out"), Some(&Value::Int(2)));
    }
}
