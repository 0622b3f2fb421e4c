//! # fpipe engine
//!
//! Composable, single-argument steps over an application-supplied context, with named
//! placeholders that carry values between steps instead of hard-wired arguments.
//!
//! ## Key Features
//!
//! - **Steps and conditions**: [`stepfn`] and [`conditionfn`] turn functions of
//!   `(context, args)` into builders; captured arguments are resolved when the step runs
//! - **Placeholders**: [`Variable`]s hold scope-local values, [`Attribute`]s read and write
//!   context fields, and both are issued by a [`VariableContext`]
//! - **Deep substitution**: [`eval_vars`] replaces placeholders anywhere inside nested data
//! - **Combinators**: [`pipeline`], [`if_`], [`not_`], [`and_`], [`or_`] and [`store`]
//!
//! ## Usage
//!
//! ```rust
//! use fpipe_engine::{Args, Term, Value, if_, stepfn, conditionfn, store, variables};
//! use indexmap::IndexMap;
//!
//! let double = stepfn("double", |_: &mut IndexMap<String, Value>, args: Args| {
//!     let number = args.require(0)?.as_i64().unwrap_or_default();
//!     Ok(Value::Int(number * 2))
//! });
//! let positive = conditionfn("positive", |_: &mut IndexMap<String, Value>, args: Args| {
//!     Ok(args.require(0)?.as_i64().is_some_and(|number| number > 0))
//! });
//!
//! let mut context: IndexMap<String, Value> = IndexMap::new();
//! context.insert("x".into(), Value::Int(21));
//!
//! let answer = variables(|scope| {
//!     let x = scope.attribute("x")?;
//!     let result = scope.variable("result")?;
//!     let steps = scope.pipeline([
//!         if_(positive.condition([&x]), store(&result, double.step([&x])), None).into(),
//!         Term::from(&result),
//!     ])?;
//!     steps.call(&mut context)
//! })?;
//! assert_eq!(answer, Value::Int(42));
//! # Ok::<(), fpipe_engine::PipelineError>(())
//! ```
//!
//! ## Architecture
//!
//! - **`value`**: the [`Value`] data model that steps exchange
//! - **`fields`**: [`ContextFields`], the get/set-by-name capability attributes rely on
//! - **`placeholder`**: [`Variable`], [`Attribute`] and [`Placeholder`]
//! - **`resolve`**: [`eval_vars`]
//! - **`step`**: [`Step`], [`Condition`], [`Args`] and the function builders
//! - **`scope`**: [`VariableContext`] and the scoped [`variables`] helper
//! - **`combinators`**: composition of steps and conditions
//! - **`context`**: [`PipelineContext`], a ready-made field map with its own scope

pub mod combinators;
pub mod context;
pub mod error;
pub mod fields;
pub mod placeholder;
pub mod resolve;
pub mod scope;
pub mod step;
pub mod value;

pub use combinators::{Branch, Term, and_, apply, dict_, if_, list_, not_, or_, pipeline, set_, store, tuple_};
pub use context::{PipelineContext, context};
pub use error::{FieldError, PipelineError, Result};
pub use fields::{ContextFields, FieldValue};
pub use placeholder::{Attribute, Placeholder, Variable};
pub use resolve::eval_vars;
pub use scope::{VariableContext, variables};
pub use step::{Args, Condition, ConditionFn, Step, StepFn, conditionfn, stepfn};
pub use value::{Record, Value, ValueSet};
