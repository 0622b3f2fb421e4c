//! Error types surfaced by steps, placeholders and variable scopes.
//!
//! Every failure is fail-fast: the first error raised while running a step aborts the
//! enclosing pipeline and reaches the caller of the outermost step unchanged. Failures
//! raised by user step functions travel inside [`PipelineError::Step`] without being
//! re-worded.

use thiserror::Error;

/// Convenience alias used throughout the engine.
pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

/// Error surfaced while building or running a pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A placeholder was created, read or written after its scope was closed.
    #[error("variable scope is closed; cannot {operation} '{name}'")]
    Lifecycle { operation: &'static str, name: String },

    /// A variable was read before any value was stored into it.
    #[error("variable '{name}' was read before a value was stored")]
    UnsetVariable { name: String },

    /// A step returned a bare placeholder instead of its value.
    #[error("step '{step}' returned the pipeline variable '{name}' instead of its value")]
    LeakedHandle { step: String, name: String },

    /// A name already bound in the scope was requested as the other placeholder kind.
    #[error("'{name}' is bound as {found} in this scope, not as {expected}")]
    PlaceholderKind {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    /// Reading or writing a context field failed.
    #[error(transparent)]
    Field(#[from] FieldError),

    /// Failure raised by a user step or condition function.
    #[error(transparent)]
    Step(#[from] anyhow::Error),
}

impl PipelineError {
    pub(crate) fn lifecycle(operation: &'static str, name: impl Into<String>) -> Self {
        Self::Lifecycle {
            operation,
            name: name.into(),
        }
    }
}

/// Error raised by a context's field accessors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FieldError {
    /// The context has no field or key with this name.
    #[error("context has no field '{field}'")]
    Missing { field: String },

    /// The stored value does not fit the field's type.
    #[error("context field '{field}' cannot hold this value (expected {expected})")]
    Type { field: String, expected: &'static str },

    /// The context does not support access by name at all.
    #[error("context of type {context} does not support field access ('{field}')")]
    Unsupported { field: String, context: &'static str },
}
