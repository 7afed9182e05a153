//! Rewrite-time and run-time errors

use framemacros_ast::UnknownKind;
use framemacros_ir::SpecError;
use framemacros_registry::RegistryError;
use thiserror::Error;

/// Failure while evaluating a synthesized function, a selector or a sink expression.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    #[error("Undefined variable `{0}`")]
    UndefinedVariable(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error("No operator {op} for operand types {types:?}")]
    TypeMismatch { op: String, types: Vec<&'static str> },

    #[error("Condition must be a bool, got {0}")]
    NonBooleanCondition(&'static str),

    #[error("Index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: i64, len: usize },

    #[error("Cannot destructure {actual} value(s) into {expected} target(s)")]
    DestructureMismatch { expected: usize, actual: usize },

    #[error("Column reference {0} was not bound to a parameter")]
    UnboundColumnReference(String),

    #[error("Cannot broadcast shapes {shapes:?}")]
    ShapeMismatch { shapes: Vec<Vec<usize>> },

    #[error("{0}")]
    Arithmetic(String),

    #[error("Function expects {expected} argument(s), got {actual}")]
    ArityMismatch { expected: usize, actual: usize },

    #[error("Unsupported expression: {0}")]
    Unsupported(String),
}

/// Failure while rewriting or binding one argument.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RewriteError {
    #[error("Malformed directive @{directives}: {reason}")]
    MalformedDirective { directives: String, reason: String },

    #[error("Conflicting directives @{directives}: row and column mode are exclusive")]
    ConflictingDirective { directives: String },

    #[error("Directive @{directive} cannot wrap `{target}`: {reason}")]
    InvalidDirectiveTarget {
        directive: String,
        target: String,
        reason: String,
    },

    #[error("Ambiguous reference `{name}`: neither a column reference nor a value in scope")]
    AmbiguousReference { name: String },

    #[error("Duplicate target column `{name}`")]
    DuplicateTarget { name: String },

    #[error("Cannot broadcast shapes {shapes:?}")]
    BroadcastShapeMismatch { shapes: Vec<Vec<usize>> },

    #[error("Cannot resolve column specifier {spec}: {reason}")]
    UnresolvableColumnSpecifier { spec: String, reason: String },

    #[error("Column assignment `{target}` is only allowed as the argument target or inside @t")]
    UnexpectedAssignment { target: String },

    #[error(transparent)]
    Evaluation(#[from] EvalError),
}

impl RewriteError {
    /// Lift a failure from evaluating `expr` against the caller scope.
    pub(crate) fn from_scope_eval(err: EvalError, expr: &impl std::fmt::Display) -> Self {
        match err {
            EvalError::UndefinedVariable(name) => RewriteError::AmbiguousReference { name },
            EvalError::Spec(err) => RewriteError::UnresolvableColumnSpecifier {
                spec: expr.to_string(),
                reason: err.to_string(),
            },
            other => RewriteError::Evaluation(other),
        }
    }
}

/// A rewrite error with the position of the call part that caused it.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlanError {
    #[error("argument {}: {source}", .index + 1)]
    Argument {
        index: usize,
        #[source]
        source: RewriteError,
    },

    #[error("option `{name}`: {source}")]
    Option {
        name: String,
        #[source]
        source: RewriteError,
    },

    #[error(transparent)]
    UnknownKind(#[from] UnknownKind),
}

impl PlanError {
    pub fn rewrite_error(&self) -> Option<&RewriteError> {
        match self {
            PlanError::Argument { source, .. } | PlanError::Option { source, .. } => Some(source),
            PlanError::UnknownKind(_) => None,
        }
    }
}
