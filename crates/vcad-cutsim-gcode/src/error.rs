//! Error types for G-code interpretation.

use thiserror::Error;

use crate::arc::DegenerateArc;

/// Errors raised while reading G-code.
///
/// None of these abort a parse: the interpreter recovers from malformed
/// expressions with `0.0` and from degenerate arcs with a linear move. They
/// surface through the fallible entry points ([`crate::Evaluator::try_evaluate`],
/// [`crate::Dialect::from_name`]) and in trace output.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GcodeError {
    /// An arithmetic expression could not be evaluated.
    #[error("malformed expression `{expr}`: {reason}")]
    MalformedExpression {
        /// The expression after variable substitution.
        expr: String,
        /// What went wrong.
        reason: String,
    },

    /// Arc words were insufficient or infeasible.
    #[error("degenerate arc: {0}")]
    DegenerateArc(#[from] DegenerateArc),

    /// The requested controller dialect is not supported.
    #[error("unknown dialect: {0}")]
    UnknownDialect(String),
}

/// Result type for G-code operations.
pub type Result<T> = std::result::Result<T, GcodeError>;
