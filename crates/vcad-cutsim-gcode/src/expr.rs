//! Arithmetic expressions with controller variables.
//!
//! Evaluation is lenient and does NOT follow standard operator precedence.
//! After variable substitution an expression is split on the first
//! occurrence of `+`, then `-`, then `*`, then `/`, and both halves are
//! evaluated recursively: `10-2-3` is `10-(2-3) = 11` and `8/2/2` is
//! `8/(2/2) = 8`.
//!
//! Leaves that do not parse, and division by zero, evaluate to `0.0`. A
//! function whose result is not finite (for example `SQRT(-1)`) fails the
//! whole expression, which [`Evaluator::evaluate`] then reports as `0.0`.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::dialect::Dialect;
use crate::error::{GcodeError, Result};

/// Controller variables by number (`R1` / `#1` both address key `1`).
pub type Variables = HashMap<u32, f64>;

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-+]?\d*\.?\d+$").expect("valid number pattern"));

static FUNCTION_CALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z]+)\((.*)\)$").expect("valid call pattern"));

/// Split operators in the order they are tried.
const OPERATORS: [char; 4] = ['+', '-', '*', '/'];

/// Evaluate `expr` against `variables` in the given dialect.
///
/// Shorthand for [`Evaluator::evaluate`].
pub fn evaluate(expr: &str, dialect: Dialect, variables: &Variables) -> f64 {
    Evaluator::new(dialect, variables).evaluate(expr)
}

/// Expression evaluator bound to a dialect and a variable table.
#[derive(Debug, Clone, Copy)]
pub struct Evaluator<'a> {
    dialect: Dialect,
    variables: &'a Variables,
}

impl<'a> Evaluator<'a> {
    /// Create an evaluator.
    pub fn new(dialect: Dialect, variables: &'a Variables) -> Self {
        Self { dialect, variables }
    }

    /// Evaluate an expression, recovering from any failure with `0.0`.
    pub fn evaluate(&self, expr: &str) -> f64 {
        match self.try_evaluate(expr) {
            Ok(value) => value,
            Err(err) => {
                tracing::trace!("{err}; using 0.0");
                0.0
            }
        }
    }

    /// Evaluate an expression, reporting function failures.
    pub fn try_evaluate(&self, expr: &str) -> Result<f64> {
        let compact: String = expr.chars().filter(|c| !c.is_whitespace()).collect();
        self.eval(&compact)
    }

    fn eval(&self, expr: &str) -> Result<f64> {
        let expr = self.substitute(expr);
        let expr = expr.as_ref();

        if NUMBER.is_match(expr) {
            return Ok(parse_leaf(expr));
        }

        if let Some(caps) = FUNCTION_CALL.captures(expr) {
            let argument = self.eval(&caps[2])?;
            return match apply_function(&caps[1], argument) {
                Some(value) if value.is_finite() => Ok(value),
                Some(value) => Err(GcodeError::MalformedExpression {
                    expr: expr.to_string(),
                    reason: format!("{}({argument}) is {value}", &caps[1]),
                }),
                None => Ok(0.0),
            };
        }

        for op in OPERATORS {
            if op == '-' && expr.starts_with('-') {
                continue;
            }
            let Some((left, right)) = expr.split_once(op) else {
                continue;
            };
            return match op {
                '+' => Ok(self.eval(left)? + self.eval(right)?),
                '-' => Ok(self.eval(left)? - self.eval(right)?),
                '*' => Ok(self.eval(left)? * self.eval(right)?),
                _ => {
                    let denominator = self.eval(right)?;
                    if denominator == 0.0 {
                        Ok(0.0)
                    } else {
                        Ok(self.eval(left)? / denominator)
                    }
                }
            };
        }

        Ok(parse_leaf(expr))
    }

    /// Replace every variable reference with its value (unknown → 0).
    fn substitute<'e>(&self, expr: &'e str) -> Cow<'e, str> {
        let pattern = &self.dialect.grammar().variable;
        pattern.replace_all(expr, |caps: &Captures| {
            let value = caps[1]
                .parse::<u32>()
                .ok()
                .and_then(|n| self.variables.get(&n).copied())
                .unwrap_or(0.0);
            format!("{value}")
        })
    }
}

/// Parse a leaf operand; anything that is not a finite float is `0.0`.
fn parse_leaf(text: &str) -> f64 {
    text.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Apply a named function. Unknown names yield `None`.
fn apply_function(name: &str, x: f64) -> Option<f64> {
    let value = match name {
        "DC" => x,
        "SIN" => x.sin(),
        "COS" => x.cos(),
        "TAN" => x.tan(),
        "ABS" => x.abs(),
        "SQRT" => x.sqrt(),
        "ROUND" => x.round_ties_even(),
        "INT" => x.trunc(),
        "EXP" => x.exp(),
        "LN" => x.ln(),
        _ => return None,
    };
    Some(value)
}
