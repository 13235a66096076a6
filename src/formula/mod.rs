//! Formula evaluation.
//!
//! A formula is a statement sequence that produces its result with
//! `return`, reading two bindings: `inputs` (the component's resolved
//! input values) and `dependencies` (other components' amounts for the
//! same date). Graph code talks to evaluation only through the
//! [`FormulaEvaluator`] trait so tests can substitute a deterministic
//! double.
//!
//! The production [`Interpreter`] walks a parsed AST and has no host
//! access by construction, but that is best-effort containment, not a
//! security boundary.

pub(crate) mod interp;
pub(crate) mod lexer;
pub(crate) mod parser;

pub use interp::Interpreter;

use crate::component::InputValue;
use std::collections::HashMap;
use std::fmt;

/// Evaluates one formula against its bindings, yielding the amount.
pub trait FormulaEvaluator {
    fn evaluate(
        &self,
        source: &str,
        inputs: &HashMap<String, InputValue>,
        dependencies: &HashMap<String, f64>,
    ) -> Result<f64, FormulaError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormulaError {
    /// The source failed to parse. Not retryable.
    Syntax(String),
    /// The formula faulted while running.
    Runtime(String),
}

impl fmt::Display for FormulaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormulaError::Syntax(message) => write!(f, "{message}"),
            FormulaError::Runtime(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for FormulaError {}
