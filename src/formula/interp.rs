//! Tree-walking evaluation of parsed formulas.

use crate::component::InputValue;
use crate::formula::parser::{self, BinaryOp, Expr, Stmt, UnaryOp};
use crate::formula::{FormulaError, FormulaEvaluator};
use std::collections::HashMap;

/// The production formula evaluator.
///
/// Parses the source on every call and walks the AST. Arithmetic follows
/// the loose conventions the formulas were written against: reading a
/// missing `inputs`/`dependencies` key yields NaN, arithmetic on NaN stays
/// NaN, and `+` concatenates when either side is text. Referencing an
/// undeclared identifier or treating a scalar as a table is a runtime
/// fault.
#[derive(Debug, Clone, Copy, Default)]
pub struct Interpreter;

impl Interpreter {
    pub fn new() -> Self {
        Self
    }
}

impl FormulaEvaluator for Interpreter {
    fn evaluate(
        &self,
        source: &str,
        inputs: &HashMap<String, InputValue>,
        dependencies: &HashMap<String, f64>,
    ) -> Result<f64, FormulaError> {
        let statements = parser::parse(source)?;

        let mut scope: HashMap<String, Value> = HashMap::new();
        scope.insert(
            "inputs".to_string(),
            Value::Table(
                inputs
                    .iter()
                    .map(|(id, value)| (id.clone(), Value::from(value.clone())))
                    .collect(),
            ),
        );
        scope.insert(
            "dependencies".to_string(),
            Value::Table(
                dependencies
                    .iter()
                    .map(|(id, amount)| (id.clone(), Value::Number(*amount)))
                    .collect(),
            ),
        );

        let returned = exec_block(&statements, &mut scope)?;
        Ok(returned.map_or(f64::NAN, |value| value.to_amount()))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Number(f64),
    Text(String),
    Bool(bool),
    Table(HashMap<String, Value>),
}

impl From<InputValue> for Value {
    fn from(value: InputValue) -> Self {
        match value {
            InputValue::Number(n) => Value::Number(n),
            InputValue::Text(s) => Value::Text(s),
            InputValue::Bool(b) => Value::Bool(b),
        }
    }
}

impl Value {
    fn to_amount(&self) -> f64 {
        match self {
            Value::Number(n) => *n,
            Value::Bool(true) => 1.0,
            Value::Bool(false) => 0.0,
            Value::Text(s) => s.trim().parse().unwrap_or(f64::NAN),
            Value::Table(_) => f64::NAN,
        }
    }

    fn as_number(&self) -> f64 {
        match self {
            Value::Number(n) => *n,
            Value::Bool(true) => 1.0,
            Value::Bool(false) => 0.0,
            _ => f64::NAN,
        }
    }

    fn truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Text(s) => !s.is_empty(),
            Value::Table(_) => true,
        }
    }

    fn render(&self) -> String {
        match self {
            Value::Number(n) => n.to_string(),
            Value::Text(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            Value::Table(_) => "[table]".to_string(),
        }
    }
}

/// Runs a statement list; `Some` carries the value of the first `return`.
fn exec_block(
    statements: &[Stmt],
    scope: &mut HashMap<String, Value>,
) -> Result<Option<Value>, FormulaError> {
    for statement in statements {
        match statement {
            Stmt::Let { name, value } => {
                let value = eval(value, scope)?;
                scope.insert(name.clone(), value);
            }
            Stmt::Return(value) => return Ok(Some(eval(value, scope)?)),
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let branch = if eval(condition, scope)?.truthy() {
                    then_branch
                } else {
                    else_branch
                };
                if let Some(returned) = exec_block(branch, scope)? {
                    return Ok(Some(returned));
                }
            }
            Stmt::Expr(value) => {
                eval(value, scope)?;
            }
        }
    }
    Ok(None)
}

fn eval(expr: &Expr, scope: &HashMap<String, Value>) -> Result<Value, FormulaError> {
    match expr {
        Expr::Number(n) => Ok(Value::Number(*n)),
        Expr::Text(s) => Ok(Value::Text(s.clone())),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Ident(name) => scope.get(name).cloned().ok_or_else(|| {
            FormulaError::Runtime(format!("'{name}' is not defined"))
        }),
        Expr::Member { object, field } => {
            let object = eval(object, scope)?;
            match object {
                // A key absent from the table reads as NaN rather than
                // faulting; arithmetic then poisons the result.
                Value::Table(entries) => {
                    Ok(entries.get(field).cloned().unwrap_or(Value::Number(f64::NAN)))
                }
                other => Err(FormulaError::Runtime(format!(
                    "cannot read '{field}' of {}",
                    other.render()
                ))),
            }
        }
        Expr::Unary { op, operand } => {
            let operand = eval(operand, scope)?;
            Ok(match op {
                UnaryOp::Neg => Value::Number(-operand.as_number()),
                UnaryOp::Not => Value::Bool(!operand.truthy()),
            })
        }
        Expr::Binary { op, lhs, rhs } => {
            match op {
                // Short-circuiting, result is the boolean of the outcome.
                BinaryOp::And => {
                    let lhs = eval(lhs, scope)?;
                    if !lhs.truthy() {
                        return Ok(Value::Bool(false));
                    }
                    return Ok(Value::Bool(eval(rhs, scope)?.truthy()));
                }
                BinaryOp::Or => {
                    let lhs = eval(lhs, scope)?;
                    if lhs.truthy() {
                        return Ok(Value::Bool(true));
                    }
                    return Ok(Value::Bool(eval(rhs, scope)?.truthy()));
                }
                _ => {}
            }

            let lhs = eval(lhs, scope)?;
            let rhs = eval(rhs, scope)?;
            Ok(match op {
                BinaryOp::Add => match (&lhs, &rhs) {
                    (Value::Text(_), _) | (_, Value::Text(_)) => {
                        Value::Text(format!("{}{}", lhs.render(), rhs.render()))
                    }
                    _ => Value::Number(lhs.as_number() + rhs.as_number()),
                },
                BinaryOp::Sub => Value::Number(lhs.as_number() - rhs.as_number()),
                BinaryOp::Mul => Value::Number(lhs.as_number() * rhs.as_number()),
                BinaryOp::Div => Value::Number(lhs.as_number() / rhs.as_number()),
                BinaryOp::Rem => Value::Number(lhs.as_number() % rhs.as_number()),
                BinaryOp::Eq => Value::Bool(lhs == rhs),
                BinaryOp::NotEq => Value::Bool(lhs != rhs),
                BinaryOp::Less => Value::Bool(lhs.as_number() < rhs.as_number()),
                BinaryOp::LessEq => Value::Bool(lhs.as_number() <= rhs.as_number()),
                BinaryOp::Greater => Value::Bool(lhs.as_number() > rhs.as_number()),
                BinaryOp::GreaterEq => Value::Bool(lhs.as_number() >= rhs.as_number()),
                BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
            })
        }
    }
}
