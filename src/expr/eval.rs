//! Expression evaluation against a binding snapshot.
//!
//! Evaluation is pure except for the top-level assignment form, which writes
//! back through the binding store. Name lookup order: scope variables, the
//! `args` array, then top-level bindings. Unknown names evaluate to `null`
//! rather than failing, matching how missing document data should degrade.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Number, Value};

use crate::binding::BindingStore;

use super::ast::{BinaryOp, Expr, Program, UnaryOp};
use super::parser::{self, ParseError};

/// Errors from evaluation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExprError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("type error: {0}")]
    Type(String),
    #[error("unknown function '{0}'")]
    UnknownFunction(String),
    #[error("function '{function}' expects {expected} argument(s), got {got}")]
    BadArity {
        function: &'static str,
        expected: usize,
        got: usize,
    },
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Everything an expression can see: a binding snapshot, the positional
/// scope values, and per-evaluation extras like the current event payload.
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    bindings: Map<String, Value>,
    scope: Vec<Value>,
    extra: Map<String, Value>,
}

impl EvalContext {
    /// Capture the store's current merged snapshot.
    pub fn new(store: &BindingStore) -> Self {
        Self {
            bindings: store.values(),
            scope: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Set the positional scope values, visible as `args`.
    pub fn with_scope(mut self, scope: Vec<Value>) -> Self {
        self.scope = scope;
        self
    }

    /// Add a named extra, shadowing bindings of the same name.
    pub fn with_var(mut self, name: impl Into<String>, value: Value) -> Self {
        self.extra.insert(name.into(), value);
        self
    }

    fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.extra.get(name) {
            return Some(value.clone());
        }
        if name == "args" {
            return Some(Value::Array(self.scope.clone()));
        }
        self.bindings.get(name).cloned()
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Run a program. Value programs evaluate in a snapshot of the store;
/// assignment programs additionally write the result back.
pub fn run(
    program: &Program,
    store: &mut BindingStore,
    scope: &[Value],
    extra: &Map<String, Value>,
) -> Result<Value, ExprError> {
    let mut context = EvalContext::new(store).with_scope(scope.to_vec());
    for (name, value) in extra {
        context = context.with_var(name, value.clone());
    }
    match program {
        Program::Value(expr) => eval(expr, &context),
        Program::Assign { target, value } => {
            let result = eval(value, &context)?;
            // Intermediate path segments must already exist, as in the
            // non-recursive write form.
            store.set_value(target, result.clone(), false);
            Ok(result)
        }
    }
}

/// Evaluate a value expression in a context.
pub fn eval(expr: &Expr, context: &EvalContext) -> Result<Value, ExprError> {
    match expr {
        Expr::Number(number) => Ok(number_value(*number)),
        Expr::Str(text) => Ok(Value::String(text.clone())),
        Expr::Bool(flag) => Ok(Value::Bool(*flag)),
        Expr::Null => Ok(Value::Null),
        Expr::Ident(name) => Ok(context.lookup(name).unwrap_or(Value::Null)),
        Expr::Member { object, property } => {
            let object = eval(object, context)?;
            Ok(match object {
                Value::Object(map) => map.get(property).cloned().unwrap_or(Value::Null),
                _ => Value::Null,
            })
        }
        Expr::Index { object, index } => {
            let object = eval(object, context)?;
            let index = eval(index, context)?;
            Ok(index_value(&object, &index))
        }
        Expr::Unary { op, operand } => {
            let operand = eval(operand, context)?;
            match op {
                UnaryOp::Not => Ok(Value::Bool(!truthy(&operand))),
                UnaryOp::Neg => {
                    let number = to_number(&operand)
                        .ok_or_else(|| ExprError::Type("cannot negate a non-number".into()))?;
                    Ok(number_value(-number))
                }
            }
        }
        Expr::Binary { op, left, right } => eval_binary(*op, left, right, context),
        Expr::Ternary {
            condition,
            then_branch,
            else_branch,
        } => {
            if truthy(&eval(condition, context)?) {
                eval(then_branch, context)
            } else {
                eval(else_branch, context)
            }
        }
        Expr::Call { function, args } => {
            let args = args
                .iter()
                .map(|arg| eval(arg, context))
                .collect::<Result<Vec<_>, _>>()?;
            call(function, &args)
        }
    }
}

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

fn eval_binary(
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
    context: &EvalContext,
) -> Result<Value, ExprError> {
    // Boolean operators short-circuit and keep operand values.
    match op {
        BinaryOp::And => {
            let left = eval(left, context)?;
            return if truthy(&left) { eval(right, context) } else { Ok(left) };
        }
        BinaryOp::Or => {
            let left = eval(left, context)?;
            return if truthy(&left) { Ok(left) } else { eval(right, context) };
        }
        _ => {}
    }

    let left = eval(left, context)?;
    let right = eval(right, context)?;
    match op {
        BinaryOp::Add => {
            if left.is_string() || right.is_string() {
                Ok(Value::String(format!("{}{}", display(&left), display(&right))))
            } else {
                arithmetic(&left, &right, "+", |a, b| a + b)
            }
        }
        BinaryOp::Sub => arithmetic(&left, &right, "-", |a, b| a - b),
        BinaryOp::Mul => arithmetic(&left, &right, "*", |a, b| a * b),
        BinaryOp::Div => arithmetic(&left, &right, "/", |a, b| a / b),
        BinaryOp::Rem => arithmetic(&left, &right, "%", |a, b| a % b),
        BinaryOp::Eq => Ok(Value::Bool(loose_eq(&left, &right))),
        BinaryOp::NotEq => Ok(Value::Bool(!loose_eq(&left, &right))),
        BinaryOp::Lt => compare(&left, &right, |ordering| ordering.is_lt()),
        BinaryOp::Le => compare(&left, &right, |ordering| ordering.is_le()),
        BinaryOp::Gt => compare(&left, &right, |ordering| ordering.is_gt()),
        BinaryOp::Ge => compare(&left, &right, |ordering| ordering.is_ge()),
        BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
    }
}

fn arithmetic(
    left: &Value,
    right: &Value,
    op: &str,
    apply: impl Fn(f64, f64) -> f64,
) -> Result<Value, ExprError> {
    match (to_number(left), to_number(right)) {
        (Some(a), Some(b)) => Ok(number_value(apply(a, b))),
        _ => Err(ExprError::Type(format!("'{op}' needs numeric operands"))),
    }
}

fn compare(
    left: &Value,
    right: &Value,
    accept: impl Fn(std::cmp::Ordering) -> bool,
) -> Result<Value, ExprError> {
    let ordering = match (left, right) {
        (Value::String(a), Value::String(b)) => a.cmp(b),
        _ => match (to_number(left), to_number(right)) {
            (Some(a), Some(b)) => a
                .partial_cmp(&b)
                .ok_or_else(|| ExprError::Type("cannot order NaN".into()))?,
            _ => return Err(ExprError::Type("operands are not comparable".into())),
        },
    };
    Ok(Value::Bool(accept(ordering)))
}

fn loose_eq(left: &Value, right: &Value) -> bool {
    match (to_number(left), to_number(right)) {
        (Some(a), Some(b)) if left.is_number() && right.is_number() => a == b,
        _ => left == right,
    }
}

fn index_value(object: &Value, index: &Value) -> Value {
    match (object, index) {
        (Value::Array(items), _) => to_number(index)
            .filter(|number| *number >= 0.0)
            .and_then(|number| items.get(number as usize))
            .cloned()
            .unwrap_or(Value::Null),
        (Value::Object(map), Value::String(key)) => map.get(key).cloned().unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

// ---------------------------------------------------------------------------
// Allow-listed functions
// ---------------------------------------------------------------------------

fn call(function: &str, args: &[Value]) -> Result<Value, ExprError> {
    match function {
        "len" => {
            let [arg] = expect_args::<1>("len", args)?;
            let length = match arg {
                Value::String(text) => text.chars().count(),
                Value::Array(items) => items.len(),
                Value::Object(map) => map.len(),
                _ => return Err(ExprError::Type("len() needs a string, array or object".into())),
            };
            Ok(number_value(length as f64))
        }
        "str" => {
            let [arg] = expect_args::<1>("str", args)?;
            Ok(Value::String(display(arg)))
        }
        "num" => {
            let [arg] = expect_args::<1>("num", args)?;
            Ok(to_number(arg).map(number_value).unwrap_or(Value::Null))
        }
        "min" | "max" => {
            if args.is_empty() {
                return Err(ExprError::BadArity {
                    function: if function == "min" { "min" } else { "max" },
                    expected: 1,
                    got: 0,
                });
            }
            let mut best: Option<f64> = None;
            for arg in args {
                let number = to_number(arg)
                    .ok_or_else(|| ExprError::Type(format!("{function}() needs numbers")))?;
                best = Some(match best {
                    Some(current) if function == "min" => current.min(number),
                    Some(current) => current.max(number),
                    None => number,
                });
            }
            Ok(best.map(number_value).unwrap_or(Value::Null))
        }
        "abs" => numeric_fn("abs", args, f64::abs),
        "round" => numeric_fn("round", args, f64::round),
        "floor" => numeric_fn("floor", args, f64::floor),
        "ceil" => numeric_fn("ceil", args, f64::ceil),
        "upper" => string_fn("upper", args, |text| text.to_uppercase()),
        "lower" => string_fn("lower", args, |text| text.to_lowercase()),
        "trim" => string_fn("trim", args, |text| text.trim().to_string()),
        "contains" => {
            let [haystack, needle] = expect_args::<2>("contains", args)?;
            let found = match haystack {
                Value::String(text) => match needle {
                    Value::String(sub) => text.contains(sub.as_str()),
                    _ => text.contains(&display(needle)),
                },
                Value::Array(items) => items.contains(needle),
                _ => {
                    return Err(ExprError::Type("contains() needs a string or array".into()));
                }
            };
            Ok(Value::Bool(found))
        }
        other => Err(ExprError::UnknownFunction(other.to_string())),
    }
}

fn expect_args<'a, const N: usize>(
    function: &'static str,
    args: &'a [Value],
) -> Result<&'a [Value; N], ExprError> {
    args.try_into().map_err(|_| ExprError::BadArity {
        function,
        expected: N,
        got: args.len(),
    })
}

fn numeric_fn(
    function: &'static str,
    args: &[Value],
    apply: impl Fn(f64) -> f64,
) -> Result<Value, ExprError> {
    let [arg] = expect_args::<1>(function, args)?;
    let number = to_number(arg)
        .ok_or_else(|| ExprError::Type(format!("{function}() needs a number")))?;
    Ok(number_value(apply(number)))
}

fn string_fn(
    function: &'static str,
    args: &[Value],
    apply: impl Fn(&str) -> String,
) -> Result<Value, ExprError> {
    let [arg] = expect_args::<1>(function, args)?;
    match arg {
        Value::String(text) => Ok(Value::String(apply(text))),
        _ => Err(ExprError::Type(format!("{function}() needs a string"))),
    }
}

// ---------------------------------------------------------------------------
// Coercions
// ---------------------------------------------------------------------------

/// Truthiness: null and false are false, zero and NaN are false, the empty
/// string is false, everything else is true.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().map(|n| n != 0.0 && !n.is_nan()).unwrap_or(false),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Render a value for string concatenation and `str()`.
pub fn display(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => "null".to_string(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// Build a JSON number, preferring integer representation. Non-finite
/// results collapse to null.
fn number_value(number: f64) -> Value {
    if number.fract() == 0.0 && number.is_finite() && number.abs() < i64::MAX as f64 {
        Value::Number(Number::from(number as i64))
    } else {
        Number::from_f64(number).map(Value::Number).unwrap_or(Value::Null)
    }
}

// ---------------------------------------------------------------------------
// Compile cache
// ---------------------------------------------------------------------------

/// Compile-once cache keyed by source text. Shared by a renderer across
/// passes so hot expressions parse only once.
#[derive(Debug, Default)]
pub struct ExprCache {
    compiled: RefCell<HashMap<String, Arc<Program>>>,
}

impl ExprCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `source`, reusing the cached program when available.
    pub fn compile(&self, source: &str) -> Result<Arc<Program>, ParseError> {
        if let Some(hit) = self.compiled.borrow().get(source) {
            return Ok(Arc::clone(hit));
        }
        let program = Arc::new(parser::parse(source)?);
        self.compiled
            .borrow_mut()
            .insert(source.to_owned(), Arc::clone(&program));
        Ok(program)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.compiled.borrow().len()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
