//! Value evaluation operations
//!
//! Arithmetic, comparison and boolean logic over [`Value`], keeping the
//! value type itself a pure data representation.

use crate::error::{Error, Result};
use crate::types::{DataType, Value};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use std::cmp::Ordering;

/// Helper to convert any numeric value to Decimal for mixed-type operations
fn to_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::I32(n) => Some(Decimal::from(*n)),
        Value::I64(n) => Some(Decimal::from(*n)),
        Value::F64(n) => Decimal::from_f64(*n),
        Value::Decimal(d) => Some(*d),
        _ => None,
    }
}

/// Helper to convert any numeric value to f64
pub fn to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::I32(n) => Some(*n as f64),
        Value::I64(n) => Some(*n as f64),
        Value::F64(n) => Some(*n),
        Value::Decimal(d) => d.to_f64(),
        _ => None,
    }
}

fn to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::I32(n) => Some(*n as i64),
        Value::I64(n) => Some(*n),
        _ => None,
    }
}

#[derive(Clone, Copy)]
enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithOp {
    fn name(self) -> &'static str {
        match self {
            ArithOp::Add => "addition",
            ArithOp::Sub => "subtraction",
            ArithOp::Mul => "multiplication",
            ArithOp::Div => "division",
        }
    }

    fn i32(self, a: i32, b: i32) -> Option<i32> {
        match self {
            ArithOp::Add => a.checked_add(b),
            ArithOp::Sub => a.checked_sub(b),
            ArithOp::Mul => a.checked_mul(b),
            ArithOp::Div => a.checked_div(b),
        }
    }

    fn i64(self, a: i64, b: i64) -> Option<i64> {
        match self {
            ArithOp::Add => a.checked_add(b),
            ArithOp::Sub => a.checked_sub(b),
            ArithOp::Mul => a.checked_mul(b),
            ArithOp::Div => a.checked_div(b),
        }
    }

    fn f64(self, a: f64, b: f64) -> f64 {
        match self {
            ArithOp::Add => a + b,
            ArithOp::Sub => a - b,
            ArithOp::Mul => a * b,
            ArithOp::Div => a / b,
        }
    }

    fn decimal(self, a: Decimal, b: Decimal) -> Option<Decimal> {
        match self {
            ArithOp::Add => a.checked_add(b),
            ArithOp::Sub => a.checked_sub(b),
            ArithOp::Mul => a.checked_mul(b),
            ArithOp::Div => a.checked_div(b),
        }
    }
}

fn is_zero(value: &Value) -> bool {
    match value {
        Value::I32(n) => *n == 0,
        Value::I64(n) => *n == 0,
        Value::F64(n) => *n == 0.0,
        Value::Decimal(d) => d.is_zero(),
        _ => false,
    }
}

fn arithmetic(left: &Value, right: &Value, op: ArithOp) -> Result<Value> {
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }
    let result_type = left
        .data_type()
        .arithmetic_result(&right.data_type())
        .ok_or_else(|| {
            Error::mismatch("numeric operands", format!("{:?} and {:?}", left, right))
        })?;

    if matches!(op, ArithOp::Div) && is_zero(right) {
        return Err(Error::DivisionByZero);
    }

    let overflow = || Error::Overflow(format!("{} {}", result_type, op.name()));
    match result_type {
        DataType::I32 => match (left, right) {
            (Value::I32(a), Value::I32(b)) => op.i32(*a, *b).map(Value::I32).ok_or_else(overflow),
            _ => Err(overflow()),
        },
        DataType::I64 => {
            let (a, b) = to_i64(left).zip(to_i64(right)).ok_or_else(overflow)?;
            op.i64(a, b).map(Value::I64).ok_or_else(overflow)
        }
        DataType::F64 => {
            let (a, b) = to_f64(left).zip(to_f64(right)).ok_or_else(overflow)?;
            Ok(Value::F64(op.f64(a, b)))
        }
        DataType::Decimal => {
            let (a, b) = to_decimal(left)
                .zip(to_decimal(right))
                .ok_or_else(overflow)?;
            op.decimal(a, b).map(Value::Decimal).ok_or_else(overflow)
        }
        other => Err(Error::mismatch("numeric result", other)),
    }
}

/// Add two values; NULL on either side yields NULL
pub fn add(left: &Value, right: &Value) -> Result<Value> {
    arithmetic(left, right, ArithOp::Add)
}

pub fn subtract(left: &Value, right: &Value) -> Result<Value> {
    arithmetic(left, right, ArithOp::Sub)
}

pub fn multiply(left: &Value, right: &Value) -> Result<Value> {
    arithmetic(left, right, ArithOp::Mul)
}

/// Divide two values. Integer division truncates toward zero.
pub fn divide(left: &Value, right: &Value) -> Result<Value> {
    arithmetic(left, right, ArithOp::Div)
}

pub fn negate(value: &Value) -> Result<Value> {
    let overflow = || Error::Overflow(format!("{} negation", value.data_type()));
    match value {
        Value::Null => Ok(Value::Null),
        Value::I32(n) => n.checked_neg().map(Value::I32).ok_or_else(overflow),
        Value::I64(n) => n.checked_neg().map(Value::I64).ok_or_else(overflow),
        Value::F64(n) => Ok(Value::F64(-n)),
        Value::Decimal(d) => Ok(Value::Decimal(-d)),
        _ => Err(Error::mismatch("numeric", value)),
    }
}

/// Three-valued AND
pub fn and(left: &Value, right: &Value) -> Result<Value> {
    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(*a && *b)),
        (Value::Bool(false), Value::Null) | (Value::Null, Value::Bool(false)) => {
            Ok(Value::Bool(false))
        }
        (Value::Bool(true), Value::Null) | (Value::Null, Value::Bool(true)) => Ok(Value::Null),
        (Value::Null, Value::Null) => Ok(Value::Null),
        _ => Err(Error::mismatch(
            "boolean",
            format!("{:?} and {:?}", left, right),
        )),
    }
}

/// Three-valued OR
pub fn or(left: &Value, right: &Value) -> Result<Value> {
    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(*a || *b)),
        (Value::Bool(true), Value::Null) | (Value::Null, Value::Bool(true)) => {
            Ok(Value::Bool(true))
        }
        (Value::Bool(false), Value::Null) | (Value::Null, Value::Bool(false)) => Ok(Value::Null),
        (Value::Null, Value::Null) => Ok(Value::Null),
        _ => Err(Error::mismatch(
            "boolean",
            format!("{:?} and {:?}", left, right),
        )),
    }
}

pub fn not(value: &Value) -> Result<Value> {
    match value {
        Value::Bool(b) => Ok(Value::Bool(!b)),
        Value::Null => Ok(Value::Null),
        _ => Err(Error::mismatch("boolean", value)),
    }
}

fn compare_f64(a: f64, b: f64) -> Ordering {
    // NaN sorts after every number and equal to itself
    match a.partial_cmp(&b) {
        Some(ord) => ord,
        None if a.is_nan() && b.is_nan() => Ordering::Equal,
        None if a.is_nan() => Ordering::Greater,
        None => Ordering::Less,
    }
}

/// Compare two values of comparable types.
///
/// NULL is less than any value. Numeric values compare across types.
pub fn compare(left: &Value, right: &Value) -> Result<Ordering> {
    match (left, right) {
        (Value::Null, Value::Null) => Ok(Ordering::Equal),
        (Value::Null, _) => Ok(Ordering::Less),
        (_, Value::Null) => Ok(Ordering::Greater),

        (Value::Bool(a), Value::Bool(b)) => Ok(a.cmp(b)),
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),

        (Value::I32(a), Value::I32(b)) => Ok(a.cmp(b)),
        (Value::I64(a), Value::I64(b)) => Ok(a.cmp(b)),
        (Value::F64(a), Value::F64(b)) => Ok(compare_f64(*a, *b)),
        (Value::Decimal(a), Value::Decimal(b)) => Ok(a.cmp(b)),

        // Mixed numeric comparisons
        (a, b) if a.is_integer() && b.is_integer() => match (to_i64(a), to_i64(b)) {
            (Some(x), Some(y)) => Ok(x.cmp(&y)),
            _ => Err(Error::mismatch("integers", format!("{:?} and {:?}", a, b))),
        },
        (a, b) if matches!(a, Value::Decimal(_)) || matches!(b, Value::Decimal(_)) => {
            match (to_decimal(a), to_decimal(b)) {
                (Some(x), Some(y)) => Ok(x.cmp(&y)),
                // F64 values outside the decimal range (NaN, huge) compare as floats
                _ => match (to_f64(a), to_f64(b)) {
                    (Some(x), Some(y)) => Ok(compare_f64(x, y)),
                    _ => Err(Error::mismatch("numeric", format!("{:?} and {:?}", a, b))),
                },
            }
        }
        (a, b) if a.is_numeric() && b.is_numeric() => match (to_f64(a), to_f64(b)) {
            (Some(x), Some(y)) => Ok(compare_f64(x, y)),
            _ => Err(Error::mismatch("numeric", format!("{:?} and {:?}", a, b))),
        },

        _ => Err(Error::mismatch(
            "comparable types",
            format!("{:?} and {:?}", left, right),
        )),
    }
}

fn rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::I32(_) | Value::I64(_) | Value::F64(_) | Value::Decimal(_) => 2,
        Value::Str(_) => 3,
    }
}

/// Total order used for sorting: [`compare`] where the types are
/// comparable, otherwise by type rank.
pub fn total_cmp(left: &Value, right: &Value) -> Ordering {
    compare(left, right).unwrap_or_else(|_| rank(left).cmp(&rank(right)))
}

/// SQL equality: NULL when either side is NULL
pub fn equals(left: &Value, right: &Value) -> Result<Value> {
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }
    Ok(Value::Bool(compare(left, right)? == Ordering::Equal))
}

/// Apply an ordering test (`<`, `>=`, ...) with SQL NULL semantics
pub fn compare_with(
    left: &Value,
    right: &Value,
    test: impl FnOnce(Ordering) -> bool,
) -> Result<Value> {
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }
    Ok(Value::Bool(test(compare(left, right)?)))
}

/// Render a value as text; NULL stays NULL
pub fn to_text(value: &Value) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::Str(s) => Value::Str(s.clone()),
        other => Value::Str(other.to_string()),
    }
}

pub fn concat(left: &Value, right: &Value) -> Result<Value> {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{}{}", a, b))),
        _ => Err(Error::mismatch("strings", format!("{:?} and {:?}", left, right))),
    }
}

/// SQL LIKE with `%` (any run) and `_` (single character) wildcards
pub fn like(value: &Value, pattern: &Value) -> Result<Value> {
    match (value, pattern) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (Value::Str(s), Value::Str(p)) => {
            let text: Vec<char> = s.chars().collect();
            let pat: Vec<char> = p.chars().collect();
            Ok(Value::Bool(like_match(&text, &pat)))
        }
        _ => Err(Error::mismatch("strings", format!("{:?} and {:?}", value, pattern))),
    }
}

fn like_match(text: &[char], pattern: &[char]) -> bool {
    // Iterative wildcard match with single-star backtracking
    let (mut t, mut p) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '_' || pattern[p] == text[t]) {
            t += 1;
            p += 1;
        } else if p < pattern.len() && pattern[p] == '%' {
            star = Some((p, t));
            p += 1;
        } else if let Some((sp, st)) = star {
            p = sp + 1;
            t = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|c| *c == '%')
}
