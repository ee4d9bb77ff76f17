//! Expression evaluation
//!
//! Turns [`Expr`] trees into values against one [`Frame`]. Types were checked
//! when the expressions were built, so the remaining failures are value
//! faults (division by zero, overflow, narrowing) and cardinality errors of
//! scalar subqueries.

use super::aggregator;
use super::runtime::{Frame, Runtime};
use crate::error::{Error, Result};
use crate::functions;
use crate::types::expression::{BinaryOp, Expr, InSet, UnaryOp};
use querykit_value::{Value, evaluator};

pub(crate) fn evaluate(expr: &Expr, frame: &Frame, rt: &Runtime) -> Result<Value> {
    Ok(match expr {
        Expr::Literal(value) => value.clone(),
        Expr::Column(column) => frame.column(column)?,

        Expr::Unary { op, operand } => {
            let value = evaluate(operand, frame, rt)?;
            unary(*op, &value)?
        }

        // AND/OR skip the right side once the left side decides
        Expr::Binary {
            op: BinaryOp::And,
            left,
            right,
        } => {
            let l = evaluate(left, frame, rt)?;
            if l == Value::Bool(false) {
                return Ok(l);
            }
            evaluator::and(&l, &evaluate(right, frame, rt)?)?
        }
        Expr::Binary {
            op: BinaryOp::Or,
            left,
            right,
        } => {
            let l = evaluate(left, frame, rt)?;
            if l == Value::Bool(true) {
                return Ok(l);
            }
            evaluator::or(&l, &evaluate(right, frame, rt)?)?
        }
        Expr::Binary { op, left, right } => {
            let l = evaluate(left, frame, rt)?;
            let r = evaluate(right, frame, rt)?;
            binary(*op, &l, &r)?
        }

        Expr::Between {
            operand,
            low,
            high,
        } => {
            let value = evaluate(operand, frame, rt)?;
            let low = evaluate(low, frame, rt)?;
            let high = evaluate(high, frame, rt)?;
            evaluator::and(
                &evaluator::compare_with(&value, &low, |o| o.is_ge())?,
                &evaluator::compare_with(&value, &high, |o| o.is_le())?,
            )?
        }

        Expr::In {
            operand,
            set,
            negated,
        } => {
            let value = evaluate(operand, frame, rt)?;
            let found = match set {
                InSet::List(items) => {
                    let items = items
                        .iter()
                        .map(|item| evaluate(item, frame, rt))
                        .collect::<Result<Vec<_>>>()?;
                    contains(&value, &items)?
                }
                InSet::Subquery(plan) => {
                    let items = rt.subquery_values(plan, frame)?;
                    contains(&value, &items)?
                }
            };
            if *negated {
                evaluator::not(&found)?
            } else {
                found
            }
        }

        Expr::Case {
            branches,
            otherwise,
            data_type,
        } => {
            let mut chosen = None;
            for (condition, value) in branches {
                if evaluate(condition, frame, rt)? == Value::Bool(true) {
                    chosen = Some(value);
                    break;
                }
            }
            let value = match (chosen, otherwise) {
                (Some(value), _) => evaluate(value, frame, rt)?,
                (None, Some(otherwise)) => evaluate(otherwise, frame, rt)?,
                (None, None) => {
                    return Err(Error::Evaluation(format!(
                        "no case branch matched in {}",
                        expr
                    )));
                }
            };
            value.coerce_to(*data_type)?
        }

        Expr::Aggregate { func, operand } => {
            aggregator::aggregate(*func, operand.as_deref(), frame, rt)?
        }

        Expr::Subquery(plan) => {
            let values = rt.subquery_values(plan, frame)?;
            match values.len() {
                0 => Value::Null,
                1 => values[0].clone(),
                n => return Err(Error::TooManyResults(n)),
            }
        }

        Expr::Function { name, args, .. } => {
            let args = args
                .iter()
                .map(|arg| evaluate(arg, frame, rt))
                .collect::<Result<Vec<_>>>()?;
            functions::execute_function(name, &args)?
        }
    })
}

/// Whether a predicate result counts as a match. NULL does not.
pub(crate) fn is_match(expr: &Expr, frame: &Frame, rt: &Runtime) -> Result<bool> {
    Ok(evaluate(expr, frame, rt)? == Value::Bool(true))
}

fn unary(op: UnaryOp, value: &Value) -> Result<Value> {
    Ok(match op {
        UnaryOp::Not => evaluator::not(value)?,
        UnaryOp::Negate => evaluator::negate(value)?,
        UnaryOp::IsNull => Value::Bool(value.is_null()),
        UnaryOp::IsNotNull => Value::Bool(!value.is_null()),
        UnaryOp::Lower => functions::execute_function("lower", std::slice::from_ref(value))?,
        UnaryOp::Upper => functions::execute_function("upper", std::slice::from_ref(value))?,
        UnaryOp::StringValue => evaluator::to_text(value),
    })
}

fn binary(op: BinaryOp, l: &Value, r: &Value) -> Result<Value> {
    Ok(match op {
        BinaryOp::Eq => evaluator::equals(l, r)?,
        BinaryOp::Ne => evaluator::not(&evaluator::equals(l, r)?)?,
        BinaryOp::Lt => evaluator::compare_with(l, r, |o| o.is_lt())?,
        BinaryOp::Le => evaluator::compare_with(l, r, |o| o.is_le())?,
        BinaryOp::Gt => evaluator::compare_with(l, r, |o| o.is_gt())?,
        BinaryOp::Ge => evaluator::compare_with(l, r, |o| o.is_ge())?,
        BinaryOp::And => evaluator::and(l, r)?,
        BinaryOp::Or => evaluator::or(l, r)?,
        BinaryOp::Add => evaluator::add(l, r)?,
        BinaryOp::Sub => evaluator::subtract(l, r)?,
        BinaryOp::Mul => evaluator::multiply(l, r)?,
        BinaryOp::Div => evaluator::divide(l, r)?,
        BinaryOp::Concat => evaluator::concat(l, r)?,
        BinaryOp::Like => evaluator::like(l, r)?,
    })
}

/// SQL `IN`: true on a match, NULL when no match but the operand or some
/// element is NULL, false otherwise.
fn contains(value: &Value, items: &[Value]) -> Result<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    let mut saw_null = false;
    for item in items {
        match evaluator::equals(value, item)? {
            Value::Bool(true) => return Ok(Value::Bool(true)),
            Value::Null => saw_null = true,
            _ => {}
        }
    }
    Ok(if saw_null {
        Value::Null
    } else {
        Value::Bool(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_null_semantics() {
        let items = vec![Value::I32(1), Value::Null];
        assert_eq!(contains(&Value::I32(1), &items).unwrap(), Value::Bool(true));
        assert_eq!(contains(&Value::I32(2), &items).unwrap(), Value::Null);
        assert_eq!(
            contains(&Value::I32(2), &[Value::I32(1)]).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(contains(&Value::Null, &[]).unwrap(), Value::Null);
    }

    #[test]
    fn test_binary_ops_follow_null_rules() {
        assert_eq!(
            binary(BinaryOp::Ne, &Value::Null, &Value::I32(1)).unwrap(),
            Value::Null
        );
        assert_eq!(
            binary(BinaryOp::Lt, &Value::I32(1), &Value::I64(2)).unwrap(),
            Value::Bool(true)
        );
        assert!(binary(BinaryOp::Div, &Value::I32(1), &Value::I32(0)).is_err());
    }

    #[test]
    fn test_unary_string_value() {
        assert_eq!(
            unary(UnaryOp::StringValue, &Value::I32(10)).unwrap(),
            Value::string("10")
        );
        assert_eq!(unary(UnaryOp::IsNull, &Value::Null).unwrap(), Value::Bool(true));
    }
}
