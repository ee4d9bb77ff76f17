//! Grouping and aggregate evaluation
//!
//! Rows are bucketed by their group key in first-seen order. Aggregate
//! expressions are evaluated lazily against a group: each one folds its
//! operand over the group's rows through an [`Accumulator`].

use super::expression::evaluate;
use super::runtime::{Frame, JoinedRow, Runtime};
use crate::error::{Error, Result};
use crate::planning::plan::QueryPlan;
use crate::types::expression::{AggregateFunc, Expr};
use indexmap::IndexMap;
use querykit_value::{DataType, Value, evaluator};
use std::cmp::Ordering;
use tracing::trace;

/// Bucket rows by the plan's group key. Without a group key the whole input
/// is a single group, even when empty.
pub(crate) fn group_rows(
    rt: &Runtime,
    plan: &QueryPlan,
    aliases: &[String],
    outer: Option<&Frame>,
    rows: Vec<JoinedRow>,
) -> Result<Vec<Vec<JoinedRow>>> {
    if plan.group_by().is_empty() {
        return Ok(vec![rows]);
    }

    let mut buckets: IndexMap<Vec<Value>, Vec<JoinedRow>> = IndexMap::new();
    for row in rows {
        let frame = Frame::new(aliases, &row, outer);
        let key = plan
            .group_by()
            .iter()
            .map(|expr| evaluate(expr, &frame, rt))
            .collect::<Result<Vec<_>>>()?;
        buckets.entry(key).or_default().push(row);
    }
    trace!(groups = buckets.len(), "grouped rows");
    Ok(buckets.into_values().collect())
}

/// Evaluate one aggregate over the frame's group.
pub(crate) fn aggregate(
    func: AggregateFunc,
    operand: Option<&Expr>,
    frame: &Frame,
    rt: &Runtime,
) -> Result<Value> {
    let group = frame
        .group
        .ok_or_else(|| Error::Evaluation(format!("{:?} outside of a group", func)))?;

    let mut accumulator = accumulator(func);
    for row in group {
        let value = match operand {
            // count(*) counts rows, whatever their values
            None => Value::Bool(true),
            Some(expr) => evaluate(expr, &frame.with_row(row), rt)?,
        };
        accumulator.add(&value)?;
    }
    accumulator.finalize()
}

fn accumulator(func: AggregateFunc) -> Box<dyn Accumulator> {
    match func {
        AggregateFunc::Count => Box::new(CountAccumulator { count: 0 }),
        AggregateFunc::Sum => Box::new(SumAccumulator { sum: Value::Null }),
        AggregateFunc::Avg => Box::new(AvgAccumulator { sum: 0.0, count: 0 }),
        AggregateFunc::Max => Box::new(ExtremeAccumulator {
            current: Value::Null,
            keep: Ordering::Greater,
        }),
        AggregateFunc::Min => Box::new(ExtremeAccumulator {
            current: Value::Null,
            keep: Ordering::Less,
        }),
    }
}

/// Folds the non-null values of a group into one aggregate value
trait Accumulator {
    fn add(&mut self, value: &Value) -> Result<()>;
    fn finalize(self: Box<Self>) -> Result<Value>;
}

struct CountAccumulator {
    count: i64,
}

impl Accumulator for CountAccumulator {
    fn add(&mut self, value: &Value) -> Result<()> {
        if !value.is_null() {
            self.count += 1;
        }
        Ok(())
    }

    fn finalize(self: Box<Self>) -> Result<Value> {
        Ok(Value::I64(self.count))
    }
}

struct SumAccumulator {
    sum: Value,
}

impl Accumulator for SumAccumulator {
    fn add(&mut self, value: &Value) -> Result<()> {
        if value.is_null() {
            return Ok(());
        }
        // integer sums are carried as BIGINT
        let value = if value.is_integer() {
            value.clone().coerce_to(DataType::I64)?
        } else {
            value.clone()
        };
        self.sum = if self.sum.is_null() {
            value
        } else {
            evaluator::add(&self.sum, &value)?
        };
        Ok(())
    }

    fn finalize(self: Box<Self>) -> Result<Value> {
        Ok(self.sum)
    }
}

struct AvgAccumulator {
    sum: f64,
    count: usize,
}

impl Accumulator for AvgAccumulator {
    fn add(&mut self, value: &Value) -> Result<()> {
        if value.is_null() {
            return Ok(());
        }
        let n = evaluator::to_f64(value).ok_or_else(|| {
            Error::Evaluation(format!("cannot average {}", value.type_name()))
        })?;
        self.sum += n;
        self.count += 1;
        Ok(())
    }

    fn finalize(self: Box<Self>) -> Result<Value> {
        if self.count == 0 {
            return Ok(Value::Null);
        }
        Ok(Value::F64(self.sum / self.count as f64))
    }
}

/// max or min, depending on which ordering replaces the current value
struct ExtremeAccumulator {
    current: Value,
    keep: Ordering,
}

impl Accumulator for ExtremeAccumulator {
    fn add(&mut self, value: &Value) -> Result<()> {
        if value.is_null() {
            return Ok(());
        }
        if self.current.is_null() || evaluator::compare(value, &self.current)? == self.keep {
            self.current = value.clone();
        }
        Ok(())
    }

    fn finalize(self: Box<Self>) -> Result<Value> {
        Ok(self.current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fold(func: AggregateFunc, values: &[Value]) -> Value {
        let mut acc = accumulator(func);
        for value in values {
            acc.add(value).unwrap();
        }
        acc.finalize().unwrap()
    }

    #[test]
    fn test_accumulators() {
        let ages = [Value::I32(10), Value::Null, Value::I32(30)];
        assert_eq!(fold(AggregateFunc::Count, &ages), Value::I64(2));
        assert_eq!(fold(AggregateFunc::Sum, &ages), Value::I64(40));
        assert_eq!(fold(AggregateFunc::Avg, &ages), Value::F64(20.0));
        assert_eq!(fold(AggregateFunc::Max, &ages), Value::I32(30));
        assert_eq!(fold(AggregateFunc::Min, &ages), Value::I32(10));
    }

    #[test]
    fn test_empty_group() {
        assert_eq!(fold(AggregateFunc::Count, &[]), Value::I64(0));
        assert_eq!(fold(AggregateFunc::Sum, &[]), Value::Null);
        assert_eq!(fold(AggregateFunc::Avg, &[]), Value::Null);
        assert_eq!(fold(AggregateFunc::Max, &[]), Value::Null);
    }

    #[test]
    fn test_max_of_strings() {
        let names = [Value::string("b"), Value::string("c"), Value::string("a")];
        assert_eq!(fold(AggregateFunc::Max, &names), Value::string("c"));
        assert_eq!(fold(AggregateFunc::Min, &names), Value::string("a"));
    }
}
