//! ORDER BY evaluation with deterministic tie-breaking

use super::expression::evaluate;
use super::runtime::{Frame, Runtime};
use super::select::Unit;
use crate::config::NullSort;
use crate::error::Result;
use crate::planning::plan::QueryPlan;
use crate::store::RowId;
use crate::types::query::{Direction, NullOrder, OrderSpec};
use querykit_value::{Value, evaluator};
use std::cmp::Ordering;

/// Where NULL keys go when the sort key does not say.
fn null_order(spec: &OrderSpec, default: NullSort) -> NullOrder {
    if let Some(nulls) = spec.nulls {
        return nulls;
    }
    match (default, spec.direction) {
        (NullSort::Smallest, Direction::Asc) | (NullSort::Largest, Direction::Desc) => {
            NullOrder::First
        }
        (NullSort::Smallest, Direction::Desc) | (NullSort::Largest, Direction::Asc) => {
            NullOrder::Last
        }
    }
}

fn compare_key(a: &Value, b: &Value, direction: Direction, nulls: NullOrder) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) if nulls == NullOrder::First => Ordering::Less,
        (true, false) => Ordering::Greater,
        (false, true) if nulls == NullOrder::First => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => {
            let ord = evaluator::total_cmp(a, b);
            match direction {
                Direction::Asc => ord,
                Direction::Desc => ord.reverse(),
            }
        }
    }
}

/// Row identities of every slot, empty slots first.
fn identity(unit: &Unit) -> Vec<Option<RowId>> {
    unit.row
        .slots
        .iter()
        .map(|slot| slot.as_ref().map(|r| r.id))
        .collect()
}

/// Sort units by the plan's keys. Plain rows then break ties on row
/// identity; aggregated rows keep first-seen group order.
pub(crate) fn sort_units(
    rt: &Runtime,
    plan: &QueryPlan,
    aliases: &[String],
    outer: Option<&Frame>,
    units: Vec<Unit>,
) -> Result<Vec<Unit>> {
    let null_sort = rt.config().null_sort;
    let orders: Vec<(Direction, NullOrder)> = plan
        .order_by()
        .iter()
        .map(|spec| (spec.direction, null_order(spec, null_sort)))
        .collect();

    let mut keyed = Vec::with_capacity(units.len());
    for (seen, unit) in units.into_iter().enumerate() {
        let frame = Frame {
            aliases,
            row: &unit.row,
            group: unit.group.as_deref(),
            outer,
        };
        let keys = plan
            .order_by()
            .iter()
            .map(|spec| evaluate(&spec.expr, &frame, rt))
            .collect::<Result<Vec<_>>>()?;
        let tie = if plan.is_aggregate() {
            Vec::new()
        } else {
            identity(&unit)
        };
        keyed.push((keys, tie, seen, unit));
    }

    keyed.sort_by(|(a, a_tie, a_seen, _), (b, b_tie, b_seen, _)| {
        a.iter()
            .zip(b)
            .zip(&orders)
            .map(|((a, b), (direction, nulls))| compare_key(a, b, *direction, *nulls))
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
            .then_with(|| a_tie.cmp(b_tie))
            .then_with(|| a_seen.cmp(b_seen))
    });
    Ok(keyed.into_iter().map(|(_, _, _, unit)| unit).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::expression::Expr;

    #[test]
    fn test_default_null_placement() {
        let asc = Expr::lit(1).asc();
        let desc = Expr::lit(1).desc();
        assert_eq!(null_order(&asc, NullSort::Smallest), NullOrder::First);
        assert_eq!(null_order(&desc, NullSort::Smallest), NullOrder::Last);
        assert_eq!(null_order(&asc, NullSort::Largest), NullOrder::Last);
        assert_eq!(null_order(&desc.nulls_first(), NullSort::Smallest), NullOrder::First);
    }

    #[test]
    fn test_compare_key_nulls_last_desc() {
        let ord = compare_key(&Value::Null, &Value::I32(1), Direction::Desc, NullOrder::Last);
        assert_eq!(ord, Ordering::Greater);
        let ord = compare_key(&Value::I32(2), &Value::I32(1), Direction::Desc, NullOrder::Last);
        assert_eq!(ord, Ordering::Less);
    }
}
