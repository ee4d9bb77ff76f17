//! The select pipeline
//!
//! join → filter → group → having → order → window → project. Counting
//! stops after `having`, so counts never depend on the window or the order.

use super::aggregator;
use super::expression::{evaluate, is_match};
use super::join::NestedLoopJoiner;
use super::order;
use super::runtime::{Frame, JoinedRow, Runtime};
use crate::config::OrderingStrictness;
use crate::error::{Error, Result};
use crate::planning::plan::QueryPlan;
use crate::store::StoredRow;
use crate::types::query::Selection;
use crate::types::schema::{Field, RecordType};
use crate::types::tuple::{Cell, Entity, Related, Tuple};
use querykit_value::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{trace, warn};

/// A row past filtering: a joined row, or a group represented by its
/// first row.
pub(crate) struct Unit {
    pub row: JoinedRow,
    pub group: Option<Vec<JoinedRow>>,
}

impl Unit {
    fn frame<'a>(&'a self, aliases: &'a [String], outer: Option<&'a Frame<'a>>) -> Frame<'a> {
        Frame {
            aliases,
            row: &self.row,
            group: self.group.as_deref(),
            outer,
        }
    }
}

/// The slice of ordered results to materialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Window {
    pub offset: usize,
    pub limit: Option<usize>,
}

impl Window {
    /// The plan's own offset and limit.
    pub fn of(plan: &QueryPlan) -> Self {
        Window {
            offset: plan.offset().unwrap_or(0),
            limit: plan.limit(),
        }
    }

    /// At most the first row of the plan's window.
    pub fn first(plan: &QueryPlan) -> Self {
        Window {
            offset: plan.offset().unwrap_or(0),
            limit: Some(plan.limit().map_or(1, |limit| limit.min(1))),
        }
    }

    fn is_paged(&self) -> bool {
        self.offset > 0 || self.limit.is_some()
    }
}

pub(crate) struct Output {
    pub tuples: Vec<Tuple>,
    /// Result rows before the window was applied.
    pub total: usize,
}

fn aliases(plan: &QueryPlan) -> Vec<String> {
    plan.sources().map(|s| s.alias().to_string()).collect()
}

/// Run a plan and materialize the rows inside `window`.
pub(crate) fn run(
    rt: &Runtime,
    plan: &QueryPlan,
    outer: Option<&Frame>,
    window: Window,
) -> Result<Output> {
    let aliases = aliases(plan);
    let units = candidates(rt, plan, &aliases, outer)?;
    let total = units.len();

    if window.is_paged() && plan.order_by().is_empty() && total > 1 {
        match rt.config().ordering {
            OrderingStrictness::Strict => {
                return Err(Error::AmbiguousOrdering(format!(
                    "paging {} rows of {} without order_by",
                    total,
                    plan.root().alias()
                )));
            }
            OrderingStrictness::Warn => warn!(
                root = plan.root().alias(),
                rows = total,
                "paging without order_by, results follow row identity"
            ),
        }
    }

    let units = order::sort_units(rt, plan, &aliases, outer, units)?;
    let labels = Arc::new(plan.labels());
    let tuples = units
        .iter()
        .skip(window.offset)
        .take(window.limit.unwrap_or(usize::MAX))
        .map(|unit| project(rt, plan, &aliases, outer, &labels, unit))
        .collect::<Result<Vec<_>>>()?;

    trace!(total, returned = tuples.len(), "select finished");
    Ok(Output { tuples, total })
}

/// Number of result rows, ignoring window and order.
pub(crate) fn count(rt: &Runtime, plan: &QueryPlan) -> Result<usize> {
    let aliases = aliases(plan);
    Ok(candidates(rt, plan, &aliases, None)?.len())
}

fn candidates(
    rt: &Runtime,
    plan: &QueryPlan,
    aliases: &[String],
    outer: Option<&Frame>,
) -> Result<Vec<Unit>> {
    let joined = NestedLoopJoiner::new(rt, plan, aliases, outer).join()?;

    let mut rows = Vec::with_capacity(joined.len());
    for row in joined {
        let keep = match plan.predicate().expr() {
            Some(predicate) => is_match(predicate, &Frame::new(aliases, &row, outer), rt)?,
            None => true,
        };
        if keep {
            rows.push(row);
        }
    }

    if !plan.is_aggregate() {
        return Ok(rows
            .into_iter()
            .map(|row| Unit { row, group: None })
            .collect());
    }

    let mut units = Vec::new();
    for group in aggregator::group_rows(rt, plan, aliases, outer, rows)? {
        let row = group
            .first()
            .cloned()
            .unwrap_or_else(|| JoinedRow::empty(aliases.len()));
        let unit = Unit {
            row,
            group: Some(group),
        };
        let keep = match plan.having().expr() {
            Some(having) => is_match(having, &unit.frame(aliases, outer), rt)?,
            None => true,
        };
        if keep {
            units.push(unit);
        }
    }
    Ok(units)
}

fn project(
    rt: &Runtime,
    plan: &QueryPlan,
    aliases: &[String],
    outer: Option<&Frame>,
    labels: &Arc<Vec<String>>,
    unit: &Unit,
) -> Result<Tuple> {
    let frame = unit.frame(aliases, outer);
    let cells = plan
        .selections()
        .iter()
        .map(|selection| match selection {
            Selection::Entity(source) => {
                let slot = aliases.iter().position(|a| a == source.alias());
                Ok(Cell::Entity(
                    slot.and_then(|slot| entity_at(plan, slot, &unit.row)),
                ))
            }
            Selection::Expr { expr, .. } => Ok(Cell::Value(evaluate(expr, &frame, rt)?)),
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Tuple::new(Arc::clone(labels), cells))
}

/// Materialize the entity in `slot`, embedding rows of fetch joins that
/// hang off it.
fn entity_at(plan: &QueryPlan, slot: usize, row: &JoinedRow) -> Option<Entity> {
    let stored = row.slots.get(slot)?.as_ref()?;
    let source = plan.sources().nth(slot)?;
    Some(build_entity(source.record_type(), stored, |field| {
        let fetched = plan.joins().iter().position(|join| {
            join.fetch
                && join
                    .relation
                    .as_ref()
                    .is_some_and(|r| r.alias == source.alias() && r.field == field.name)
        })?;
        entity_at(plan, fetched + 1, row)
    }))
}

/// An entity outside of any join: every reference stays deferred.
pub(crate) fn detached_entity(record_type: &Arc<RecordType>, stored: &StoredRow) -> Entity {
    build_entity(record_type, stored, |_| None)
}

fn build_entity(
    record_type: &Arc<RecordType>,
    stored: &StoredRow,
    mut fetched: impl FnMut(&Field) -> Option<Entity>,
) -> Entity {
    let mut related = BTreeMap::new();
    for (index, field, _) in record_type.references() {
        let key = stored.values.get(index).cloned().unwrap_or(Value::Null);
        let state = if key.is_null() {
            Related::Null
        } else {
            match fetched(field) {
                Some(entity) => Related::Loaded(Box::new(entity)),
                // dangling keys of a left fetch join stay deferred
                None => Related::Deferred(key),
            }
        };
        related.insert(field.name.clone(), state);
    }
    Entity::new(
        Arc::clone(record_type),
        stored.id,
        stored.values.to_vec(),
        related,
    )
}
