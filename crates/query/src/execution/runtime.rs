//! Per-execution state: store access, scan snapshots and subquery results

use super::select::{self, Window};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::planning::plan::QueryPlan;
use crate::store::{Rows, StoredRow, TabularStore};
use crate::types::column::ColumnRef;
use querykit_value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;
use tracing::trace;

/// One candidate row of a query: a slot per source in plan order, `None`
/// where a left join found no match.
#[derive(Debug, Clone)]
pub(crate) struct JoinedRow {
    pub slots: Vec<Option<StoredRow>>,
}

impl JoinedRow {
    pub fn empty(width: usize) -> Self {
        JoinedRow {
            slots: vec![None; width],
        }
    }
}

/// Evaluation scope: the current row, its group when aggregating, and the
/// enclosing query's scope for correlated subqueries.
#[derive(Clone, Copy)]
pub(crate) struct Frame<'a> {
    pub aliases: &'a [String],
    pub row: &'a JoinedRow,
    pub group: Option<&'a [JoinedRow]>,
    pub outer: Option<&'a Frame<'a>>,
}

impl<'a> Frame<'a> {
    pub fn new(aliases: &'a [String], row: &'a JoinedRow, outer: Option<&'a Frame<'a>>) -> Self {
        Frame {
            aliases,
            row,
            group: None,
            outer,
        }
    }

    /// Same scope, another row.
    pub fn with_row(&self, row: &'a JoinedRow) -> Self {
        Frame {
            row,
            group: None,
            ..*self
        }
    }

    /// Resolve a column, falling back to enclosing scopes.
    pub fn column(&self, column: &ColumnRef) -> Result<Value> {
        if let Some(slot) = self.aliases.iter().position(|a| a == &column.alias) {
            return Ok(match &self.row.slots[slot] {
                Some(row) => row.values.get(column.index).cloned().unwrap_or(Value::Null),
                None => Value::Null,
            });
        }
        match self.outer {
            Some(outer) => outer.column(column),
            None => Err(Error::Evaluation(format!("unresolved column {}", column))),
        }
    }
}

/// Shared state of one execution.
///
/// Every record type is scanned at most once, so all parts of a query,
/// subqueries included, observe the same rows.
pub(crate) struct Runtime<'a> {
    store: &'a dyn TabularStore,
    config: &'a EngineConfig,
    scans: RefCell<HashMap<String, Rc<Rows>>>,
    subqueries: RefCell<HashMap<usize, Rc<Vec<Value>>>>,
}

impl<'a> Runtime<'a> {
    pub fn new(store: &'a dyn TabularStore, config: &'a EngineConfig) -> Self {
        Runtime {
            store,
            config,
            scans: RefCell::new(HashMap::new()),
            subqueries: RefCell::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &'a dyn TabularStore {
        self.store
    }

    pub fn config(&self) -> &'a EngineConfig {
        self.config
    }

    pub fn scan(&self, record_type: &str) -> Result<Rc<Rows>> {
        if let Some(rows) = self.scans.borrow().get(record_type) {
            return Ok(Rc::clone(rows));
        }
        let rows = Rc::new(self.store.scan(record_type)?);
        trace!(record_type, rows = rows.len(), "scanned");
        self.scans
            .borrow_mut()
            .insert(record_type.to_string(), Rc::clone(&rows));
        Ok(rows)
    }

    /// Values of a single-column subquery. Uncorrelated subqueries run once
    /// per execution; correlated ones run for every outer row.
    pub fn subquery_values(&self, plan: &Arc<QueryPlan>, outer: &Frame) -> Result<Rc<Vec<Value>>> {
        let key = Arc::as_ptr(plan) as usize;
        let cacheable = !plan.is_correlated();
        if cacheable && let Some(values) = self.subqueries.borrow().get(&key) {
            return Ok(Rc::clone(values));
        }

        let output = select::run(self, plan, Some(outer), Window::of(plan))?;
        let values = output
            .tuples
            .into_iter()
            .map(|t| t.into_value())
            .collect::<Result<Vec<_>>>()?;
        let values = Rc::new(values);
        if cacheable {
            self.subqueries.borrow_mut().insert(key, Rc::clone(&values));
        }
        Ok(values)
    }
}
