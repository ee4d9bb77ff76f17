//! Bulk mutations as handed to a store

use super::expression::{evaluate, is_match};
use super::runtime::{Frame, JoinedRow, Runtime};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::planning::mutation::Assignment;
use crate::store::{StoredRow, TabularStore};
use crate::types::column::Source;
use crate::types::predicate::Predicate;
use crate::types::schema::RecordType;
use querykit_value::Row;

/// A bulk update or delete bound to one execution.
///
/// Stores call [`matches`](Mutation::matches) for every row of the record
/// type and, for updates, [`apply`](Mutation::apply) for every match.
/// Evaluation may scan the store again for subqueries, so stores must not
/// hold write locks while calling into a mutation.
pub struct Mutation<'a> {
    source: &'a Source,
    assignments: &'a [Assignment],
    predicate: &'a Predicate,
    aliases: Vec<String>,
    runtime: Runtime<'a>,
}

impl<'a> Mutation<'a> {
    pub(crate) fn new(
        store: &'a dyn TabularStore,
        config: &'a EngineConfig,
        source: &'a Source,
        assignments: &'a [Assignment],
        predicate: &'a Predicate,
    ) -> Self {
        Mutation {
            source,
            assignments,
            predicate,
            aliases: vec![source.alias().to_string()],
            runtime: Runtime::new(store, config),
        }
    }

    pub fn record_type(&self) -> &RecordType {
        self.source.record_type()
    }

    /// Whether the mutation touches every row.
    pub fn is_unconditional(&self) -> bool {
        self.predicate.is_absent()
    }

    pub fn matches(&self, row: &StoredRow) -> Result<bool> {
        let Some(predicate) = self.predicate.expr() else {
            return Ok(true);
        };
        let joined = JoinedRow {
            slots: vec![Some(row.clone())],
        };
        is_match(predicate, &Frame::new(&self.aliases, &joined, None), &self.runtime)
    }

    /// The row's new values. Every assignment sees the row as it was before
    /// the update.
    pub fn apply(&self, row: &StoredRow) -> Result<Row> {
        let joined = JoinedRow {
            slots: vec![Some(row.clone())],
        };
        let frame = Frame::new(&self.aliases, &joined, None);

        let mut values = row.values.to_vec();
        for assignment in self.assignments {
            let column = &assignment.column;
            let value = evaluate(&assignment.value, &frame, &self.runtime)?;
            if value.is_null() && !column.nullable {
                return Err(Error::Evaluation(format!(
                    "NULL assigned to non-nullable {}",
                    column
                )));
            }
            let slot = values.get_mut(column.index).ok_or_else(|| {
                Error::Evaluation(format!("row has no field {}", column))
            })?;
            *slot = value.coerce_to(column.data_type)?;
        }
        Ok(values)
    }
}
