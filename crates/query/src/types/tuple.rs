//! Result tuples, entities and pages

use super::schema::RecordType;
use crate::error::{Error, Result};
use crate::store::RowId;
use querykit_value::{FromValue, Row, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// State of a reference field on a materialized entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Related {
    /// Materialized by a fetch join.
    Loaded(Box<Entity>),
    /// Not materialized; holds the referenced key.
    Deferred(Value),
    /// The reference field is NULL.
    Null,
}

/// A materialized row of a record type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    record_type: Arc<RecordType>,
    id: RowId,
    values: Row,
    related: BTreeMap<String, Related>,
}

impl Entity {
    pub(crate) fn new(
        record_type: Arc<RecordType>,
        id: RowId,
        values: Row,
        related: BTreeMap<String, Related>,
    ) -> Self {
        Entity {
            record_type,
            id,
            values,
            related,
        }
    }

    pub fn record_type(&self) -> &Arc<RecordType> {
        &self.record_type
    }

    /// Store-assigned row identity.
    pub fn id(&self) -> RowId {
        self.id
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Value of a field by name.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.record_type
            .field(field)
            .and_then(|(i, _)| self.values.get(i))
    }

    /// Typed value of a field by name.
    pub fn value<T: FromValue>(&self, field: &str) -> Result<T> {
        let value = self.get(field).ok_or_else(|| {
            Error::malformed(format!("{} has no field {}", self.record_type.name(), field))
        })?;
        Ok(T::from_value(value.clone())?)
    }

    pub fn related(&self, field: &str) -> Option<&Related> {
        self.related.get(field)
    }

    /// Whether the reference field was materialized by a fetch join. A NULL
    /// reference counts as loaded, there is nothing left to fetch.
    pub fn is_loaded(&self, field: &str) -> bool {
        matches!(
            self.related.get(field),
            Some(Related::Loaded(_)) | Some(Related::Null)
        )
    }

    /// The fetch-joined entity behind a reference field.
    pub fn loaded(&self, field: &str) -> Option<&Entity> {
        match self.related.get(field) {
            Some(Related::Loaded(entity)) => Some(entity),
            _ => None,
        }
    }
}

/// One cell of a result tuple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    Value(Value),
    /// `None` when a left join found no match.
    Entity(Option<Entity>),
}

impl Cell {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Cell::Value(value) => Some(value),
            Cell::Entity(_) => None,
        }
    }

    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            Cell::Entity(entity) => entity.as_ref(),
            Cell::Value(_) => None,
        }
    }
}

/// A labelled result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tuple {
    labels: Arc<Vec<String>>,
    cells: Vec<Cell>,
}

impl Tuple {
    pub(crate) fn new(labels: Arc<Vec<String>>, cells: Vec<Cell>) -> Self {
        Tuple { labels, cells }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell(&self, index: usize) -> Option<&Cell> {
        self.cells.get(index)
    }

    /// Cell by projection label, e.g. `"member"` or `"member.age"`.
    pub fn by_label(&self, label: &str) -> Option<&Cell> {
        self.labels
            .iter()
            .position(|l| l == label)
            .and_then(|i| self.cells.get(i))
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        self.cell(index).and_then(Cell::as_value)
    }

    pub fn entity(&self, index: usize) -> Option<&Entity> {
        self.cell(index).and_then(Cell::as_entity)
    }

    /// Typed value of a column.
    pub fn get<T: FromValue>(&self, index: usize) -> Result<T> {
        let value = self.value(index).ok_or_else(|| {
            Error::ProjectionArityMismatch(format!("tuple has no value column {}", index))
        })?;
        T::from_value(value.clone()).map_err(|_| Error::ProjectionTypeMismatch {
            field: self.labels.get(index).cloned().unwrap_or_default(),
            expected: std::any::type_name::<T>().to_string(),
            found: value.data_type().to_string(),
        })
    }

    /// Degenerate a one-column tuple into its value.
    pub fn into_value(self) -> Result<Value> {
        match <[Cell; 1]>::try_from(self.cells) {
            Ok([Cell::Value(value)]) => Ok(value),
            Ok([Cell::Entity(_)]) => Err(Error::ProjectionTypeMismatch {
                field: self.labels.first().cloned().unwrap_or_default(),
                expected: "value".into(),
                found: "entity".into(),
            }),
            Err(cells) => Err(Error::ProjectionArityMismatch(format!(
                "expected a single column, found {}",
                cells.len()
            ))),
        }
    }

    /// All cells as values; entity cells are rejected.
    pub fn into_values(self) -> Result<Vec<Value>> {
        let labels = self.labels;
        self.cells
            .into_iter()
            .enumerate()
            .map(|(i, cell)| match cell {
                Cell::Value(value) => Ok(value),
                Cell::Entity(_) => Err(Error::ProjectionTypeMismatch {
                    field: labels.get(i).cloned().unwrap_or_default(),
                    expected: "value".into(),
                    found: "entity".into(),
                }),
            })
            .collect()
    }
}

/// One page of results plus the total count ignoring the window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub results: Vec<T>,
    pub total: usize,
    pub offset: usize,
    pub limit: Option<usize>,
}
