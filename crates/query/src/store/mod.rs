//! Tabular store interface
//!
//! The engine never owns rows. It scans record types through a
//! [`TabularStore`] and hands bulk mutations back to it; everything about
//! persistence and transactions lives behind this trait.

pub mod memory;

pub use memory::MemoryStore;

use crate::error::Result;
use crate::execution::Mutation;
use crate::functions;
use crate::types::schema::Relationship;
use querykit_value::Row;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Store-assigned row identity, stable for the lifetime of the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RowId(pub u64);

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A row as handed out by a store scan.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    pub id: RowId,
    pub values: Arc<Row>,
}

/// The result of a scan: finite and restartable by scanning again.
pub type Rows = Vec<StoredRow>;

/// Identifies the store state a read observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SnapshotToken(pub u64);

/// Failures raised by a store, surfaced as `StoreUnavailable`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("store is offline")]
    Offline,

    #[error("record type not registered: {0}")]
    UnknownRecordType(String),

    #[error("{0}")]
    Other(String),
}

/// Backend contract the executor runs against.
pub trait TabularStore: Send + Sync {
    /// All rows of a record type in row-identity order.
    fn scan(&self, record_type: &str) -> Result<Rows>;

    /// Relationships declared by a record type's reference fields.
    fn relationships_of(&self, record_type: &str) -> Result<Vec<Relationship>>;

    /// Apply `mutation` to every matching row; returns the affected count.
    fn apply_update(&self, record_type: &str, mutation: &Mutation<'_>) -> Result<usize>;

    /// Delete every row matching `mutation`; returns the affected count.
    fn apply_delete(&self, record_type: &str, mutation: &Mutation<'_>) -> Result<usize>;

    /// Token for the current store state.
    fn snapshot_token(&self) -> Result<SnapshotToken>;

    /// Mark results read at `token`, or at any earlier snapshot, as stale.
    fn invalidate(&self, token: SnapshotToken) -> Result<()>;

    /// Whether native function `name` may be used against this store.
    fn supports_function(&self, name: &str) -> bool {
        functions::get_function(name).is_some()
    }
}
