//! In-memory tabular store
//!
//! Tables are copy-on-write row maps behind a `parking_lot::RwLock`, so
//! scans hand out cheap `Arc` snapshots. Bulk mutations are serialized by a
//! write gate and run in two phases: matches and new values are computed
//! against a snapshot without holding the table lock, then written in one
//! short critical section.

use super::{RowId, Rows, SnapshotToken, StoreError, StoredRow, TabularStore};
use crate::error::{Error, Result};
use crate::execution::Mutation;
use crate::functions;
use crate::types::schema::{RecordType, Relationship};
use parking_lot::{Mutex, RwLock};
use querykit_value::{Row, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, trace};

struct Table {
    record_type: Arc<RecordType>,
    rows: Arc<BTreeMap<RowId, Arc<Row>>>,
    next_id: u64,
}

impl Table {
    fn snapshot(&self) -> Rows {
        self.rows
            .iter()
            .map(|(id, values)| StoredRow {
                id: *id,
                values: Arc::clone(values),
            })
            .collect()
    }
}

/// A [`TabularStore`] keeping every record type in memory.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Table>>,
    /// Serializes inserts and bulk mutations.
    write_gate: Mutex<()>,
    /// Bumped by every change; doubles as the snapshot token.
    generation: AtomicU64,
    /// Tokens below this generation are stale. Generations only grow, so
    /// invalidating a token also covers every older snapshot.
    invalidated_below: AtomicU64,
    offline: AtomicBool,
    /// `None` allows every registered native function.
    allowed_functions: RwLock<Option<HashSet<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::Acquire) {
            return Err(StoreError::Offline.into());
        }
        Ok(())
    }

    /// Register a record type. Every reference must point at the key field
    /// of a registered record type (or of the record type itself) with the
    /// same data type.
    pub fn register(&self, record_type: RecordType) -> Result<Arc<RecordType>> {
        self.check_online()?;
        let _gate = self.write_gate.lock();
        let mut tables = self.tables.write();
        if tables.contains_key(record_type.name()) {
            return Err(Error::InvalidSchema(format!(
                "record type {} is already registered",
                record_type.name()
            )));
        }

        for (_, field, reference) in record_type.references() {
            let target = if reference.record_type == record_type.name() {
                &record_type
            } else {
                tables
                    .get(&reference.record_type)
                    .map(|t| t.record_type.as_ref())
                    .ok_or_else(|| {
                        Error::InvalidSchema(format!(
                            "{}.{} references unknown record type {}",
                            record_type.name(),
                            field.name,
                            reference.record_type
                        ))
                    })?
            };
            let (_, key) = target.field(&reference.key).ok_or_else(|| {
                Error::InvalidSchema(format!(
                    "{}.{} references unknown field {}.{}",
                    record_type.name(),
                    field.name,
                    reference.record_type,
                    reference.key
                ))
            })?;
            if key.data_type != field.data_type {
                return Err(Error::InvalidSchema(format!(
                    "{}.{} is {}, referenced {}.{} is {}",
                    record_type.name(),
                    field.name,
                    field.data_type,
                    reference.record_type,
                    key.name,
                    key.data_type
                )));
            }
        }

        let record_type = Arc::new(record_type);
        tables.insert(
            record_type.name().to_string(),
            Table {
                record_type: Arc::clone(&record_type),
                rows: Arc::new(BTreeMap::new()),
                next_id: 1,
            },
        );
        debug!(record_type = record_type.name(), "registered record type");
        Ok(record_type)
    }

    /// Insert a row, validated and coerced against the record type.
    /// Primary keys must be unique; referenced keys are not checked.
    pub fn insert(&self, record_type: &str, values: Vec<Value>) -> Result<RowId> {
        self.check_online()?;
        let _gate = self.write_gate.lock();
        let mut tables = self.tables.write();
        let table = tables
            .get_mut(record_type)
            .ok_or_else(|| StoreError::UnknownRecordType(record_type.to_string()))?;

        let row = table.record_type.validate_row(values)?;
        let (pk, pk_field) = table.record_type.primary_key();
        if table.rows.values().any(|existing| existing[pk] == row[pk]) {
            return Err(Error::InvalidSchema(format!(
                "duplicate primary key {}.{} = {}",
                record_type, pk_field.name, row[pk]
            )));
        }

        let id = RowId(table.next_id);
        table.next_id += 1;
        Arc::make_mut(&mut table.rows).insert(id, Arc::new(row));
        self.generation.fetch_add(1, Ordering::AcqRel);
        trace!(record_type, %id, "inserted row");
        Ok(id)
    }

    pub fn record_type(&self, name: &str) -> Option<Arc<RecordType>> {
        self.tables
            .read()
            .get(name)
            .map(|t| Arc::clone(&t.record_type))
    }

    /// Number of rows of a record type.
    pub fn row_count(&self, record_type: &str) -> Result<usize> {
        self.tables
            .read()
            .get(record_type)
            .map(|t| t.rows.len())
            .ok_or_else(|| StoreError::UnknownRecordType(record_type.to_string()).into())
    }

    pub fn is_invalidated(&self, token: SnapshotToken) -> bool {
        token.0 < self.invalidated_below.load(Ordering::Acquire)
    }

    /// While offline every operation fails with `StoreUnavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Release);
    }

    /// Allow only the named native functions.
    pub fn restrict_functions<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names = names.into_iter().map(|n| n.into().to_lowercase()).collect();
        *self.allowed_functions.write() = Some(names);
    }

    fn table_snapshot(&self, record_type: &str) -> Result<Rows> {
        self.tables
            .read()
            .get(record_type)
            .map(Table::snapshot)
            .ok_or_else(|| StoreError::UnknownRecordType(record_type.to_string()).into())
    }

    /// Write phase shared by updates and deletes.
    fn write(&self, record_type: &str, apply: impl FnOnce(&mut BTreeMap<RowId, Arc<Row>>)) -> Result<()> {
        let mut tables = self.tables.write();
        let table = tables
            .get_mut(record_type)
            .ok_or_else(|| StoreError::UnknownRecordType(record_type.to_string()))?;
        apply(Arc::make_mut(&mut table.rows));
        self.generation.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}

impl TabularStore for MemoryStore {
    fn scan(&self, record_type: &str) -> Result<Rows> {
        self.check_online()?;
        self.table_snapshot(record_type)
    }

    fn relationships_of(&self, record_type: &str) -> Result<Vec<Relationship>> {
        self.check_online()?;
        let tables = self.tables.read();
        let table = tables
            .get(record_type)
            .ok_or_else(|| StoreError::UnknownRecordType(record_type.to_string()))?;
        table
            .record_type
            .references()
            .map(|(_, field, reference)| -> Result<Relationship> {
                let target = tables.get(&reference.record_type).ok_or_else(|| {
                    StoreError::UnknownRecordType(reference.record_type.clone())
                })?;
                Ok(Relationship {
                    field: field.name.clone(),
                    target: Arc::clone(&target.record_type),
                    target_key: reference.key.clone(),
                })
            })
            .collect()
    }

    fn apply_update(&self, record_type: &str, mutation: &Mutation<'_>) -> Result<usize> {
        self.check_online()?;
        let _gate = self.write_gate.lock();

        // Phase 1: evaluate against a snapshot, no table lock held
        let mut changes = Vec::new();
        for row in self.table_snapshot(record_type)? {
            if mutation.matches(&row)? {
                let values = mutation.record_type().validate_row(mutation.apply(&row)?)?;
                changes.push((row.id, Arc::new(values)));
            }
        }

        // Phase 2: write
        let count = changes.len();
        if count > 0 {
            self.write(record_type, |rows| {
                for (id, values) in changes {
                    rows.insert(id, values);
                }
            })?;
        }
        debug!(record_type, count, "updated rows");
        Ok(count)
    }

    fn apply_delete(&self, record_type: &str, mutation: &Mutation<'_>) -> Result<usize> {
        self.check_online()?;
        let _gate = self.write_gate.lock();

        let mut doomed = Vec::new();
        for row in self.table_snapshot(record_type)? {
            if mutation.matches(&row)? {
                doomed.push(row.id);
            }
        }

        let count = doomed.len();
        if count > 0 {
            self.write(record_type, |rows| {
                for id in &doomed {
                    rows.remove(id);
                }
            })?;
        }
        debug!(record_type, count, "deleted rows");
        Ok(count)
    }

    fn snapshot_token(&self) -> Result<SnapshotToken> {
        self.check_online()?;
        Ok(SnapshotToken(self.generation.load(Ordering::Acquire)))
    }

    fn invalidate(&self, token: SnapshotToken) -> Result<()> {
        self.check_online()?;
        self.invalidated_below
            .fetch_max(token.0.saturating_add(1), Ordering::AcqRel);
        trace!(token = token.0, "invalidated snapshot");
        Ok(())
    }

    fn supports_function(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        match self.allowed_functions.read().as_ref() {
            Some(allowed) => allowed.contains(&name),
            None => functions::get_function(&name).is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::types::schema::Field;
    use querykit_value::DataType;

    fn team() -> RecordType {
        RecordType::new(
            "Team",
            vec![
                Field::new("id", DataType::I64).primary_key().nullable(false),
                Field::new("name", DataType::Str),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_register_checks_references() {
        let store = MemoryStore::new();
        let member = RecordType::new(
            "Member",
            vec![
                Field::new("id", DataType::I64).primary_key().nullable(false),
                Field::new("team_id", DataType::I64).references("Team", "id"),
            ],
        )
        .unwrap();
        let err = store.register(member.clone()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSchema);

        store.register(team()).unwrap();
        store.register(member).unwrap();
        let relationships = store.relationships_of("Member").unwrap();
        assert_eq!(relationships.len(), 1);
        assert_eq!(relationships[0].target.name(), "Team");
    }

    #[test]
    fn test_insert_coerces_and_rejects_duplicate_keys() {
        let store = MemoryStore::new();
        store.register(team()).unwrap();
        store
            .insert("Team", vec![Value::I32(1), Value::string("a")])
            .unwrap();
        let rows = store.scan("Team").unwrap();
        assert_eq!(rows[0].values[0], Value::I64(1));

        let err = store
            .insert("Team", vec![Value::I64(1), Value::string("b")])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSchema);
        assert_eq!(store.row_count("Team").unwrap(), 1);
    }

    #[test]
    fn test_snapshot_tokens_follow_changes() {
        let store = MemoryStore::new();
        store.register(team()).unwrap();
        let before = store.snapshot_token().unwrap();
        store
            .insert("Team", vec![Value::I64(1), Value::string("a")])
            .unwrap();
        let after = store.snapshot_token().unwrap();
        assert_ne!(before, after);

        store.invalidate(before).unwrap();
        assert!(store.is_invalidated(before));
        assert!(!store.is_invalidated(after));
    }

    #[test]
    fn test_invalidation_covers_older_snapshots() {
        let store = MemoryStore::new();
        store.register(team()).unwrap();
        let mut tokens = vec![store.snapshot_token().unwrap()];
        for id in 1..=3 {
            store
                .insert("Team", vec![Value::I64(id), Value::string("t")])
                .unwrap();
            tokens.push(store.snapshot_token().unwrap());
        }

        store.invalidate(tokens[2]).unwrap();
        assert!(tokens[..=2].iter().all(|t| store.is_invalidated(*t)));
        assert!(!store.is_invalidated(tokens[3]));

        // an older token never moves the mark back
        store.invalidate(tokens[0]).unwrap();
        assert!(store.is_invalidated(tokens[2]));
        assert!(!store.is_invalidated(tokens[3]));
    }

    #[test]
    fn test_offline_store() {
        let store = MemoryStore::new();
        store.register(team()).unwrap();
        store.set_offline(true);
        let err = store.scan("Team").unwrap_err();
        assert_eq!(err, Error::StoreUnavailable(StoreError::Offline));
        store.set_offline(false);
        assert!(store.scan("Team").is_ok());
    }

    #[test]
    fn test_function_allow_list() {
        let store = MemoryStore::new();
        assert!(store.supports_function("replace"));
        assert!(!store.supports_function("nope"));
        store.restrict_functions(["lower"]);
        assert!(store.supports_function("LOWER"));
        assert!(!store.supports_function("replace"));
    }
}
