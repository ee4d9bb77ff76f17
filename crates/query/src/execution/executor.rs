//! Query and bulk mutation executor
//!
//! The executor is stateless apart from its store handle and configuration:
//! every call opens a fresh [`Runtime`], so plans can be executed from many
//! threads at once.

use super::mutation::Mutation;
use super::runtime::Runtime;
use super::select::{self, Window};
use crate::config::{EngineConfig, MutationGuard};
use crate::error::{Error, ErrorKind, Result};
use crate::planning::mutation::{DeletePlan, UpdatePlan};
use crate::planning::plan::QueryPlan;
use crate::projection::{Bindable, Binder, PassThrough};
use crate::store::{SnapshotToken, TabularStore};
use crate::types::column::Source;
use crate::types::predicate::Predicate;
use crate::types::query::Selection;
use crate::types::tuple::{Entity, Page, Related, Tuple};
use querykit_value::{FromValue, Value, evaluator};
use std::sync::Arc;
use tracing::{debug, warn};

/// Lifecycle of an [`Execution`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Built,
    Executing,
    Completed,
    Failed(ErrorKind),
}

/// Executes plans against a [`TabularStore`].
#[derive(Clone)]
pub struct Executor {
    store: Arc<dyn TabularStore>,
    config: EngineConfig,
}

impl Executor {
    pub fn new(store: Arc<dyn TabularStore>) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    pub fn with_config(store: Arc<dyn TabularStore>, config: EngineConfig) -> Self {
        Executor { store, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn TabularStore> {
        &self.store
    }

    /// A handle that runs `plan` and tracks its state.
    pub fn execution<'a>(&'a self, plan: &'a QueryPlan) -> Execution<'a> {
        Execution {
            executor: self,
            plan,
            state: ExecutionState::Built,
            snapshot: None,
        }
    }

    pub fn fetch_all(&self, plan: &QueryPlan) -> Result<Vec<Tuple>> {
        self.execution(plan).fetch_all()
    }

    pub fn fetch_one(&self, plan: &QueryPlan) -> Result<Option<Tuple>> {
        self.execution(plan).fetch_one()
    }

    pub fn fetch_first(&self, plan: &QueryPlan) -> Result<Option<Tuple>> {
        self.execution(plan).fetch_first()
    }

    pub fn fetch_paged(&self, plan: &QueryPlan) -> Result<Page<Tuple>> {
        self.execution(plan).fetch_paged()
    }

    pub fn fetch_count(&self, plan: &QueryPlan) -> Result<usize> {
        self.execution(plan).fetch_count()
    }

    pub fn fetch_values<T: FromValue>(&self, plan: &QueryPlan) -> Result<Vec<T>> {
        self.execution(plan).fetch_values()
    }

    pub fn fetch_entities(&self, plan: &QueryPlan) -> Result<Vec<Entity>> {
        self.execution(plan).fetch_entities()
    }

    pub fn fetch_as<T: Bindable>(&self, plan: &QueryPlan, binder: &Binder<T>) -> Result<Vec<T>> {
        self.execution(plan).fetch_as(binder)
    }

    /// Run a bulk update and return the number of rows changed.
    pub fn update(&self, plan: &UpdatePlan) -> Result<usize> {
        self.guard("update", plan.source(), plan.predicate())?;
        self.check_functions(&plan.functions())?;
        let mutation = Mutation::new(
            self.store.as_ref(),
            &self.config,
            plan.source(),
            plan.assignments(),
            plan.predicate(),
        );
        let record_type = plan.source().record_type().name();
        let count = self.store.apply_update(record_type, &mutation)?;
        debug!(record_type, count, "update applied");
        Ok(count)
    }

    /// Run a bulk delete and return the number of rows removed.
    pub fn delete(&self, plan: &DeletePlan) -> Result<usize> {
        self.guard("delete", plan.source(), plan.predicate())?;
        self.check_functions(&plan.functions())?;
        let mutation = Mutation::new(
            self.store.as_ref(),
            &self.config,
            plan.source(),
            &[],
            plan.predicate(),
        );
        let record_type = plan.source().record_type().name();
        let count = self.store.apply_delete(record_type, &mutation)?;
        debug!(record_type, count, "delete applied");
        Ok(count)
    }

    /// Resolve a reference field that was not fetch-joined.
    ///
    /// Loaded references are returned as they are; deferred ones are looked
    /// up in the store by key. `Ok(None)` for NULL references and for keys
    /// with no matching row.
    pub fn load_related(&self, entity: &Entity, field: &str) -> Result<Option<Entity>> {
        let key = match entity.related(field) {
            None => {
                return Err(Error::malformed(format!(
                    "{} has no reference field {}",
                    entity.record_type().name(),
                    field
                )));
            }
            Some(Related::Null) => return Ok(None),
            Some(Related::Loaded(related)) => return Ok(Some(related.as_ref().clone())),
            Some(Related::Deferred(key)) => key,
        };

        let relationship = self
            .store
            .relationships_of(entity.record_type().name())?
            .into_iter()
            .find(|r| r.field == field)
            .ok_or_else(|| {
                Error::malformed(format!(
                    "store declares no relationship {}.{}",
                    entity.record_type().name(),
                    field
                ))
            })?;
        let (key_index, _) = relationship
            .target
            .field(&relationship.target_key)
            .ok_or_else(|| {
                Error::malformed(format!(
                    "{} has no key field {}",
                    relationship.target.name(),
                    relationship.target_key
                ))
            })?;

        for row in self.store.scan(relationship.target.name())? {
            let candidate = row.values.get(key_index).unwrap_or(&Value::Null);
            if evaluator::equals(candidate, key)? == Value::Bool(true) {
                debug!(field, target = relationship.target.name(), "loaded reference");
                return Ok(Some(select::detached_entity(&relationship.target, &row)));
            }
        }
        Ok(None)
    }

    /// Current store snapshot token.
    pub fn snapshot_token(&self) -> Result<SnapshotToken> {
        self.store.snapshot_token()
    }

    /// Tell the store that results read at `token` are stale.
    pub fn invalidate(&self, token: SnapshotToken) -> Result<()> {
        self.store.invalidate(token)
    }

    fn guard(&self, operation: &'static str, source: &Source, predicate: &Predicate) -> Result<()> {
        if !predicate.is_absent() {
            return Ok(());
        }
        let record_type = source.record_type().name();
        match self.config.unconditional_mutation {
            MutationGuard::Deny => Err(Error::UnsafeUnconditionalMutation {
                operation,
                record_type: record_type.to_string(),
            }),
            MutationGuard::Allow => {
                warn!(operation, record_type, "mutation without predicate affects every row");
                Ok(())
            }
        }
    }

    fn check_functions(&self, names: &[String]) -> Result<()> {
        match names.iter().find(|name| !self.store.supports_function(name)) {
            Some(name) => Err(Error::UnsupportedFunction(name.clone())),
            None => Ok(()),
        }
    }
}

/// One plan bound to an executor. May be run any number of times; each run
/// records the snapshot token it read at.
pub struct Execution<'a> {
    executor: &'a Executor,
    plan: &'a QueryPlan,
    state: ExecutionState,
    snapshot: Option<SnapshotToken>,
}

impl<'a> Execution<'a> {
    pub fn state(&self) -> ExecutionState {
        self.state
    }

    /// Snapshot token of the last successful run.
    pub fn snapshot(&self) -> Option<SnapshotToken> {
        self.snapshot
    }

    pub fn plan(&self) -> &QueryPlan {
        self.plan
    }

    fn run<T>(&mut self, f: impl FnOnce(&Runtime, &QueryPlan) -> Result<T>) -> Result<T> {
        self.state = ExecutionState::Executing;
        debug!(root = self.plan.root().alias(), "executing query");

        let executor = self.executor;
        let plan = self.plan;
        let result = executor
            .check_functions(&plan.functions())
            .and_then(|_| executor.store.snapshot_token())
            .and_then(|token| {
                let rt = Runtime::new(executor.store.as_ref(), &executor.config);
                f(&rt, plan).map(|out| (token, out))
            });

        match result {
            Ok((token, out)) => {
                self.snapshot = Some(token);
                self.state = ExecutionState::Completed;
                debug!(snapshot = token.0, "query completed");
                Ok(out)
            }
            Err(err) => {
                self.state = ExecutionState::Failed(err.kind());
                debug!(error = %err, "query failed");
                Err(err)
            }
        }
    }

    /// Record a failure found after the run, while shaping its output.
    fn fail<T>(&mut self, err: Error) -> Result<T> {
        self.state = ExecutionState::Failed(err.kind());
        debug!(error = %err, "query failed");
        Err(err)
    }

    /// Every result tuple, empty when nothing matches.
    pub fn fetch_all(&mut self) -> Result<Vec<Tuple>> {
        self.run(|rt, plan| Ok(select::run(rt, plan, None, Window::of(plan))?.tuples))
    }

    /// The only result, `None` when there is none. More than one result is
    /// an error, never a pick.
    pub fn fetch_one(&mut self) -> Result<Option<Tuple>> {
        let mut tuples = self.fetch_all()?;
        match tuples.len() {
            0 | 1 => Ok(tuples.pop()),
            n => self.fail(Error::TooManyResults(n)),
        }
    }

    /// The first result of the ordered window.
    pub fn fetch_first(&mut self) -> Result<Option<Tuple>> {
        self.run(|rt, plan| {
            let output = select::run(rt, plan, None, Window::first(plan))?;
            Ok(output.tuples.into_iter().next())
        })
    }

    /// The window's results with the total ignoring offset and limit.
    pub fn fetch_paged(&mut self) -> Result<Page<Tuple>> {
        self.run(|rt, plan| {
            let window = Window::of(plan);
            let output = select::run(rt, plan, None, window)?;
            Ok(Page {
                results: output.tuples,
                total: output.total,
                offset: window.offset,
                limit: window.limit,
            })
        })
    }

    /// Number of result rows, independent of window and order.
    pub fn fetch_count(&mut self) -> Result<usize> {
        self.run(select::count)
    }

    /// Values of a single-column query.
    pub fn fetch_values<T: FromValue>(&mut self) -> Result<Vec<T>> {
        let selections = self.plan.selections();
        if selections.len() != 1 {
            let err = Error::ProjectionArityMismatch(format!(
                "expected one column, query projects {}",
                selections.len()
            ));
            return self.fail(err);
        }
        let label = selections[0].label();
        let values = self
            .fetch_all()?
            .into_iter()
            .map(|tuple| {
                let value = PassThrough::value(tuple)?;
                let found = value.data_type();
                T::from_value(value).map_err(|_| Error::ProjectionTypeMismatch {
                    field: label.clone(),
                    expected: std::any::type_name::<T>().to_string(),
                    found: found.to_string(),
                })
            })
            .collect::<Result<Vec<T>>>();
        values.or_else(|err| self.fail(err))
    }

    /// Entities of a query projecting exactly one entity. Rows where a left
    /// join left the entity empty are skipped.
    pub fn fetch_entities(&mut self) -> Result<Vec<Entity>> {
        if !matches!(self.plan.selections(), [Selection::Entity(_)]) {
            return self.fail(Error::ProjectionArityMismatch(
                "expected a single entity selection".to_string(),
            ));
        }
        Ok(self
            .fetch_all()?
            .into_iter()
            .filter_map(|tuple| tuple.entity(0).cloned())
            .collect())
    }

    /// Results bound through `binder`.
    pub fn fetch_as<T: Bindable>(&mut self, binder: &Binder<T>) -> Result<Vec<T>> {
        if self.plan.selections().len() != binder.arity() {
            let err = Error::ProjectionArityMismatch(format!(
                "binder expects {} columns, query projects {}",
                binder.arity(),
                self.plan.selections().len()
            ));
            return self.fail(err);
        }
        let bound = self
            .fetch_all()?
            .iter()
            .map(|tuple| binder.bind(tuple))
            .collect::<Result<Vec<T>>>();
        bound.or_else(|err| self.fail(err))
    }
}
