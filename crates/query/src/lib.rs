//! Typed query expressions, predicate composition and execution
//!
//! This crate provides an embeddable query engine that:
//! - Builds type-checked expressions over aliased record types
//! - Composes optional filters with null-aware predicate combinators
//! - Seals queries into immutable plans validated at build time
//! - Executes plans and bulk mutations against a pluggable [`TabularStore`]
//! - Binds result tuples to typed output structs
//!
//! ```ignore
//! let fixture = Fixture::basic()?;
//! let member = fixture.member("member");
//! let plan = Query::select_from(&member)
//!     .filter(member.col("age")?.ge(20))
//!     .order_by(member.col("age")?.desc())
//!     .build()?;
//! let members = fixture.executor().fetch_entities(&plan)?;
//! ```

pub mod config;
pub mod error;
pub mod execution;
pub mod fixture;
pub mod functions;
pub mod planning;
pub mod projection;
pub mod store;
pub mod types;

pub use config::{EngineConfig, MutationGuard, NullSort, OrderingStrictness};
pub use error::{Error, ErrorKind, Result};
pub use execution::{Execution, ExecutionState, Executor, Mutation};
pub use fixture::Fixture;
pub use planning::{
    Assignment, Delete, DeletePlan, JoinSpec, Query, QueryBuilder, QueryPlan, Update, UpdatePlan,
};
pub use projection::{Bindable, Binder, Constructor, FieldMapping, OutputField, PassThrough};
pub use store::{MemoryStore, RowId, SnapshotToken, StoreError, StoredRow, TabularStore};
pub use types::{
    Case, Cell, ColumnRef, Direction, Entity, Expr, Field, IntoExpr, IntoPredicate, JoinKind,
    NullOrder, OrderSpec, Page, Predicate, PredicateBuilder, RecordType, Related, Relation,
    Relationship, Selection, Source, Tuple,
};

pub use querykit_value::{DataType, FromValue, Value};
