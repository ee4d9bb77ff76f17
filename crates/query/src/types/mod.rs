//! Core types: schemas, columns, expressions, predicates and results

pub mod column;
pub mod expression;
pub mod predicate;
pub mod query;
pub mod schema;
pub mod tuple;

pub use column::{ColumnRef, IntoRelation, Relation, Source};
pub use expression::{AggregateFunc, BinaryOp, Case, Expr, InSet, IntoExpr, UnaryOp, When};
pub use predicate::{IntoPredicate, Predicate, PredicateBuilder};
pub use query::{Direction, IntoSelection, JoinKind, NullOrder, OrderSpec, Selection};
pub use schema::{Field, RecordType, Reference, Relationship};
pub use tuple::{Cell, Entity, Page, Related, Tuple};
