//! Immutable query plans
//!
//! A plan is produced by [`QueryBuilder::build`](super::builder::QueryBuilder::build)
//! after validation and never changes afterwards; plans are `Send + Sync`
//! and may be executed any number of times.

use crate::types::column::{ColumnRef, Relation, Source};
use crate::types::expression::Expr;
use crate::types::predicate::Predicate;
use crate::types::query::{JoinKind, OrderSpec, Selection};
use querykit_value::DataType;

/// One joined source
#[derive(Debug, Clone, PartialEq)]
pub struct JoinSpec {
    pub kind: JoinKind,
    pub source: Source,
    /// Set for relationship joins: the owning source's reference field.
    pub relation: Option<Relation>,
    /// Explicit condition, combined with the relationship if both are set.
    pub on: Predicate,
    /// Materialize the joined row into the owning entity.
    pub fetch: bool,
}

/// A validated query
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub(crate) root: Source,
    pub(crate) joins: Vec<JoinSpec>,
    pub(crate) predicate: Predicate,
    pub(crate) selections: Vec<Selection>,
    pub(crate) group_by: Vec<Expr>,
    pub(crate) having: Predicate,
    pub(crate) order_by: Vec<OrderSpec>,
    pub(crate) offset: Option<usize>,
    pub(crate) limit: Option<usize>,
    pub(crate) aggregate: bool,
    /// Columns of enclosing queries referenced by a correlated subquery.
    pub(crate) outer_refs: Vec<ColumnRef>,
}

impl QueryPlan {
    pub fn root(&self) -> &Source {
        &self.root
    }

    pub fn joins(&self) -> &[JoinSpec] {
        &self.joins
    }

    /// Every source in plan order: the root, then each join.
    pub fn sources(&self) -> impl Iterator<Item = &Source> {
        std::iter::once(&self.root).chain(self.joins.iter().map(|j| &j.source))
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    pub fn selections(&self) -> &[Selection] {
        &self.selections
    }

    pub fn group_by(&self) -> &[Expr] {
        &self.group_by
    }

    pub fn having(&self) -> &Predicate {
        &self.having
    }

    pub fn order_by(&self) -> &[OrderSpec] {
        &self.order_by
    }

    pub fn offset(&self) -> Option<usize> {
        self.offset
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Whether results are grouped rows rather than source rows.
    pub fn is_aggregate(&self) -> bool {
        self.aggregate
    }

    pub fn is_correlated(&self) -> bool {
        !self.outer_refs.is_empty()
    }

    pub fn outer_refs(&self) -> &[ColumnRef] {
        &self.outer_refs
    }

    /// Result column labels.
    pub fn labels(&self) -> Vec<String> {
        self.selections.iter().map(Selection::label).collect()
    }

    /// Type of the single projected expression, if the plan projects
    /// exactly one expression.
    pub fn single_output_type(&self) -> Option<DataType> {
        match self.selections.as_slice() {
            [Selection::Expr { expr, .. }] => Some(expr.data_type()),
            _ => None,
        }
    }

    /// Every expression in the plan, excluding subquery internals.
    pub(crate) fn expressions(&self) -> impl Iterator<Item = &Expr> {
        self.selections
            .iter()
            .filter_map(Selection::expr)
            .chain(self.joins.iter().filter_map(|j| j.on.expr()))
            .chain(self.predicate.expr())
            .chain(self.group_by.iter())
            .chain(self.having.expr())
            .chain(self.order_by.iter().map(|o| &o.expr))
    }

    /// Native functions used anywhere in the plan, including subqueries.
    pub fn functions(&self) -> Vec<String> {
        let mut names: Vec<String> = self.expressions().flat_map(Expr::functions).collect();
        names.sort();
        names.dedup();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_plan_is_shareable() {
        assert_send_sync::<QueryPlan>();
    }
}
