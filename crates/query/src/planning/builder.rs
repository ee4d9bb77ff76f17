//! Fluent query builder
//!
//! Builder methods never fail; the first construction error is kept and
//! returned by [`QueryBuilder::build`], which also checks everything that
//! depends on the query as a whole.

use super::plan::{JoinSpec, QueryPlan};
use crate::error::{Error, Result};
use crate::types::column::{ColumnRef, IntoRelation, Relation, Source};
use crate::types::expression::{Expr, InSet, IntoExpr};
use crate::types::predicate::{IntoPredicate, Predicate};
use crate::types::query::{IntoSelection, JoinKind, OrderSpec, Selection};

/// Entry points for building queries.
pub struct Query;

impl Query {
    /// Select the root entity of `source`.
    pub fn select_from(source: &Source) -> QueryBuilder {
        Self::select([Selection::entity(source)]).from(source)
    }

    /// Select a list of entities and expressions; sources follow with
    /// [`QueryBuilder::from`].
    pub fn select<I>(items: I) -> QueryBuilder
    where
        I: IntoIterator,
        I::Item: IntoSelection,
    {
        let mut builder = QueryBuilder::default();
        for item in items {
            if let Some(selection) = builder.record(item.into_selection()) {
                builder.selections.push(selection);
            }
        }
        builder
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    root: Option<Source>,
    joins: Vec<JoinSpec>,
    predicate: Predicate,
    selections: Vec<Selection>,
    group_by: Vec<Expr>,
    having: Predicate,
    order_by: Vec<OrderSpec>,
    offset: Option<usize>,
    limit: Option<usize>,
    error: Option<Error>,
}

impl QueryBuilder {
    /// Keep the first error, returning the value on success.
    fn record<T>(&mut self, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.error.get_or_insert(err);
                None
            }
        }
    }

    /// Add a source. The first becomes the root; further sources are
    /// unconditional (theta) joins.
    pub fn from(mut self, source: &Source) -> Self {
        if self.root.is_none() {
            self.root = Some(source.clone());
            self
        } else {
            self.cross_join(source)
        }
    }

    fn add_join(
        mut self,
        kind: JoinKind,
        relation: Option<Result<Relation>>,
        target: &Source,
        on: Result<Predicate>,
    ) -> Self {
        let relation = match relation {
            Some(r) => match self.record(r) {
                Some(r) => Some(r),
                None => return self,
            },
            None => None,
        };
        let on = self.record(on).unwrap_or_default();
        self.joins.push(JoinSpec {
            kind,
            source: target.clone(),
            relation,
            on,
            fetch: false,
        });
        self
    }

    /// Inner join along a declared relationship, e.g.
    /// `join(member.relation("team_id"), &team)`.
    pub fn join(self, relation: impl IntoRelation, target: &Source) -> Self {
        self.add_join(
            JoinKind::Inner,
            Some(relation.into_relation()),
            target,
            Ok(Predicate::Absent),
        )
    }

    /// Left outer join along a declared relationship.
    pub fn left_join(self, relation: impl IntoRelation, target: &Source) -> Self {
        self.add_join(
            JoinKind::Left,
            Some(relation.into_relation()),
            target,
            Ok(Predicate::Absent),
        )
    }

    /// Inner join on an explicit condition.
    pub fn join_on(self, target: &Source, condition: impl IntoPredicate) -> Self {
        self.add_join(JoinKind::Inner, None, target, condition.into_predicate())
    }

    /// Left outer join on an explicit condition.
    pub fn left_join_on(self, target: &Source, condition: impl IntoPredicate) -> Self {
        self.add_join(JoinKind::Left, None, target, condition.into_predicate())
    }

    /// Unconditional join.
    pub fn cross_join(self, target: &Source) -> Self {
        self.add_join(JoinKind::Cross, None, target, Ok(Predicate::Absent))
    }

    /// Add a condition to the most recent join.
    pub fn on(mut self, condition: impl IntoPredicate) -> Self {
        let Some(join) = self.joins.last_mut() else {
            self.error
                .get_or_insert(Error::malformed("on() requires a preceding join"));
            return self;
        };
        let combined = std::mem::take(&mut join.on).and(condition);
        match combined {
            Ok(on) => join.on = on,
            Err(err) => {
                self.error.get_or_insert(err);
            }
        }
        self
    }

    /// Materialize the most recent relationship join into the owning entity.
    pub fn fetch_join(mut self) -> Self {
        match self.joins.last_mut() {
            Some(join) => join.fetch = true,
            None => {
                self.error
                    .get_or_insert(Error::malformed("fetch_join() requires a preceding join"));
            }
        }
        self
    }

    /// Add a conjunctive filter. May be called repeatedly.
    pub fn filter(mut self, predicate: impl IntoPredicate) -> Self {
        let current = std::mem::take(&mut self.predicate);
        if let Some(next) = self.record(current.and(predicate)) {
            self.predicate = next;
        }
        self
    }

    /// Add a list of conjunctive filters; `Absent` entries are ignored.
    pub fn filter_all<I>(self, predicates: I) -> Self
    where
        I: IntoIterator,
        I::Item: IntoPredicate,
    {
        predicates.into_iter().fold(self, |b, p| b.filter(p))
    }

    pub fn group_by(mut self, expr: impl IntoExpr) -> Self {
        if let Some(expr) = self.record(expr.into_expr()) {
            self.group_by.push(expr);
        }
        self
    }

    pub fn having(mut self, predicate: impl IntoPredicate) -> Self {
        let current = std::mem::take(&mut self.having);
        if let Some(next) = self.record(current.and(predicate)) {
            self.having = next;
        }
        self
    }

    pub fn order_by(mut self, spec: OrderSpec) -> Self {
        self.order_by.push(spec);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Seal the builder into a plan. Every column must resolve to one of
    /// this query's sources.
    pub fn build(self) -> Result<QueryPlan> {
        self.validate(false)
    }

    /// Seal the builder into a plan for use as a subquery. Columns of
    /// unknown aliases are kept as outer references and resolved by the
    /// enclosing query's `build`.
    pub fn build_subquery(self) -> Result<QueryPlan> {
        self.validate(true)
    }

    fn validate(self, allow_outer: bool) -> Result<QueryPlan> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let root = self
            .root
            .ok_or_else(|| Error::malformed("query has no source"))?;
        if self.selections.is_empty() {
            return Err(Error::malformed("query selects nothing"));
        }

        let mut plan = QueryPlan {
            root,
            joins: self.joins,
            predicate: self.predicate,
            selections: self.selections,
            group_by: self.group_by,
            having: self.having,
            order_by: self.order_by,
            offset: self.offset,
            limit: self.limit,
            aggregate: false,
            outer_refs: Vec::new(),
        };

        check_sources(&plan)?;
        plan.outer_refs = check_scope(&plan, allow_outer)?;
        plan.aggregate = check_aggregation(&plan)?;
        Ok(plan)
    }
}

fn find_source<'a>(plan: &'a QueryPlan, alias: &str) -> Option<&'a Source> {
    plan.sources().find(|s| s.alias() == alias)
}

/// Alias uniqueness, entity selections and join legality.
fn check_sources(plan: &QueryPlan) -> Result<()> {
    let sources: Vec<&Source> = plan.sources().collect();
    for (i, source) in sources.iter().enumerate() {
        if sources[..i].iter().any(|s| s.alias() == source.alias()) {
            return Err(Error::malformed(format!(
                "alias {} is used more than once",
                source.alias()
            )));
        }
    }

    for selection in &plan.selections {
        if let Selection::Entity(source) = selection
            && find_source(plan, source.alias()) != Some(source)
        {
            return Err(Error::malformed(format!(
                "selected entity {} is not a source of this query",
                source.alias()
            )));
        }
    }

    for (i, join) in plan.joins.iter().enumerate() {
        // sources[i] is the last source before this join
        let preceding = &sources[..=i];
        if let Some(relation) = &join.relation {
            if !preceding.iter().any(|s| s.alias() == relation.alias) {
                return Err(Error::malformed(format!(
                    "relationship {} must be joined from an earlier source",
                    relation
                )));
            }
            if relation.target != join.source.record_type().name() {
                return Err(Error::malformed(format!(
                    "relationship {} targets {}, not {}",
                    relation,
                    relation.target,
                    join.source.record_type().name()
                )));
            }
        }
        if join.fetch && join.relation.is_none() {
            return Err(Error::malformed(format!(
                "fetch join on {} requires a relationship join",
                join.source.alias()
            )));
        }
        if join.relation.is_none() && join.kind != JoinKind::Cross && join.on.is_absent() {
            return Err(Error::malformed(format!(
                "join with {} has no condition, use cross_join for an unconditional join",
                join.source.alias()
            )));
        }
        if join.kind == JoinKind::Cross && !join.on.is_absent() {
            return Err(Error::malformed(format!(
                "cross join with {} cannot have a condition",
                join.source.alias()
            )));
        }
        if join.on.expr().is_some_and(Expr::contains_aggregate) {
            return Err(Error::malformed("join condition cannot contain an aggregate"));
        }
    }
    Ok(())
}

/// Resolve every column against the plan's sources. Returns the outer
/// references left over when `allow_outer` is set.
fn check_scope(plan: &QueryPlan, allow_outer: bool) -> Result<Vec<ColumnRef>> {
    let mut outer: Vec<ColumnRef> = Vec::new();
    let mut resolve = |column: &ColumnRef| -> Result<()> {
        match find_source(plan, &column.alias) {
            Some(source) if source.record_type().name() == column.record_type => Ok(()),
            Some(source) => Err(Error::malformed(format!(
                "{} refers to {}, but alias {} is {}",
                column,
                column.record_type,
                column.alias,
                source.record_type().name()
            ))),
            None if allow_outer => {
                if !outer.contains(column) {
                    outer.push(column.clone());
                }
                Ok(())
            }
            None => Err(Error::malformed(format!(
                "{} refers to unknown alias {}",
                column, column.alias
            ))),
        }
    };

    for expr in plan.expressions() {
        for column in expr.columns() {
            resolve(column)?;
        }
        for subquery in expr.subqueries() {
            for column in subquery.outer_refs() {
                resolve(column)?;
            }
        }
    }
    Ok(outer)
}

/// Group-by coverage and aggregate placement. Returns whether the plan
/// produces grouped rows.
fn check_aggregation(plan: &QueryPlan) -> Result<bool> {
    if plan.predicate.expr().is_some_and(Expr::contains_aggregate) {
        return Err(Error::malformed(
            "filter cannot contain an aggregate, use having()",
        ));
    }
    if plan.group_by.iter().any(Expr::contains_aggregate) {
        return Err(Error::malformed("group_by cannot contain an aggregate"));
    }

    let aggregate = !plan.group_by.is_empty()
        || !plan.having.is_absent()
        || plan
            .selections
            .iter()
            .filter_map(Selection::expr)
            .any(Expr::contains_aggregate)
        || plan.order_by.iter().any(|o| o.expr.contains_aggregate());
    if !aggregate {
        return Ok(false);
    }

    for selection in &plan.selections {
        match selection {
            Selection::Entity(source) => {
                return Err(Error::malformed(format!(
                    "cannot select entity {} in an aggregate query",
                    source.alias()
                )));
            }
            Selection::Expr { expr, .. } => check_covered(plan, expr)?,
        }
    }
    if let Some(having) = plan.having.expr() {
        check_covered(plan, having)?;
    }
    for order in &plan.order_by {
        check_covered(plan, &order.expr)?;
    }
    Ok(true)
}

fn check_covered(plan: &QueryPlan, expr: &Expr) -> Result<()> {
    match uncovered_column(plan, expr) {
        Some(column) => Err(Error::malformed(format!(
            "{} must appear in group_by or inside an aggregate",
            column
        ))),
        None => Ok(()),
    }
}

/// First column of this query's sources used outside both the group keys
/// and any aggregate.
fn uncovered_column<'a>(plan: &QueryPlan, expr: &'a Expr) -> Option<&'a ColumnRef> {
    if plan.group_by.contains(expr) {
        return None;
    }
    match expr {
        Expr::Aggregate { .. } => None,
        Expr::Subquery(sub) => uncovered_outer_ref(plan, sub),
        Expr::In {
            operand,
            set: InSet::Subquery(sub),
            ..
        } => uncovered_column(plan, operand).or_else(|| uncovered_outer_ref(plan, sub)),
        // Outer references are constant within one execution
        Expr::Column(column) => find_source(plan, &column.alias).map(|_| column),
        _ => expr
            .children()
            .into_iter()
            .find_map(|child| uncovered_column(plan, child)),
    }
}

/// Correlated column of a subquery that reads this query's sources without
/// being a group key.
fn uncovered_outer_ref<'a>(plan: &QueryPlan, sub: &'a QueryPlan) -> Option<&'a ColumnRef> {
    sub.outer_refs().iter().find(|column| {
        find_source(plan, &column.alias).is_some()
            && !plan
                .group_by
                .iter()
                .any(|key| matches!(key, Expr::Column(c) if c == *column))
    })
}
