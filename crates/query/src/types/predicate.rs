//! Predicates with an explicit "no constraint" state
//!
//! `Absent` is the identity of both `and` and `or`, which lets optional
//! filters be folded together without special-casing missing parameters.

use super::expression::{Expr, IntoExpr};
use crate::error::{Error, Result};
use querykit_value::DataType;

/// A boolean expression, or no constraint at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Predicate {
    #[default]
    Absent,
    Expr(Expr),
}

impl Predicate {
    /// Wrap a boolean expression.
    pub fn from_expr(expr: Expr) -> Result<Self> {
        match expr.data_type() {
            DataType::Bool | DataType::Null => Ok(Predicate::Expr(expr)),
            other => Err(Error::malformed(format!(
                "predicate must be boolean, found {} ({})",
                other, expr
            ))),
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Predicate::Absent)
    }

    pub fn expr(&self) -> Option<&Expr> {
        match self {
            Predicate::Absent => None,
            Predicate::Expr(expr) => Some(expr),
        }
    }

    pub fn and(self, other: impl IntoPredicate) -> Result<Predicate> {
        match (self, other.into_predicate()?) {
            (Predicate::Absent, p) | (p, Predicate::Absent) => Ok(p),
            (Predicate::Expr(l), Predicate::Expr(r)) => l.and(r).map(Predicate::Expr),
        }
    }

    pub fn or(self, other: impl IntoPredicate) -> Result<Predicate> {
        match (self, other.into_predicate()?) {
            (Predicate::Absent, p) | (p, Predicate::Absent) => Ok(p),
            (Predicate::Expr(l), Predicate::Expr(r)) => l.or(r).map(Predicate::Expr),
        }
    }

    /// Logical negation. Negating `Absent` has no meaning and is rejected.
    pub fn negate(self) -> Result<Predicate> {
        match self {
            Predicate::Absent => Err(Error::malformed("cannot negate an absent predicate")),
            Predicate::Expr(expr) => expr.not().map(Predicate::Expr),
        }
    }

    /// `Absent` when the parameter is missing, `build(value)` otherwise.
    ///
    /// ```ignore
    /// let by_name = Predicate::optional(username, |name| member.col("username")?.eq(name))?;
    /// ```
    pub fn optional<T, E>(param: Option<T>, build: impl FnOnce(T) -> E) -> Result<Predicate>
    where
        E: IntoPredicate,
    {
        match param {
            None => Ok(Predicate::Absent),
            Some(value) => build(value).into_predicate(),
        }
    }

    /// Conjunction of every predicate; `Absent` for an empty sequence.
    pub fn all<I>(predicates: I) -> Result<Predicate>
    where
        I: IntoIterator,
        I::Item: IntoPredicate,
    {
        predicates
            .into_iter()
            .try_fold(Predicate::Absent, |acc, p| acc.and(p))
    }

    /// Disjunction of every predicate; `Absent` for an empty sequence.
    pub fn any<I>(predicates: I) -> Result<Predicate>
    where
        I: IntoIterator,
        I::Item: IntoPredicate,
    {
        predicates
            .into_iter()
            .try_fold(Predicate::Absent, |acc, p| acc.or(p))
    }
}

/// Conversion into a predicate: predicates, boolean expressions and
/// constructor results.
pub trait IntoPredicate {
    fn into_predicate(self) -> Result<Predicate>;
}

impl IntoPredicate for Predicate {
    fn into_predicate(self) -> Result<Predicate> {
        Ok(self)
    }
}

impl IntoPredicate for Result<Predicate> {
    fn into_predicate(self) -> Result<Predicate> {
        self
    }
}

impl IntoPredicate for Expr {
    fn into_predicate(self) -> Result<Predicate> {
        Predicate::from_expr(self)
    }
}

impl IntoPredicate for &Expr {
    fn into_predicate(self) -> Result<Predicate> {
        Predicate::from_expr(self.clone())
    }
}

impl IntoPredicate for Result<Expr> {
    fn into_predicate(self) -> Result<Predicate> {
        self.into_expr().and_then(Predicate::from_expr)
    }
}

/// Mutable accumulate-then-seal predicate builder.
///
/// The first error is kept and reported by [`PredicateBuilder::build`].
#[derive(Debug, Default)]
pub struct PredicateBuilder {
    current: Predicate,
    error: Option<Error>,
}

impl PredicateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an initial predicate.
    pub fn with(initial: impl IntoPredicate) -> Self {
        let mut builder = Self::new();
        builder.and(initial);
        builder
    }

    pub fn and(&mut self, p: impl IntoPredicate) -> &mut Self {
        self.combine(p, |acc, p| acc.and(p))
    }

    pub fn or(&mut self, p: impl IntoPredicate) -> &mut Self {
        self.combine(p, |acc, p| acc.or(p))
    }

    fn combine(
        &mut self,
        p: impl IntoPredicate,
        op: fn(Predicate, Predicate) -> Result<Predicate>,
    ) -> &mut Self {
        if self.error.is_some() {
            return self;
        }
        let current = std::mem::take(&mut self.current);
        match p.into_predicate().and_then(|p| op(current, p)) {
            Ok(next) => self.current = next,
            Err(err) => self.error = Some(err),
        }
        self
    }

    pub fn is_absent(&self) -> bool {
        self.error.is_none() && self.current.is_absent()
    }

    pub fn build(&self) -> Result<Predicate> {
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(self.current.clone()),
        }
    }
}
