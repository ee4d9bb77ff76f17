//! Query-related types shared by planning and execution

use super::column::Source;
use super::expression::Expr;
use crate::error::Result;
use std::fmt;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// Explicit NULL placement for a sort key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullOrder {
    First,
    Last,
}

/// One ORDER BY key
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSpec {
    pub expr: Expr,
    pub direction: Direction,
    /// `None` defers to the engine's configured null sort.
    pub nulls: Option<NullOrder>,
}

impl OrderSpec {
    pub fn new(expr: Expr, direction: Direction) -> Self {
        OrderSpec {
            expr,
            direction,
            nulls: None,
        }
    }

    pub fn nulls_first(mut self) -> Self {
        self.nulls = Some(NullOrder::First);
        self
    }

    pub fn nulls_last(mut self) -> Self {
        self.nulls = Some(NullOrder::Last);
        self
    }
}

impl fmt::Display for OrderSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = match self.direction {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        };
        write!(f, "{} {}", self.expr, dir)?;
        match self.nulls {
            Some(NullOrder::First) => write!(f, " NULLS FIRST"),
            Some(NullOrder::Last) => write!(f, " NULLS LAST"),
            None => Ok(()),
        }
    }
}

/// Join type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    /// Unmatched left rows are kept with the joined source absent.
    Left,
    /// Unconditional (theta) join.
    Cross,
}

/// One projected item
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// The whole entity of a source.
    Entity(Source),
    Expr { expr: Expr, alias: Option<String> },
}

impl Selection {
    pub fn entity(source: &Source) -> Self {
        Selection::Entity(source.clone())
    }

    /// Label of the projected column in result tuples.
    pub fn label(&self) -> String {
        match self {
            Selection::Entity(source) => source.alias().to_string(),
            Selection::Expr {
                alias: Some(alias), ..
            } => alias.clone(),
            Selection::Expr { expr, .. } => expr.to_string(),
        }
    }

    pub fn expr(&self) -> Option<&Expr> {
        match self {
            Selection::Entity(_) => None,
            Selection::Expr { expr, .. } => Some(expr),
        }
    }
}

impl From<Expr> for Selection {
    fn from(expr: Expr) -> Self {
        Selection::Expr { expr, alias: None }
    }
}

impl From<&Source> for Selection {
    fn from(source: &Source) -> Self {
        Selection::entity(source)
    }
}

/// Anything usable as a projection item.
pub trait IntoSelection {
    fn into_selection(self) -> Result<Selection>;
}

impl IntoSelection for Selection {
    fn into_selection(self) -> Result<Selection> {
        Ok(self)
    }
}

impl IntoSelection for Expr {
    fn into_selection(self) -> Result<Selection> {
        Ok(self.into())
    }
}

impl IntoSelection for &Expr {
    fn into_selection(self) -> Result<Selection> {
        Ok(self.clone().into())
    }
}

impl IntoSelection for Result<Expr> {
    fn into_selection(self) -> Result<Selection> {
        self.map(Selection::from)
    }
}

impl IntoSelection for &Source {
    fn into_selection(self) -> Result<Selection> {
        Ok(Selection::entity(self))
    }
}
