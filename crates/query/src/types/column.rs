//! Sources and column references
//!
//! A [`Source`] binds a record type to an alias; every column reference is
//! created through one, so a reference always names a declared field.

use super::expression::Expr;
use super::schema::RecordType;
use crate::error::{Error, Result};
use querykit_value::DataType;
use std::fmt;
use std::sync::Arc;

/// A record type bound to an alias, e.g. `member` or `subM`.
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    alias: String,
    record_type: Arc<RecordType>,
}

impl Source {
    pub fn new(record_type: &Arc<RecordType>, alias: impl Into<String>) -> Self {
        Source {
            alias: alias.into(),
            record_type: Arc::clone(record_type),
        }
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn record_type(&self) -> &Arc<RecordType> {
        &self.record_type
    }

    /// Reference a field of this source.
    pub fn column(&self, field: &str) -> Result<ColumnRef> {
        let (index, def) = self.record_type.field(field).ok_or_else(|| {
            Error::malformed(format!(
                "{} has no field {} (source {})",
                self.record_type.name(),
                field,
                self.alias
            ))
        })?;
        Ok(ColumnRef {
            alias: self.alias.clone(),
            record_type: self.record_type.name().to_string(),
            field: def.name.clone(),
            index,
            data_type: def.data_type,
            nullable: def.nullable,
        })
    }

    /// Column expression for a field of this source.
    pub fn col(&self, field: &str) -> Result<Expr> {
        self.column(field).map(Expr::Column)
    }

    /// The relationship declared by a reference field of this source.
    pub fn relation(&self, field: &str) -> Result<Relation> {
        let (index, def) = self.record_type.field(field).ok_or_else(|| {
            Error::malformed(format!("{} has no field {}", self.record_type.name(), field))
        })?;
        let reference = def.reference.as_ref().ok_or_else(|| {
            Error::malformed(format!(
                "{}.{} is not a reference field",
                self.record_type.name(),
                field
            ))
        })?;
        Ok(Relation {
            alias: self.alias.clone(),
            field: def.name.clone(),
            index,
            target: reference.record_type.clone(),
            target_key: reference.key.clone(),
        })
    }
}

/// A typed reference to a field of an aliased source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub alias: String,
    pub record_type: String,
    pub field: String,
    /// Position of the field in the record type's rows.
    pub index: usize,
    pub data_type: DataType,
    pub nullable: bool,
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.alias, self.field)
    }
}

/// A reference field of an aliased source, used for relationship joins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    /// Alias of the owning source.
    pub alias: String,
    pub field: String,
    pub index: usize,
    /// Referenced record type name.
    pub target: String,
    pub target_key: String,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.alias, self.field)
    }
}

/// Anything that names a relationship: a [`Relation`] or the result of
/// [`Source::relation`].
pub trait IntoRelation {
    fn into_relation(self) -> Result<Relation>;
}

impl IntoRelation for Relation {
    fn into_relation(self) -> Result<Relation> {
        Ok(self)
    }
}

impl IntoRelation for Result<Relation> {
    fn into_relation(self) -> Result<Relation> {
        self
    }
}
