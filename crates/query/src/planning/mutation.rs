//! Bulk update and delete plans

use crate::error::{Error, Result};
use crate::types::column::{ColumnRef, Source};
use crate::types::expression::{Expr, IntoExpr};
use crate::types::predicate::{IntoPredicate, Predicate};

/// `field = expr`, evaluated against the row before the update.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub column: ColumnRef,
    pub value: Expr,
}

/// A validated bulk update.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdatePlan {
    pub(crate) source: Source,
    pub(crate) assignments: Vec<Assignment>,
    pub(crate) predicate: Predicate,
}

impl UpdatePlan {
    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    /// Native functions the update calls, subqueries included.
    pub fn functions(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .assignments
            .iter()
            .map(|a| &a.value)
            .chain(self.predicate.expr())
            .flat_map(|e| e.functions())
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

/// A validated bulk delete.
#[derive(Debug, Clone, PartialEq)]
pub struct DeletePlan {
    pub(crate) source: Source,
    pub(crate) predicate: Predicate,
}

impl DeletePlan {
    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    pub fn functions(&self) -> Vec<String> {
        let mut names = self
            .predicate
            .expr()
            .map(|e| e.functions())
            .unwrap_or_default();
        names.sort();
        names.dedup();
        names
    }
}

/// Entry point for bulk updates.
pub struct Update;

impl Update {
    pub fn table(source: &Source) -> UpdateBuilder {
        UpdateBuilder {
            source: source.clone(),
            assignments: Vec::new(),
            predicate: Predicate::Absent,
            error: None,
        }
    }
}

/// Entry point for bulk deletes.
pub struct Delete;

impl Delete {
    pub fn from(source: &Source) -> DeleteBuilder {
        DeleteBuilder {
            source: source.clone(),
            predicate: Predicate::Absent,
            error: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpdateBuilder {
    source: Source,
    assignments: Vec<Assignment>,
    predicate: Predicate,
    error: Option<Error>,
}

impl UpdateBuilder {
    fn assignment(&self, column: Expr, value: Expr) -> Result<Assignment> {
        let Expr::Column(column) = column else {
            return Err(Error::malformed(format!("cannot assign to {}", column)));
        };
        if column.alias != self.source.alias() {
            return Err(Error::malformed(format!(
                "{} is not a field of {}",
                column,
                self.source.alias()
            )));
        }
        if self.source.record_type().primary_key().0 == column.index {
            return Err(Error::malformed(format!(
                "cannot assign primary key {}",
                column
            )));
        }
        let value_type = value.data_type();
        if value_type.is_null() && !column.nullable {
            return Err(Error::malformed(format!(
                "cannot assign NULL to non-nullable {}",
                column
            )));
        }
        let numeric = column.data_type.is_numeric() && value_type.is_numeric();
        if !column.data_type.accepts(&value_type) && !numeric {
            return Err(Error::malformed(format!(
                "cannot assign {} to {} of type {}",
                value_type, column, column.data_type
            )));
        }
        if value.contains_aggregate() {
            return Err(Error::malformed("assignment cannot contain an aggregate"));
        }
        Ok(Assignment { column, value })
    }

    /// Assign `value` to a field; numeric values are narrowed at runtime
    /// with a range check.
    pub fn set(mut self, column: impl IntoExpr, value: impl IntoExpr) -> Self {
        if self.error.is_some() {
            return self;
        }
        let assignment = column
            .into_expr()
            .and_then(|c| Ok((c, value.into_expr()?)))
            .and_then(|(c, v)| self.assignment(c, v));
        match assignment {
            Ok(assignment) => {
                self.assignments
                    .retain(|a| a.column.index != assignment.column.index);
                self.assignments.push(assignment);
            }
            Err(err) => self.error = Some(err),
        }
        self
    }

    pub fn filter(mut self, predicate: impl IntoPredicate) -> Self {
        let current = std::mem::take(&mut self.predicate);
        match current.and(predicate) {
            Ok(next) => self.predicate = next,
            Err(err) => {
                self.error.get_or_insert(err);
            }
        }
        self
    }

    pub fn build(self) -> Result<UpdatePlan> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if self.assignments.is_empty() {
            return Err(Error::malformed("update assigns nothing"));
        }
        check_mutation_scope(
            &self.source,
            self.assignments
                .iter()
                .map(|a| &a.value)
                .chain(self.predicate.expr()),
        )?;
        Ok(UpdatePlan {
            source: self.source,
            assignments: self.assignments,
            predicate: self.predicate,
        })
    }
}

#[derive(Debug, Clone)]
pub struct DeleteBuilder {
    source: Source,
    predicate: Predicate,
    error: Option<Error>,
}

impl DeleteBuilder {
    pub fn filter(mut self, predicate: impl IntoPredicate) -> Self {
        let current = std::mem::take(&mut self.predicate);
        match current.and(predicate) {
            Ok(next) => self.predicate = next,
            Err(err) => {
                self.error.get_or_insert(err);
            }
        }
        self
    }

    pub fn build(self) -> Result<DeletePlan> {
        if let Some(err) = self.error {
            return Err(err);
        }
        check_mutation_scope(&self.source, self.predicate.expr())?;
        Ok(DeletePlan {
            source: self.source,
            predicate: self.predicate,
        })
    }
}

/// Mutations see exactly one source: every column, including correlated
/// subquery references, must belong to it.
fn check_mutation_scope<'a>(
    source: &Source,
    exprs: impl IntoIterator<Item = &'a Expr>,
) -> Result<()> {
    for expr in exprs {
        if expr.contains_aggregate() {
            return Err(Error::malformed("mutation filter cannot contain an aggregate"));
        }
        let columns = expr
            .columns()
            .into_iter()
            .chain(expr.subqueries().into_iter().flat_map(|p| p.outer_refs()));
        for column in columns {
            if column.alias != source.alias()
                || column.record_type != source.record_type().name()
            {
                return Err(Error::malformed(format!(
                    "{} is not a field of {}",
                    column,
                    source.alias()
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::types::schema::{Field, RecordType};
    use querykit_value::DataType;
    use std::sync::Arc;

    fn member() -> Source {
        let record_type = RecordType::new(
            "Member",
            vec![
                Field::new("id", DataType::I64).primary_key(),
                Field::new("username", DataType::Str),
                Field::new("age", DataType::I32).nullable(false),
            ],
        )
        .unwrap();
        Source::new(&Arc::new(record_type), "member")
    }

    #[test]
    fn test_assignments_are_type_checked() {
        let member = member();
        let ok = Update::table(&member)
            .set(member.col("age"), member.col("age").unwrap().add(1))
            .build();
        assert!(ok.is_ok());

        let wrong_type = Update::table(&member).set(member.col("age"), "x").build();
        assert_eq!(
            wrong_type.unwrap_err().kind(),
            ErrorKind::MalformedExpression
        );

        let null_into_required = Update::table(&member)
            .set(member.col("age"), Expr::null())
            .build();
        assert!(null_into_required.is_err());

        let key = Update::table(&member).set(member.col("id"), 5i64).build();
        assert!(key.is_err());
    }

    #[test]
    fn test_later_assignment_replaces_earlier() {
        let member = member();
        let plan = Update::table(&member)
            .set(member.col("username"), "a")
            .set(member.col("username"), "b")
            .build()
            .unwrap();
        assert_eq!(plan.assignments().len(), 1);
        assert_eq!(plan.assignments()[0].value, Expr::lit("b"));
    }

    #[test]
    fn test_foreign_columns_are_rejected() {
        let member = member();
        let other = Source::new(member.record_type(), "other");
        let result = Delete::from(&member)
            .filter(other.col("age").unwrap().gt(1))
            .build();
        assert_eq!(result.unwrap_err().kind(), ErrorKind::MalformedExpression);
    }
}
